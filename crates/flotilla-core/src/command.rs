//! External command invocation.
//!
//! One synchronous primitive: run a program in a working directory and
//! capture combined stdout/stderr plus the exit status. Every VCS and
//! action step goes through here.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::FleetResult;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Combined stdout and stderr, trimmed of surrounding whitespace.
    pub output: String,
    pub code: i32,
    pub success: bool,
}

/// Run `program args...` with `cwd` as working directory.
///
/// Returns `Err` only when the process cannot be spawned; a non-zero exit
/// is reported through [`CommandOutput::success`] so callers decide what a
/// failure means.
pub fn run_captured<S: AsRef<OsStr>>(
    program: impl AsRef<OsStr>,
    args: &[S],
    cwd: &Path,
) -> FleetResult<CommandOutput> {
    let result = Command::new(program.as_ref())
        .args(args)
        .current_dir(cwd)
        .output()?;

    let mut combined = String::from_utf8_lossy(&result.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&result.stderr));
    let output = combined.trim().to_string();

    let code = result.status.code().unwrap_or(-1);
    let success = result.status.success();
    debug!(
        program = %program.as_ref().to_string_lossy(),
        code,
        success,
        "ran external command"
    );

    Ok(CommandOutput {
        output,
        code,
        success,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_combined_output() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            run_captured("sh", &["-c", "echo out; echo err 1>&2"], dir.path()).unwrap();
        assert!(result.success);
        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
    }

    #[test]
    fn test_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_captured("sh", &["-c", "exit 3"], dir.path()).unwrap();
        assert!(!result.success);
        assert_eq!(result.code, 3);
    }

    #[test]
    fn test_runs_in_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().canonicalize().unwrap();
        let result = run_captured("pwd", &[] as &[&str], dir.path()).unwrap();
        assert_eq!(result.output, expected.to_string_lossy());
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_captured("flotilla-no-such-binary", &[] as &[&str], dir.path()).is_err());
    }
}
