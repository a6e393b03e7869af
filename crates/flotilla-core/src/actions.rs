//! Action script execution.
//!
//! Actions are operator-provided executables living under the workspace's
//! actions directory. The pipeline runs one action per repository with the
//! working directory set to that repository's checkout, so scripts operate
//! on `.` without knowing where the workspace lives.

use std::path::PathBuf;

use tracing::debug;

use crate::command::run_captured;
use crate::config::FleetConfig;
use crate::error::{FleetError, FleetResult};

/// Runs a named action inside a repository folder.
pub trait ActionRunner: Send + Sync {
    /// Execute `action` with `params`, cwd set to `folder` (relative to the
    /// workspace root). Returns the combined output on success.
    fn run(&self, action: &str, params: &[String], folder: &str) -> FleetResult<String>;
}

/// Action runner backed by scripts in the workspace's actions directory.
pub struct WorkspaceActions {
    workspace_root: PathBuf,
    actions_root: PathBuf,
}

impl WorkspaceActions {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let actions_root = FleetConfig::actions_root(&workspace_root);
        Self {
            workspace_root,
            actions_root,
        }
    }
}

impl ActionRunner for WorkspaceActions {
    fn run(&self, action: &str, params: &[String], folder: &str) -> FleetResult<String> {
        let program = self.actions_root.join(action);
        let cwd = self.workspace_root.join(folder);
        debug!(action, folder, "running action");

        let result = run_captured(&program, params, &cwd).map_err(|e| FleetError::Action {
            action: action.to_string(),
            output: e.to_string(),
        })?;
        if !result.success {
            return Err(FleetError::Action {
                action: action.to_string(),
                output: result.output,
            });
        }
        Ok(result.output)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use super::*;

    fn write_action(workspace: &Path, name: &str, body: &str) {
        let actions = FleetConfig::actions_root(workspace);
        fs::create_dir_all(&actions).unwrap();
        let path = actions.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_runs_action_in_repository_folder() {
        let workspace = tempfile::tempdir().unwrap();
        fs::create_dir_all(workspace.path().join("alpha")).unwrap();
        write_action(workspace.path(), "touch-marker", "touch marker.txt && pwd");

        let runner = WorkspaceActions::new(workspace.path());
        let output = runner.run("touch-marker", &[], "alpha").unwrap();

        assert!(workspace.path().join("alpha/marker.txt").exists());
        assert!(output.ends_with("alpha"));
    }

    #[test]
    fn test_passes_parameters_through() {
        let workspace = tempfile::tempdir().unwrap();
        fs::create_dir_all(workspace.path().join("alpha")).unwrap();
        write_action(workspace.path(), "echo-args", "echo \"$1 $2\"");

        let runner = WorkspaceActions::new(workspace.path());
        let output = runner
            .run(
                "echo-args",
                &["--fix".to_string(), "deps".to_string()],
                "alpha",
            )
            .unwrap();
        assert_eq!(output, "--fix deps");
    }

    #[test]
    fn test_failing_action_carries_output() {
        let workspace = tempfile::tempdir().unwrap();
        fs::create_dir_all(workspace.path().join("alpha")).unwrap();
        write_action(workspace.path(), "broken", "echo boom >&2; exit 3");

        let runner = WorkspaceActions::new(workspace.path());
        let err = runner.run("broken", &[], "alpha").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("broken"), "got: {message}");
        assert!(message.contains("boom"), "got: {message}");
    }

    #[test]
    fn test_unknown_action_fails() {
        let workspace = tempfile::tempdir().unwrap();
        fs::create_dir_all(workspace.path().join("alpha")).unwrap();

        let runner = WorkspaceActions::new(workspace.path());
        let err = runner.run("missing", &[], "alpha").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
