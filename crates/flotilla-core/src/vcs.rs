//! Version-control adapter.
//!
//! Every primitive maps to one `git` invocation scoped to the target working
//! copy. Network operations (clone, fetch, pull, push) optionally carry an
//! authorization header when the workspace is configured for HTTPS with
//! token-based operation.
//!
//! `git diff --exit-code` reports *clean* with a zero exit. That inversion
//! stays behind `has_no_*` helpers; the trait methods are plain negations.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};

use crate::command::{run_captured, CommandOutput};
use crate::error::{FleetError, FleetResult};

/// Stash label used when parking dirty state before a sync.
pub const STASH_LABEL: &str = "Auto-stash by flotilla";

const EMPTY_CLONE_WARNING: &str = "warning: You appear to have cloned an empty repository.";

/// Outcome of a clone; an empty remote repository clones successfully but
/// is worth a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneStatus {
    Cloned,
    ClonedEmpty,
}

/// The pipeline's view of version control. `folder` arguments are paths
/// relative to the workspace root, exactly as discovery returns them.
pub trait VersionControl: Send + Sync {
    fn clone_repository(&self, url: &str, folder: &str) -> FleetResult<CloneStatus>;
    fn fetch(&self, folder: &str) -> FleetResult<()>;
    fn current_branch(&self, folder: &str) -> FleetResult<String>;
    /// URL of the `origin` remote, `None` for a purely local working copy.
    fn remote_url(&self, folder: &str) -> Option<String>;
    fn has_uncommitted_changes(&self, folder: &str) -> FleetResult<bool>;
    fn has_staged_changes(&self, folder: &str) -> FleetResult<bool>;
    fn has_untracked(&self, folder: &str) -> FleetResult<bool>;
    fn checkout(&self, folder: &str, branch: &str) -> FleetResult<()>;
    /// Create or reset a local branch at the current HEAD.
    fn create_branch(&self, folder: &str, branch: &str) -> FleetResult<()>;
    /// Park dirty state, checkout `branch`, pull with rebase. Resilient:
    /// every failure is a warning, never an error.
    fn stash_and_rebase(&self, folder: &str, branch: &str);
    /// Plain `pull --rebase`, optionally auto-stashing.
    fn pull_rebase(&self, folder: &str, autostash: bool) -> FleetResult<String>;
    /// Stage changes (tracked files only when `only_tracked`) and commit.
    fn add_and_commit(&self, folder: &str, message: &str, only_tracked: bool) -> FleetResult<()>;
    /// Push; with `track` set, establish `origin/<track>` as upstream.
    fn push(&self, folder: &str, track: Option<&str>) -> FleetResult<()>;
    fn diff(&self, folder: &str) -> FleetResult<String>;
    /// Resolved commit id for `reference`, `None` when it does not exist.
    fn revision_of(&self, folder: &str, reference: &str) -> Option<String>;
}

/// `git`-backed implementation rooted at the workspace directory.
pub struct GitVcs {
    root: PathBuf,
    auth_args: Vec<String>,
}

impl GitVcs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            auth_args: Vec::new(),
        }
    }

    /// Inject `token` as a basic-auth header into network operations.
    pub fn with_operation_token(root: impl Into<PathBuf>, token: &str) -> Self {
        let encoded = BASE64.encode(format!(":{token}"));
        Self {
            root: root.into(),
            auth_args: vec![
                "-c".to_string(),
                format!("http.extraHeader=Authorization: Basic {encoded}"),
            ],
        }
    }

    fn dir(&self, folder: &str) -> PathBuf {
        self.root.join(folder)
    }

    fn git(&self, cwd: &Path, authorized: bool, args: &[&str]) -> FleetResult<CommandOutput> {
        let mut full: Vec<&str> = Vec::with_capacity(self.auth_args.len() + args.len());
        if authorized {
            full.extend(self.auth_args.iter().map(String::as_str));
        }
        full.extend_from_slice(args);
        run_captured("git", &full, cwd)
    }

    /// Run and require success; the error carries the logical command, not
    /// the full argument list, so the auth header never leaks.
    fn git_ok(&self, cwd: &Path, authorized: bool, args: &[&str]) -> FleetResult<CommandOutput> {
        let result = self.git(cwd, authorized, args)?;
        if result.success {
            Ok(result)
        } else {
            Err(FleetError::Vcs {
                command: args.join(" "),
                output: result.output,
            })
        }
    }

    fn has_no_diff(&self, folder: &str) -> FleetResult<bool> {
        Ok(self.git(&self.dir(folder), false, &["diff", "--exit-code"])?.success)
    }

    fn has_no_staged_diff(&self, folder: &str) -> FleetResult<bool> {
        Ok(self
            .git(&self.dir(folder), false, &["diff", "--cached", "--exit-code"])?
            .success)
    }

    fn has_no_untracked(&self, folder: &str) -> FleetResult<bool> {
        let result = self.git_ok(&self.dir(folder), false, &["status", "--porcelain"])?;
        Ok(!result.output.lines().any(|line| line.starts_with("??")))
    }
}

impl VersionControl for GitVcs {
    fn clone_repository(&self, url: &str, folder: &str) -> FleetResult<CloneStatus> {
        let result = self.git_ok(&self.root, true, &["clone", "-q", url, folder])?;
        if result.output == EMPTY_CLONE_WARNING {
            Ok(CloneStatus::ClonedEmpty)
        } else {
            Ok(CloneStatus::Cloned)
        }
    }

    fn fetch(&self, folder: &str) -> FleetResult<()> {
        self.git_ok(&self.dir(folder), true, &["fetch"])?;
        Ok(())
    }

    fn current_branch(&self, folder: &str) -> FleetResult<String> {
        let result = self.git_ok(
            &self.dir(folder),
            false,
            &["rev-parse", "--abbrev-ref", "HEAD"],
        )?;
        Ok(result.output)
    }

    fn remote_url(&self, folder: &str) -> Option<String> {
        match self.git(&self.dir(folder), false, &["remote", "get-url", "origin"]) {
            Ok(result) if result.success => Some(result.output),
            Ok(_) => None,
            Err(e) => {
                debug!(folder, error = %e, "cannot read remote url");
                None
            }
        }
    }

    fn has_uncommitted_changes(&self, folder: &str) -> FleetResult<bool> {
        Ok(!self.has_no_diff(folder)?)
    }

    fn has_staged_changes(&self, folder: &str) -> FleetResult<bool> {
        Ok(!self.has_no_staged_diff(folder)?)
    }

    fn has_untracked(&self, folder: &str) -> FleetResult<bool> {
        Ok(!self.has_no_untracked(folder)?)
    }

    fn checkout(&self, folder: &str, branch: &str) -> FleetResult<()> {
        self.git_ok(&self.dir(folder), false, &["checkout", "-q", branch])?;
        Ok(())
    }

    fn create_branch(&self, folder: &str, branch: &str) -> FleetResult<()> {
        self.git_ok(&self.dir(folder), false, &["checkout", "-q", "-B", branch])?;
        Ok(())
    }

    fn stash_and_rebase(&self, folder: &str, branch: &str) {
        let dir = self.dir(folder);
        let steps: [(&[&str], bool); 3] = [
            (&["stash", "push", "-m", STASH_LABEL], false),
            (&["checkout", "-q", branch], false),
            (&["pull", "-q", "--rebase"], true),
        ];
        for (args, authorized) in steps {
            match self.git(&dir, authorized, args) {
                Ok(result) if !result.success => {
                    warn!(folder, command = args.join(" "), output = %result.output, "sync step failed, continuing");
                }
                Err(e) => {
                    warn!(folder, command = args.join(" "), error = %e, "sync step failed, continuing");
                }
                Ok(_) => {}
            }
        }
    }

    fn pull_rebase(&self, folder: &str, autostash: bool) -> FleetResult<String> {
        let mut args = vec!["pull", "-q", "--rebase"];
        if autostash {
            args.push("--autostash");
        }
        let result = self.git_ok(&self.dir(folder), true, &args)?;
        Ok(result.output)
    }

    fn add_and_commit(&self, folder: &str, message: &str, only_tracked: bool) -> FleetResult<()> {
        let dir = self.dir(folder);
        if only_tracked {
            self.git_ok(&dir, false, &["add", "-u", "."])?;
        } else {
            self.git_ok(&dir, false, &["add", "."])?;
        }
        self.git_ok(&dir, false, &["commit", "-q", "-m", message])?;
        Ok(())
    }

    fn push(&self, folder: &str, track: Option<&str>) -> FleetResult<()> {
        let mut args = vec!["push", "-q"];
        if let Some(branch) = track {
            args.extend_from_slice(&["-u", "origin", branch]);
        }
        self.git_ok(&self.dir(folder), true, &args)?;
        Ok(())
    }

    fn diff(&self, folder: &str) -> FleetResult<String> {
        let result = self.git_ok(&self.dir(folder), false, &["diff"])?;
        Ok(result.output)
    }

    fn revision_of(&self, folder: &str, reference: &str) -> Option<String> {
        match self.git(
            &self.dir(folder),
            false,
            &["rev-parse", "--verify", reference],
        ) {
            Ok(result) if result.success => Some(result.output),
            _ => None,
        }
    }
}
