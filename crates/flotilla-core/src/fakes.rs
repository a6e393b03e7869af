//! In-memory fakes for exercising the pipeline without git or a network.
//!
//! `RecordingVcs` keeps a call log of every mutating operation plus small
//! scripted state maps, so tests preset a repository's condition and then
//! assert on the exact sequence the pipeline drove.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::actions::ActionRunner;
use crate::error::{FleetError, FleetResult};
use crate::vcs::{CloneStatus, VersionControl};

/// Version control fake.
#[derive(Debug, Default)]
pub struct RecordingVcs {
    calls: Mutex<Vec<String>>,
    branches: Mutex<HashMap<String, String>>,
    unstaged: Mutex<HashSet<String>>,
    staged: Mutex<HashSet<String>>,
    untracked: Mutex<HashSet<String>>,
    remotes: Mutex<HashMap<String, String>>,
    revisions: Mutex<HashMap<(String, String), String>>,
    diffs: Mutex<HashMap<String, String>>,
    failing_pushes: Mutex<HashSet<String>>,
}

impl RecordingVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current branch of `folder`; unset folders report `main`.
    pub fn with_branch(self, folder: &str, branch: &str) -> Self {
        self.branches
            .lock()
            .unwrap()
            .insert(folder.to_string(), branch.to_string());
        self
    }

    pub fn with_unstaged(self, folder: &str) -> Self {
        self.unstaged.lock().unwrap().insert(folder.to_string());
        self
    }

    pub fn with_staged(self, folder: &str) -> Self {
        self.staged.lock().unwrap().insert(folder.to_string());
        self
    }

    pub fn with_untracked(self, folder: &str) -> Self {
        self.untracked.lock().unwrap().insert(folder.to_string());
        self
    }

    pub fn with_remote(self, folder: &str, url: &str) -> Self {
        self.remotes
            .lock()
            .unwrap()
            .insert(folder.to_string(), url.to_string());
        self
    }

    pub fn with_revision(self, folder: &str, reference: &str, id: &str) -> Self {
        self.revisions
            .lock()
            .unwrap()
            .insert((folder.to_string(), reference.to_string()), id.to_string());
        self
    }

    pub fn with_diff(self, folder: &str, diff: &str) -> Self {
        self.diffs
            .lock()
            .unwrap()
            .insert(folder.to_string(), diff.to_string());
        self
    }

    /// Make every push in `folder` fail.
    pub fn failing_push(self, folder: &str) -> Self {
        self.failing_pushes
            .lock()
            .unwrap()
            .insert(folder.to_string());
        self
    }

    /// Snapshot of the recorded calls, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }
}

impl VersionControl for RecordingVcs {
    fn clone_repository(&self, url: &str, folder: &str) -> FleetResult<CloneStatus> {
        self.record(format!("clone {url} {folder}"));
        Ok(CloneStatus::Cloned)
    }

    fn fetch(&self, folder: &str) -> FleetResult<()> {
        self.record(format!("fetch {folder}"));
        Ok(())
    }

    fn current_branch(&self, folder: &str) -> FleetResult<String> {
        Ok(self
            .branches
            .lock()
            .unwrap()
            .get(folder)
            .cloned()
            .unwrap_or_else(|| "main".to_string()))
    }

    fn remote_url(&self, folder: &str) -> Option<String> {
        self.remotes.lock().unwrap().get(folder).cloned()
    }

    fn has_uncommitted_changes(&self, folder: &str) -> FleetResult<bool> {
        Ok(self.unstaged.lock().unwrap().contains(folder))
    }

    fn has_staged_changes(&self, folder: &str) -> FleetResult<bool> {
        Ok(self.staged.lock().unwrap().contains(folder))
    }

    fn has_untracked(&self, folder: &str) -> FleetResult<bool> {
        Ok(self.untracked.lock().unwrap().contains(folder))
    }

    fn checkout(&self, folder: &str, branch: &str) -> FleetResult<()> {
        self.record(format!("checkout {folder} {branch}"));
        self.branches
            .lock()
            .unwrap()
            .insert(folder.to_string(), branch.to_string());
        Ok(())
    }

    fn create_branch(&self, folder: &str, branch: &str) -> FleetResult<()> {
        self.record(format!("create_branch {folder} {branch}"));
        self.branches
            .lock()
            .unwrap()
            .insert(folder.to_string(), branch.to_string());
        Ok(())
    }

    fn stash_and_rebase(&self, folder: &str, branch: &str) {
        self.record(format!("stash_and_rebase {folder} {branch}"));
        self.branches
            .lock()
            .unwrap()
            .insert(folder.to_string(), branch.to_string());
    }

    fn pull_rebase(&self, folder: &str, autostash: bool) -> FleetResult<String> {
        self.record(format!("pull_rebase {folder} autostash={autostash}"));
        Ok(String::new())
    }

    fn add_and_commit(&self, folder: &str, message: &str, only_tracked: bool) -> FleetResult<()> {
        self.record(format!("commit {folder} {message}"));
        self.unstaged.lock().unwrap().remove(folder);
        self.staged.lock().unwrap().remove(folder);
        if !only_tracked {
            self.untracked.lock().unwrap().remove(folder);
        }
        Ok(())
    }

    fn push(&self, folder: &str, track: Option<&str>) -> FleetResult<()> {
        match track {
            Some(branch) => self.record(format!("push {folder} -u origin {branch}")),
            None => self.record(format!("push {folder}")),
        }
        if self.failing_pushes.lock().unwrap().contains(folder) {
            return Err(FleetError::Vcs {
                command: "push".to_string(),
                output: "rejected by scripted fake".to_string(),
            });
        }
        Ok(())
    }

    fn diff(&self, folder: &str) -> FleetResult<String> {
        self.record(format!("diff {folder}"));
        Ok(self
            .diffs
            .lock()
            .unwrap()
            .get(folder)
            .cloned()
            .unwrap_or_default())
    }

    fn revision_of(&self, folder: &str, reference: &str) -> Option<String> {
        self.revisions
            .lock()
            .unwrap()
            .get(&(folder.to_string(), reference.to_string()))
            .cloned()
    }
}

/// One recorded action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRun {
    pub action: String,
    pub params: Vec<String>,
    pub folder: String,
}

/// Action runner fake.
#[derive(Debug, Default)]
pub struct RecordingActions {
    runs: Mutex<Vec<ActionRun>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the action fail in `folder`.
    pub fn failing_in(self, folder: &str) -> Self {
        self.failing.lock().unwrap().insert(folder.to_string());
        self
    }

    pub fn runs(&self) -> Vec<ActionRun> {
        self.runs.lock().unwrap().clone()
    }
}

impl ActionRunner for RecordingActions {
    fn run(&self, action: &str, params: &[String], folder: &str) -> FleetResult<String> {
        self.runs.lock().unwrap().push(ActionRun {
            action: action.to_string(),
            params: params.to_vec(),
            folder: folder.to_string(),
        });
        if self.failing.lock().unwrap().contains(folder) {
            return Err(FleetError::Action {
                action: action.to_string(),
                output: "scripted failure".to_string(),
            });
        }
        Ok(String::new())
    }
}
