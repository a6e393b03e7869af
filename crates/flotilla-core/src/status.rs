//! Working-copy status reporting.

use std::fmt;

use tracing::warn;

use crate::error::FleetResult;
use crate::vcs::VersionControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyKind {
    Unstaged,
    Staged,
    Untracked,
}

/// Condition of one working copy relative to its upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoStatus {
    Dirty(DirtyKind),
    /// Clean, but the repository has no remote at all.
    CleanLocalOnly,
    /// The current branch has never been pushed.
    NoRemoteBranch,
    /// Local and remote revisions differ.
    NotInSync,
    Clean,
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoStatus::Dirty(DirtyKind::Unstaged) => write!(f, "Dirty (unstaged)"),
            RepoStatus::Dirty(DirtyKind::Staged) => write!(f, "Dirty (staged)"),
            RepoStatus::Dirty(DirtyKind::Untracked) => write!(f, "Dirty (untracked)"),
            RepoStatus::CleanLocalOnly => write!(f, "Clean [local only]"),
            RepoStatus::NoRemoteBranch => write!(f, "No remote branch"),
            RepoStatus::NotInSync => write!(f, "Not in sync"),
            RepoStatus::Clean => write!(f, "Clean"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkingCopyStatus {
    pub branch: String,
    pub status: RepoStatus,
}

/// Classify one working copy.
///
/// Local dirtiness is checked before any network access, in order: unstaged
/// edits, staged edits, untracked files. Only a clean copy with a remote is
/// fetched and compared against `origin/<branch>`.
pub fn working_copy_status(vcs: &dyn VersionControl, folder: &str) -> FleetResult<WorkingCopyStatus> {
    let branch = vcs.current_branch(folder)?;

    let status = if vcs.has_uncommitted_changes(folder)? {
        RepoStatus::Dirty(DirtyKind::Unstaged)
    } else if vcs.has_staged_changes(folder)? {
        RepoStatus::Dirty(DirtyKind::Staged)
    } else if vcs.has_untracked(folder)? {
        RepoStatus::Dirty(DirtyKind::Untracked)
    } else if vcs.remote_url(folder).is_none() {
        RepoStatus::CleanLocalOnly
    } else {
        if let Err(e) = vcs.fetch(folder) {
            warn!(folder, error = %e, "fetch failed, comparing against stale remote refs");
        }
        let local = vcs.revision_of(folder, &branch);
        let remote = vcs.revision_of(folder, &format!("origin/{branch}"));
        match (local, remote) {
            (_, None) => RepoStatus::NoRemoteBranch,
            (None, Some(_)) => {
                warn!(folder, branch = %branch, "current branch has no local revision");
                RepoStatus::NotInSync
            }
            (Some(local), Some(remote)) if local != remote => RepoStatus::NotInSync,
            _ => RepoStatus::Clean,
        }
    };

    Ok(WorkingCopyStatus { branch, status })
}
