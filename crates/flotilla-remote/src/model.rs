//! Canonical remote model shared by every hosting backend.
//!
//! The three supported back-ends expose structurally different REST APIs;
//! everything above this module only ever sees [`Group`], [`Repository`] and
//! [`ReviewRequest`].

use serde::{Deserialize, Serialize};

/// A remote organizational unit: a GitHub organization, a GitLab group or an
/// Azure DevOps project. Snapshot for the duration of one run, never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
}

/// A hosted repository in canonical form.
///
/// `path` is the local folder name used both for filesystem discovery and as
/// the clone destination. It is a deterministic function of the remote name
/// under the active [`normalize_folder`] policy, so within one run at most
/// one repository maps to a given path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub name: String,
    /// Local folder name; clone destination and discovery key.
    pub path: String,
    pub name_with_namespace: String,
    pub path_with_namespace: String,
    pub description: String,
    pub ssh_url: String,
    pub http_url: String,
    pub default_branch: String,
    pub archived: bool,
    pub group_id: String,
}

/// Result of opening a hosted code review. Created once after a successful
/// push, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub id: String,
    pub url: String,
    pub state: String,
    /// Provider-reported mergeability; vocabulary varies by backend and may
    /// be empty when the backend does not report it at creation time.
    pub mergeable: String,
}

/// Arguments for creating a remote group. Every field is optional at this
/// level; each backend validates its own required subset and fails with
/// `MissingParameter` when one is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewGroup {
    pub name: Option<String>,
    /// URL path slug (GitLab-like back-ends).
    pub path: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<String>,
    /// Login of the managing user (GitHub-like back-ends).
    pub admin: Option<String>,
    /// Process template name (Azure-like back-ends); server default if unset.
    pub process_template: Option<String>,
}

/// Arguments for creating a remote repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRepository {
    pub group_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<String>,
}

/// Vocabulary a backend uses for its concepts, for user-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels {
    pub group: &'static str,
    pub groups: &'static str,
    pub repository: &'static str,
    pub repositories: &'static str,
    pub review_request: &'static str,
}

/// Compute the local folder name for a remote repository name.
///
/// With normalization enabled the name is lower-cased and spaces become
/// dashes; otherwise the name is used as-is. Deterministic and injective for
/// names that differ by more than case/spacing.
pub fn normalize_folder(name: &str, enabled: bool) -> String {
    if !enabled {
        return name.to_string();
    }
    name.to_lowercase().replace(' ', "-")
}
