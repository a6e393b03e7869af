//! The provider capability: one trait, one implementation per backend.
//!
//! Consumers never branch on provider identity; everything
//! backend-specific lives behind [`RemoteProvider`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{Authorization, DelegatedToken};
use crate::azure::AzureDevOps;
use crate::error::RemoteResult;
use crate::github::GitHub;
use crate::gitlab::GitLab;
use crate::model::{Group, Labels, NewGroup, NewRepository, Repository, ReviewRequest};

/// The hosting back-ends Flotilla can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    GitHub,
    GitLab,
    AzureDevOps,
}

impl ProviderKind {
    /// Parse a configured kind string, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "github" => Some(ProviderKind::GitHub),
            "gitlab" => Some(ProviderKind::GitLab),
            "azure" => Some(ProviderKind::AzureDevOps),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::GitLab => "gitlab",
            ProviderKind::AzureDevOps => "azure",
        }
    }

    /// Human-readable backend name for prompts and messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "GitHub",
            ProviderKind::GitLab => "GitLab",
            ProviderKind::AzureDevOps => "Azure DevOps",
        }
    }

    pub fn all() -> &'static [ProviderKind] {
        &[
            ProviderKind::GitHub,
            ProviderKind::GitLab,
            ProviderKind::AzureDevOps,
        ]
    }
}

/// Backend-independent settings a provider needs to operate.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub base_url: String,
    pub token: String,
    pub include_archived: bool,
    pub normalize_names: bool,
    /// Azure-like back-ends only: mint the token via the platform CLI
    /// instead of using `token` as a personal access token.
    pub delegated_auth: bool,
}

/// Capability interface implemented by every hosting backend.
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Backend vocabulary for user-facing text.
    fn labels(&self) -> Labels;

    /// List the organizational units visible to the credential.
    async fn list_groups(&self) -> RemoteResult<Vec<Group>>;

    /// List repositories of the given groups, sorted by
    /// `name_with_namespace`, archived entries filtered per configuration,
    /// pagination followed until exhausted.
    async fn list_repositories(&self, group_ids: &[String]) -> RemoteResult<Vec<Repository>>;

    /// Create a group; returns its id.
    async fn create_group(&self, draft: &NewGroup) -> RemoteResult<String>;

    /// Create a repository; returns its id.
    async fn create_repository(&self, draft: &NewRepository) -> RemoteResult<String>;

    /// Open a review request for `from_branch` into `into_branch`.
    /// Back-ends without this capability fail with `Unsupported`.
    async fn create_review_request(
        &self,
        repository: &Repository,
        from_branch: &str,
        into_branch: &str,
        title: &str,
        message: &str,
        draft: bool,
    ) -> RemoteResult<ReviewRequest>;
}

/// Build the backend for `kind` with its authorization decorator.
pub fn provider_for(
    kind: ProviderKind,
    settings: ProviderSettings,
) -> RemoteResult<Arc<dyn RemoteProvider>> {
    match kind {
        ProviderKind::GitHub => {
            let auth = Authorization::Token(settings.token.clone());
            Ok(Arc::new(GitHub::new(settings, auth)?))
        }
        ProviderKind::GitLab => {
            let auth = Authorization::PrivateToken(settings.token.clone());
            Ok(Arc::new(GitLab::new(settings, auth)?))
        }
        ProviderKind::AzureDevOps => {
            let auth = if settings.delegated_auth {
                Authorization::Delegated(DelegatedToken::new())
            } else {
                Authorization::Basic(settings.token.clone())
            };
            Ok(Arc::new(AzureDevOps::new(settings, auth)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_case_insensitive() {
        assert_eq!(ProviderKind::parse("GitHub"), Some(ProviderKind::GitHub));
        assert_eq!(ProviderKind::parse("GITLAB"), Some(ProviderKind::GitLab));
        assert_eq!(
            ProviderKind::parse("azure"),
            Some(ProviderKind::AzureDevOps)
        );
        assert_eq!(ProviderKind::parse("bitbucket"), None);
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in ProviderKind::all() {
            assert_eq!(ProviderKind::parse(kind.as_str()), Some(*kind));
        }
    }

    #[test]
    fn test_provider_factory_builds_each_kind() {
        for kind in ProviderKind::all() {
            let settings = ProviderSettings {
                base_url: "https://example.invalid".into(),
                token: "t".into(),
                ..Default::default()
            };
            let provider = provider_for(*kind, settings).unwrap();
            // Each backend carries its own vocabulary.
            assert!(!provider.labels().group.is_empty());
        }
    }
}
