//! In-memory fake for the provider capability (testing only)
//!
//! Provides `StaticProvider`, which serves seeded groups and repositories
//! and records every mutation, so pipeline and CLI tests never touch a
//! real hosting service.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{RemoteError, RemoteResult};
use crate::model::{Group, Labels, NewGroup, NewRepository, Repository, ReviewRequest};
use crate::provider::RemoteProvider;

/// One recorded `create_review_request` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedReview {
    pub repository: String,
    pub from_branch: String,
    pub into_branch: String,
    pub title: String,
    pub message: String,
    pub draft: bool,
}

/// Provider fake serving a fixed data set.
#[derive(Debug, Default)]
pub struct StaticProvider {
    groups: Vec<Group>,
    repositories: Vec<Repository>,
    reviews_unsupported: bool,
    pub created_groups: Mutex<Vec<NewGroup>>,
    pub created_repositories: Mutex<Vec<NewRepository>>,
    pub created_reviews: Mutex<Vec<CreatedReview>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_groups(mut self, groups: Vec<Group>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_repositories(mut self, repositories: Vec<Repository>) -> Self {
        self.repositories = repositories;
        self
    }

    /// Make `create_review_request` fail with `Unsupported`, mirroring
    /// back-ends that have no review API.
    pub fn without_review_support(mut self) -> Self {
        self.reviews_unsupported = true;
        self
    }
}

#[async_trait]
impl RemoteProvider for StaticProvider {
    fn labels(&self) -> Labels {
        Labels {
            group: "group",
            groups: "groups",
            repository: "repository",
            repositories: "repositories",
            review_request: "review request",
        }
    }

    async fn list_groups(&self) -> RemoteResult<Vec<Group>> {
        Ok(self.groups.clone())
    }

    async fn list_repositories(&self, group_ids: &[String]) -> RemoteResult<Vec<Repository>> {
        let mut repositories: Vec<Repository> = self
            .repositories
            .iter()
            .filter(|r| group_ids.contains(&r.group_id))
            .cloned()
            .collect();
        repositories.sort_by(|a, b| a.name_with_namespace.cmp(&b.name_with_namespace));
        Ok(repositories)
    }

    async fn create_group(&self, draft: &NewGroup) -> RemoteResult<String> {
        let mut created = self.created_groups.lock().unwrap();
        created.push(draft.clone());
        Ok(format!("group-{}", created.len()))
    }

    async fn create_repository(&self, draft: &NewRepository) -> RemoteResult<String> {
        let mut created = self.created_repositories.lock().unwrap();
        created.push(draft.clone());
        Ok(format!("repo-{}", created.len()))
    }

    async fn create_review_request(
        &self,
        repository: &Repository,
        from_branch: &str,
        into_branch: &str,
        title: &str,
        message: &str,
        draft: bool,
    ) -> RemoteResult<ReviewRequest> {
        if self.reviews_unsupported {
            return Err(RemoteError::Unsupported {
                provider: "static",
                operation: "creating a review request",
            });
        }

        let mut created = self.created_reviews.lock().unwrap();
        created.push(CreatedReview {
            repository: repository.path_with_namespace.clone(),
            from_branch: from_branch.to_string(),
            into_branch: into_branch.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            draft,
        });
        Ok(ReviewRequest {
            id: created.len().to_string(),
            url: format!(
                "https://example.com/{}/reviews/{}",
                repository.path_with_namespace,
                created.len()
            ),
            state: "open".to_string(),
            mergeable: String::new(),
        })
    }
}
