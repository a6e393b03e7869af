//! GitLab-like backend.
//!
//! Uses the v4 REST API under `<base>/api/v4` with `PRIVATE-TOKEN`
//! authentication. Merge requests are not wired up, so review creation
//! reports `Unsupported`.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::Authorization;
use crate::error::{RemoteError, RemoteResult};
use crate::model::{
    normalize_folder, Group, Labels, NewGroup, NewRepository, Repository, ReviewRequest,
};
use crate::provider::{ProviderSettings, RemoteProvider};
use crate::rest::RestClient;

const PAGE_SIZE: u32 = 100;

const LABELS: Labels = Labels {
    group: "group",
    groups: "groups",
    repository: "project",
    repositories: "projects",
    review_request: "merge request",
};

pub struct GitLab {
    rest: RestClient,
    api_url: String,
    settings: ProviderSettings,
}

#[derive(Debug, Deserialize)]
struct GlGroup {
    id: i64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct GlProject {
    id: i64,
    name: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    name_with_namespace: String,
    #[serde(default)]
    path_with_namespace: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    ssh_url_to_repo: String,
    #[serde(default)]
    http_url_to_repo: String,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Serialize)]
struct GlCreateGroup<'a> {
    name: &'a str,
    path: &'a str,
    description: &'a str,
    visibility: &'a str,
}

#[derive(Debug, Serialize)]
struct GlCreateProject<'a> {
    name: &'a str,
    namespace_id: &'a str,
    description: &'a str,
    visibility: &'a str,
}

impl GitLab {
    pub fn new(settings: ProviderSettings, auth: Authorization) -> RemoteResult<Self> {
        let api_url = format!("{}/api/v4", settings.base_url.trim_end_matches('/'));
        Ok(Self {
            rest: RestClient::new("gitlab", auth)?,
            api_url,
            settings,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    fn map_project(&self, group_id: &str, project: GlProject) -> Repository {
        let normalize = self.settings.normalize_names;
        Repository {
            id: project.id.to_string(),
            path: normalize_folder(&project.path, normalize),
            path_with_namespace: normalize_folder(&project.path_with_namespace, normalize),
            name: project.name,
            name_with_namespace: project.name_with_namespace,
            description: project.description.unwrap_or_default(),
            ssh_url: project.ssh_url_to_repo,
            http_url: project.http_url_to_repo,
            default_branch: project.default_branch.unwrap_or_default(),
            archived: project.archived,
            group_id: group_id.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl RemoteProvider for GitLab {
    fn labels(&self) -> Labels {
        LABELS
    }

    async fn list_groups(&self) -> RemoteResult<Vec<Group>> {
        let mut groups = Vec::new();
        let mut page: u32 = 1;

        loop {
            let url = self.url(&format!("groups?per_page={PAGE_SIZE}&page={page}"));
            let (batch, headers) = self.rest.get_json::<Vec<GlGroup>>(&url).await?;
            debug!(page, count = batch.len(), "fetched group page");

            groups.extend(batch.into_iter().map(|group| Group {
                id: group.id.to_string(),
                name: group.name,
            }));

            match next_page(&headers) {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(groups)
    }

    async fn list_repositories(&self, group_ids: &[String]) -> RemoteResult<Vec<Repository>> {
        let mut repositories = Vec::new();

        for group_id in group_ids {
            let mut page: u32 = 1;

            loop {
                let url = self.url(&format!(
                    "groups/{group_id}/projects?order_by=name&sort=asc&per_page={PAGE_SIZE}&page={page}"
                ));
                let (projects, headers) = self.rest.get_json::<Vec<GlProject>>(&url).await?;
                debug!(group = %group_id, page, count = projects.len(), "fetched project page");

                repositories.extend(
                    projects
                        .into_iter()
                        .filter(|p| self.settings.include_archived || !p.archived)
                        .map(|p| self.map_project(group_id, p)),
                );

                match next_page(&headers) {
                    Some(next) => page = next,
                    None => break,
                }
            }
        }

        repositories.sort_by(|a, b| a.name_with_namespace.cmp(&b.name_with_namespace));
        Ok(repositories)
    }

    async fn create_group(&self, draft: &NewGroup) -> RemoteResult<String> {
        let name = draft
            .name
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(RemoteError::MissingParameter { name: "name" })?;
        let path = draft
            .path
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(RemoteError::MissingParameter { name: "path" })?;

        let payload = GlCreateGroup {
            name,
            path,
            description: draft.description.as_deref().unwrap_or(""),
            visibility: draft.visibility.as_deref().unwrap_or("private"),
        };
        let created: GlGroup = self.rest.post_json(&self.url("groups"), &payload).await?;
        Ok(created.id.to_string())
    }

    async fn create_repository(&self, draft: &NewRepository) -> RemoteResult<String> {
        let group_id = draft
            .group_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(RemoteError::MissingParameter { name: "group" })?;
        let name = draft
            .name
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(RemoteError::MissingParameter { name: "name" })?;

        let payload = GlCreateProject {
            name,
            namespace_id: group_id,
            description: draft.description.as_deref().unwrap_or(""),
            visibility: draft.visibility.as_deref().unwrap_or("private"),
        };
        let created: GlProject = self.rest.post_json(&self.url("projects"), &payload).await?;
        Ok(created.id.to_string())
    }

    async fn create_review_request(
        &self,
        _repository: &Repository,
        _from_branch: &str,
        _into_branch: &str,
        _title: &str,
        _message: &str,
        _draft: bool,
    ) -> RemoteResult<ReviewRequest> {
        Err(RemoteError::Unsupported {
            provider: "gitlab",
            operation: "creating a merge request",
        })
    }
}

/// GitLab reports the next page number in `x-next-page`, empty on the
/// last page.
fn next_page(headers: &HeaderMap) -> Option<u32> {
    headers
        .get("x-next-page")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn gitlab(normalize: bool) -> GitLab {
        let settings = ProviderSettings {
            base_url: "https://gitlab.example.com/".into(),
            token: "t".into(),
            normalize_names: normalize,
            ..Default::default()
        };
        GitLab::new(settings, Authorization::PrivateToken("t".into())).unwrap()
    }

    #[test]
    fn test_api_url_appended_to_trimmed_base() {
        assert_eq!(gitlab(false).api_url, "https://gitlab.example.com/api/v4");
    }

    #[test]
    fn test_next_page_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-next-page", HeaderValue::from_static("4"));
        assert_eq!(next_page(&headers), Some(4));

        headers.insert("x-next-page", HeaderValue::from_static(""));
        assert_eq!(next_page(&headers), None);
        assert_eq!(next_page(&HeaderMap::new()), None);
    }

    #[test]
    fn test_map_project_uses_path_fields() {
        let repo = gitlab(true).map_project(
            "42",
            GlProject {
                id: 9,
                name: "Billing Service".into(),
                path: "billing-service".into(),
                name_with_namespace: "Acme / Billing Service".into(),
                path_with_namespace: "acme/billing-service".into(),
                description: Some("invoices".into()),
                ssh_url_to_repo: "git@gitlab.example.com:acme/billing-service.git".into(),
                http_url_to_repo: "https://gitlab.example.com/acme/billing-service.git".into(),
                default_branch: Some("main".into()),
                archived: false,
            },
        );
        assert_eq!(repo.id, "9");
        assert_eq!(repo.path, "billing-service");
        assert_eq!(repo.group_id, "42");
        assert_eq!(repo.default_branch, "main");
    }

    #[tokio::test]
    async fn test_create_group_requires_name_and_path() {
        let gl = gitlab(false);
        let err = gl.create_group(&NewGroup::default()).await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::MissingParameter { name: "name" }
        ));

        let draft = NewGroup {
            name: Some("acme".into()),
            ..Default::default()
        };
        let err = gl.create_group(&draft).await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::MissingParameter { name: "path" }
        ));
    }

    #[tokio::test]
    async fn test_review_requests_unsupported() {
        let gl = gitlab(false);
        let err = gl
            .create_review_request(&Repository::default(), "fix", "main", "t", "m", false)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("merge request"));
        assert!(message.contains("gitlab"));
    }
}
