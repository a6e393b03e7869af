//! Azure-DevOps-like backend.
//!
//! Groups map to team projects and every endpoint lives under `_apis`.
//! Listings follow the `x-ms-continuationtoken` header until exhausted.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::Authorization;
use crate::error::{RemoteError, RemoteResult};
use crate::model::{
    normalize_folder, Group, Labels, NewGroup, NewRepository, Repository, ReviewRequest,
};
use crate::provider::{ProviderSettings, RemoteProvider};
use crate::rest::RestClient;

const API_VERSION: &str = "7.1";
const CREATE_PROJECT_API_VERSION: &str = "2.0-preview";

const LABELS: Labels = Labels {
    group: "project",
    groups: "projects",
    repository: "repository",
    repositories: "repositories",
    review_request: "pull request",
};

pub struct AzureDevOps {
    rest: RestClient,
    base_url: String,
    settings: ProviderSettings,
}

/// Azure wraps every collection in `{ value, count }`.
#[derive(Debug, Deserialize)]
struct AzCollection<T> {
    // `default = "Vec::new"` avoids serde's inferred `T: Default` bound.
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct AzProject {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct AzRepository {
    id: String,
    name: String,
    #[serde(default)]
    #[serde(rename = "remoteUrl")]
    remote_url: String,
    #[serde(default)]
    #[serde(rename = "sshUrl")]
    ssh_url: String,
    #[serde(default)]
    #[serde(rename = "webUrl")]
    web_url: String,
    #[serde(default)]
    #[serde(rename = "defaultBranch")]
    default_branch: String,
    #[serde(default)]
    project: AzProject,
}

#[derive(Debug, Deserialize)]
struct AzProcess {
    id: String,
    name: String,
    #[serde(default)]
    #[serde(rename = "isDefault")]
    is_default: bool,
}

#[derive(Debug, Serialize)]
struct AzCreateProject<'a> {
    name: &'a str,
    description: &'a str,
    visibility: &'a str,
    capabilities: AzCapabilities<'a>,
}

#[derive(Debug, Serialize)]
struct AzCapabilities<'a> {
    versioncontrol: AzVersionControl,
    #[serde(rename = "processTemplate")]
    process_template: AzProcessTemplate<'a>,
}

#[derive(Debug, Serialize)]
struct AzVersionControl {
    #[serde(rename = "sourceControlType")]
    source_control_type: &'static str,
}

#[derive(Debug, Serialize)]
struct AzProcessTemplate<'a> {
    #[serde(rename = "templateTypeId")]
    template_type_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct AzCreated {
    id: String,
}

#[derive(Debug, Serialize)]
struct AzCreateRepository<'a> {
    name: &'a str,
    project: AzProjectRef<'a>,
}

#[derive(Debug, Serialize)]
struct AzProjectRef<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct AzCreatePullRequest<'a> {
    title: &'a str,
    description: &'a str,
    #[serde(rename = "sourceRefName")]
    source_ref_name: String,
    #[serde(rename = "targetRefName")]
    target_ref_name: String,
    #[serde(rename = "isDraft")]
    is_draft: bool,
}

#[derive(Debug, Deserialize)]
struct AzPullRequest {
    #[serde(rename = "pullRequestId")]
    pull_request_id: i64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    repository: Option<AzRepository>,
}

impl AzureDevOps {
    pub fn new(settings: ProviderSettings, auth: Authorization) -> RemoteResult<Self> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            rest: RestClient::new("azure", auth)?,
            base_url,
            settings,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Fetch every page of an Azure collection, chasing the continuation
    /// token header.
    async fn list_all<T: serde::de::DeserializeOwned>(&self, path: &str) -> RemoteResult<Vec<T>> {
        let mut items = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let url = match &continuation {
                Some(token) => self.url(&format!("{path}&continuationToken={token}")),
                None => self.url(path),
            };
            let (batch, headers) = self.rest.get_json::<AzCollection<T>>(&url).await?;
            debug!(path, count = batch.value.len(), "fetched collection page");
            items.extend(batch.value);

            match continuation_token(&headers) {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        Ok(items)
    }

    fn map_repo(&self, group_id: &str, repo: AzRepository) -> Repository {
        let normalize = self.settings.normalize_names;
        Repository {
            id: repo.id,
            path: normalize_folder(&repo.name, normalize),
            path_with_namespace: format!(
                "{}/{}",
                normalize_folder(&repo.project.name, normalize),
                normalize_folder(&repo.name, normalize)
            ),
            name_with_namespace: format!("{} / {}", repo.project.name, repo.name),
            name: repo.name,
            description: String::new(),
            http_url: repo.remote_url,
            ssh_url: repo.ssh_url,
            default_branch: strip_ref_prefix(&repo.default_branch).to_string(),
            archived: false,
            group_id: group_id.to_string(),
        }
    }

    /// Resolve the process template for a new project: by name when given,
    /// else the server default.
    async fn resolve_process_template(&self, wanted: Option<&str>) -> RemoteResult<String> {
        let processes: Vec<AzProcess> = self
            .list_all(&format!("_apis/process/processes?api-version={API_VERSION}"))
            .await?;

        if let Some(wanted) = wanted.filter(|s| !s.is_empty()) {
            if let Some(process) = processes
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(wanted))
            {
                return Ok(process.id.clone());
            }
            warn!(template = wanted, "unknown process template, using server default");
        }

        processes
            .iter()
            .find(|p| p.is_default)
            .map(|p| p.id.clone())
            .ok_or_else(|| RemoteError::Api {
                status: 0,
                message: "no default process template advertised".to_string(),
            })
    }
}

#[async_trait::async_trait]
impl RemoteProvider for AzureDevOps {
    fn labels(&self) -> Labels {
        LABELS
    }

    async fn list_groups(&self) -> RemoteResult<Vec<Group>> {
        let projects: Vec<AzProject> = self
            .list_all(&format!("_apis/projects/?api-version={API_VERSION}"))
            .await?;

        Ok(projects
            .into_iter()
            .map(|project| Group {
                id: project.id,
                name: project.name,
            })
            .collect())
    }

    async fn list_repositories(&self, group_ids: &[String]) -> RemoteResult<Vec<Repository>> {
        let mut repositories = Vec::new();

        for group_id in group_ids {
            let repos: Vec<AzRepository> = self
                .list_all(&format!(
                    "{group_id}/_apis/git/repositories/?api-version={API_VERSION}"
                ))
                .await?;
            repositories.extend(repos.into_iter().map(|r| self.map_repo(group_id, r)));
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

        let template_id = self
            .resolve_process_template(draft.process_template.as_deref())
            .await?;

        let payload = AzCreateProject {
            name,
            description: draft.description.as_deref().unwrap_or(""),
            visibility: draft.visibility.as_deref().unwrap_or("private"),
            capabilities: AzCapabilities {
                versioncontrol: AzVersionControl {
                    source_control_type: "GIT",
                },
                process_template: AzProcessTemplate {
                    template_type_id: &template_id,
                },
            },
        };
        let url = self.url(&format!(
            "_apis/projects?api-version={CREATE_PROJECT_API_VERSION}"
        ));
        let created: AzCreated = self.rest.post_json(&url, &payload).await?;
        Ok(created.id)
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

        let payload = AzCreateRepository {
            name,
            project: AzProjectRef { id: group_id },
        };
        let url = self.url(&format!(
            "_apis/git/repositories/?api-version={API_VERSION}"
        ));
        let created: AzCreated = self.rest.post_json(&url, &payload).await?;
        Ok(created.id)
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
        let payload = AzCreatePullRequest {
            title,
            description: message,
            source_ref_name: qualified_ref(from_branch),
            target_ref_name: qualified_ref(into_branch),
            is_draft: draft,
        };
        let url = self.url(&format!(
            "{}/_apis/git/repositories/{}/pullrequests?api-version={API_VERSION}",
            repository.group_id, repository.id
        ));
        let created: AzPullRequest = self.rest.post_json(&url, &payload).await?;

        let web_url = created
            .repository
            .as_ref()
            .map(|r| r.web_url.as_str())
            .unwrap_or_default();

        Ok(ReviewRequest {
            id: created.pull_request_id.to_string(),
            url: format!("{web_url}/pullrequest/{}", created.pull_request_id),
            state: created.status,
            mergeable: String::new(),
        })
    }
}

fn strip_ref_prefix(reference: &str) -> &str {
    reference.strip_prefix("refs/heads/").unwrap_or(reference)
}

/// Fully-qualified ref name; idempotent for already-qualified input.
fn qualified_ref(branch: &str) -> String {
    format!("refs/heads/{}", strip_ref_prefix(branch))
}

fn continuation_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-ms-continuationtoken")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn azure(normalize: bool) -> AzureDevOps {
        let settings = ProviderSettings {
            base_url: "https://dev.example.com/acme/".into(),
            token: "t".into(),
            normalize_names: normalize,
            ..Default::default()
        };
        AzureDevOps::new(settings, Authorization::Basic("t".into())).unwrap()
    }

    #[test]
    fn test_qualified_ref_is_idempotent() {
        assert_eq!(qualified_ref("fix/ticket-1"), "refs/heads/fix/ticket-1");
        assert_eq!(
            qualified_ref("refs/heads/fix/ticket-1"),
            "refs/heads/fix/ticket-1"
        );
    }

    #[test]
    fn test_continuation_token_blank_means_done() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-continuationtoken", HeaderValue::from_static("abc"));
        assert_eq!(continuation_token(&headers), Some("abc".to_string()));

        headers.insert("x-ms-continuationtoken", HeaderValue::from_static(" "));
        assert_eq!(continuation_token(&headers), None);
        assert_eq!(continuation_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_map_repo_namespaces_and_default_branch() {
        let repo = azure(true).map_repo(
            "proj-1",
            AzRepository {
                id: "r-9".into(),
                name: "Fleet Tools".into(),
                remote_url: "https://dev.example.com/acme/Platform/_git/Fleet%20Tools".into(),
                ssh_url: "git@ssh.dev.example.com:v3/acme/Platform/Fleet Tools".into(),
                web_url: "https://dev.example.com/acme/Platform/_git/Fleet%20Tools".into(),
                default_branch: "refs/heads/main".into(),
                project: AzProject {
                    id: "proj-1".into(),
                    name: "Platform".into(),
                },
            },
        );
        assert_eq!(repo.name_with_namespace, "Platform / Fleet Tools");
        assert_eq!(repo.path, "fleet-tools");
        assert_eq!(repo.path_with_namespace, "platform/fleet-tools");
        assert_eq!(repo.default_branch, "main");
        assert!(!repo.archived);
    }

    #[tokio::test]
    async fn test_create_repository_requires_group_and_name() {
        let az = azure(false);
        let err = az
            .create_repository(&NewRepository::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RemoteError::MissingParameter { name: "group" }
        ));

        let draft = NewRepository {
            group_id: Some("proj-1".into()),
            ..Default::default()
        };
        let err = az.create_repository(&draft).await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::MissingParameter { name: "name" }
        ));
    }
}
