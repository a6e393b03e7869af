//! GitHub-like backend.
//!
//! Uses the v3 REST API. Works against github.com (base URL containing
//! `api.github.com`) and on-premise instances (`<base>/api/v3`).

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

/// Synthetic group id giving access to the credential owner's personal
/// repositories, which no organization covers.
const PERSONAL_GROUP_ID: &str = "personal";

const LABELS: Labels = Labels {
    group: "organization",
    groups: "organizations",
    repository: "repository",
    repositories: "repositories",
    review_request: "pull request",
};

pub struct GitHub {
    rest: RestClient,
    api_url: String,
    settings: ProviderSettings,
}

#[derive(Debug, Deserialize)]
struct GhOrg {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhRepo {
    id: i64,
    name: String,
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    clone_url: String,
    #[serde(default)]
    ssh_url: String,
    #[serde(default)]
    default_branch: String,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Serialize)]
struct GhCreateOrg<'a> {
    login: &'a str,
    admin: &'a str,
    profile_name: &'a str,
}

#[derive(Debug, Serialize)]
struct GhUpdateOrg<'a> {
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct GhCreateRepository<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
}

#[derive(Debug, Serialize)]
struct GhCreatePullRequest<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: &'a str,
    draft: bool,
}

#[derive(Debug, Deserialize)]
struct GhPullRequest {
    id: i64,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    mergeable: Option<bool>,
}

impl GitHub {
    pub fn new(settings: ProviderSettings, auth: Authorization) -> RemoteResult<Self> {
        let api_url = api_root(&settings.base_url);
        Ok(Self {
            rest: RestClient::new("github", auth)?,
            api_url,
            settings,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    /// Repository listing base for a group: the personal pseudo-group reads
    /// the authenticated user's repositories.
    fn group_base_path(&self, group_id: &str) -> String {
        if group_id == PERSONAL_GROUP_ID {
            "user".to_string()
        } else {
            format!("orgs/{group_id}")
        }
    }

    fn map_repo(&self, group_id: &str, repo: GhRepo) -> Repository {
        let normalize = self.settings.normalize_names;
        Repository {
            id: repo.id.to_string(),
            path: normalize_folder(&repo.name, normalize),
            path_with_namespace: normalize_folder(&repo.full_name, normalize),
            name: repo.name,
            name_with_namespace: repo.full_name,
            description: repo.description.unwrap_or_default(),
            http_url: repo.clone_url,
            ssh_url: repo.ssh_url,
            default_branch: repo.default_branch,
            archived: repo.archived,
            group_id: group_id.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl RemoteProvider for GitHub {
    fn labels(&self) -> Labels {
        LABELS
    }

    async fn list_groups(&self) -> RemoteResult<Vec<Group>> {
        let (orgs, _) = self
            .rest
            .get_json::<Vec<GhOrg>>(&self.url("user/orgs"))
            .await?;

        let mut groups: Vec<Group> = orgs
            .into_iter()
            .map(|org| Group {
                id: org.login.clone(),
                name: org.login,
            })
            .collect();

        // The personal group keeps user-owned repositories reachable.
        groups.push(Group {
            id: PERSONAL_GROUP_ID.to_string(),
            name: "Personal repositories".to_string(),
        });

        Ok(groups)
    }

    async fn list_repositories(&self, group_ids: &[String]) -> RemoteResult<Vec<Repository>> {
        let mut repositories = Vec::new();

        for group_id in group_ids {
            let base = self.group_base_path(group_id);
            let mut page: u32 = 1;

            loop {
                let url = self.url(&format!("{base}/repos?type=sources&page={page}"));
                let (repos, headers) = self.rest.get_json::<Vec<GhRepo>>(&url).await?;
                debug!(group = %group_id, page, count = repos.len(), "fetched repository page");

                repositories.extend(
                    repos
                        .into_iter()
                        .filter(|r| self.settings.include_archived || !r.archived)
                        .map(|r| self.map_repo(group_id, r)),
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
        let login = draft
            .name
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(RemoteError::MissingParameter { name: "name" })?;
        let admin = draft
            .admin
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(RemoteError::MissingParameter { name: "admin" })?;

        let payload = GhCreateOrg {
            login,
            admin,
            profile_name: login,
        };
        let created: GhOrg = self
            .rest
            .post_json(&self.url("admin/organizations"), &payload)
            .await?;
        let org_id = created.id.to_string();

        if let Some(description) = draft.description.as_deref().filter(|s| !s.is_empty()) {
            let update = GhUpdateOrg { description };
            let _: GhOrg = self
                .rest
                .patch_json(&self.url(&format!("orgs/{org_id}")), &update)
                .await?;
        }

        Ok(org_id)
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

        let payload = GhCreateRepository {
            name,
            description: draft.description.as_deref().unwrap_or(""),
            private: draft.visibility.as_deref() != Some("public"),
        };
        let url = self.url(&format!("{}/repos", self.group_base_path(group_id)));
        let created: GhRepo = self.rest.post_json(&url, &payload).await?;
        Ok(created.id.to_string())
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
        let payload = GhCreatePullRequest {
            title,
            head: from_branch,
            base: into_branch,
            body: message,
            draft,
        };
        let url = self.url(&format!("repos/{}/pulls", repository.name_with_namespace));
        let created: GhPullRequest = self.rest.post_json(&url, &payload).await?;

        Ok(ReviewRequest {
            id: created.id.to_string(),
            url: created.html_url,
            state: created.state,
            mergeable: match created.mergeable {
                Some(true) => "true".to_string(),
                Some(false) => "false".to_string(),
                None => String::new(),
            },
        })
    }
}

/// Derive the API root: github.com URLs already point at the API host,
/// on-premise instances serve the API under `/api/v3`.
fn api_root(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.contains("api.github.com") {
        base.to_string()
    } else {
        format!("{base}/api/v3")
    }
}

/// Extract the next page number from a `Link` header carrying
/// `rel="next"`, if any.
fn next_page(headers: &HeaderMap) -> Option<u32> {
    let link = headers.get("link").and_then(|v| v.to_str().ok())?;

    for part in link.split(',') {
        let mut segments = part.trim().split(';');
        let href = match segments.next() {
            Some(href) => href.trim(),
            None => continue,
        };
        if !href.starts_with('<') || !href.ends_with('>') {
            continue;
        }
        let target = match reqwest::Url::parse(&href[1..href.len() - 1]) {
            Ok(url) => url,
            Err(_) => continue,
        };
        let page = match target.query_pairs().find(|(key, _)| key == "page") {
            Some((_, value)) => value.to_string(),
            None => continue,
        };
        if segments.any(|segment| segment.trim() == r#"rel="next""#) {
            return page.parse().ok();
        }
    }

    None
}
