//! Per-request authorization decorators.
//!
//! Token acquisition is external to the capability: callers hand a prepared
//! [`Authorization`] to the backend and every outgoing request is decorated
//! with it. The only state is the delegated-token cache, which lives in the
//! decorator value itself for the lifetime of the process.

use tokio::sync::OnceCell;

use crate::error::{RemoteError, RemoteResult};

/// Azure DevOps resource GUID understood by `az account get-access-token`.
const AZURE_DEVOPS_RESOURCE: &str = "499b84ac-1321-427f-aa17-267ca6975798";

/// How outgoing requests are authorized.
#[derive(Debug)]
pub enum Authorization {
    /// `Authorization: token <t>` header (GitHub-like).
    Token(String),
    /// `PRIVATE-TOKEN: <t>` header (GitLab-like).
    PrivateToken(String),
    /// HTTP basic auth with a blank user name (Azure-like personal tokens).
    Basic(String),
    /// Bearer token minted once per process by an external CLI.
    Delegated(DelegatedToken),
}

impl Authorization {
    /// Decorate a request builder with this authorization.
    pub async fn apply(
        &self,
        request: reqwest::RequestBuilder,
    ) -> RemoteResult<reqwest::RequestBuilder> {
        match self {
            Authorization::Token(token) => Ok(request.header("Authorization", format!("token {token}"))),
            Authorization::PrivateToken(token) => Ok(request.header("PRIVATE-TOKEN", token.clone())),
            Authorization::Basic(token) => Ok(request.basic_auth("", Some(token.clone()))),
            Authorization::Delegated(delegated) => {
                let bearer = delegated.bearer().await?;
                Ok(request.bearer_auth(bearer))
            }
        }
    }
}

/// Bearer token obtained from the Azure CLI, fetched on first use and cached
/// for the rest of the process.
#[derive(Debug, Default)]
pub struct DelegatedToken {
    cached: OnceCell<String>,
}

impl DelegatedToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token, minting it on first call.
    pub async fn bearer(&self) -> RemoteResult<&str> {
        let token = self
            .cached
            .get_or_try_init(|| async { mint_azure_cli_token().await })
            .await?;
        Ok(token.as_str())
    }
}

/// Run `az account get-access-token` and return the trimmed token.
async fn mint_azure_cli_token() -> RemoteResult<String> {
    let output = tokio::process::Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--resource",
            AZURE_DEVOPS_RESOURCE,
            "--query",
            "accessToken",
            "-o",
            "tsv",
        ])
        .output()
        .await
        .map_err(|e| RemoteError::DelegatedToken(format!("failed to run az: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RemoteError::DelegatedToken(stderr.trim().to_string()));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(RemoteError::DelegatedToken(
            "az returned an empty token".to_string(),
        ));
    }

    Ok(token)
}
