//! Thin REST helper shared by the provider backends.
//!
//! Maps HTTP outcomes onto the error taxonomy: 401/403 become
//! `AuthFailure`, other non-success statuses become `Api`, transport
//! failures become `Network`, and undecodable bodies become `Decode`.

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::auth::Authorization;
use crate::error::{RemoteError, RemoteResult};

const USER_AGENT: &str = concat!("flotilla/", env!("CARGO_PKG_VERSION"));

pub(crate) struct RestClient {
    provider: &'static str,
    client: reqwest::Client,
    auth: Authorization,
}

impl RestClient {
    pub(crate) fn new(provider: &'static str, auth: Authorization) -> RemoteResult<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            provider,
            client,
            auth,
        })
    }

    /// GET a JSON document; also returns the response headers so callers can
    /// follow provider-specific pagination.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> RemoteResult<(T, HeaderMap)> {
        debug!(provider = self.provider, url = %url, "GET");
        let request = self.auth.apply(self.client.get(url)).await?;
        let response = request.send().await?;
        let headers = response.headers().clone();
        let body = self.read_success(response).await?;
        Ok((serde_json::from_str(&body)?, headers))
    }

    pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        payload: &B,
    ) -> RemoteResult<T> {
        debug!(provider = self.provider, url = %url, "POST");
        let request = self.auth.apply(self.client.post(url)).await?;
        let response = request.json(payload).send().await?;
        let body = self.read_success(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub(crate) async fn patch_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        payload: &B,
    ) -> RemoteResult<T> {
        debug!(provider = self.provider, url = %url, "PATCH");
        let request = self.auth.apply(self.client.patch(url)).await?;
        let response = request.json(payload).send().await?;
        let body = self.read_success(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Read the body, mapping non-success statuses onto the taxonomy.
    async fn read_success(&self, response: reqwest::Response) -> RemoteResult<String> {
        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(RemoteError::AuthFailure {
                provider: self.provider,
                detail: one_line(&body),
            });
        }
        if !status.is_success() {
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message: one_line(&body),
            });
        }
        Ok(body)
    }
}

/// Flatten a response body to a single annotated line for error messages.
fn one_line(body: &str) -> String {
    let flat = body.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() > 300 {
        let head: String = trimmed.chars().take(300).collect();
        format!("{head}...")
    } else {
        trimmed.to_string()
    }
}
