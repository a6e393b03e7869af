//! Error types for remote provider operations.

use thiserror::Error;

/// Result type for remote provider operations
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Errors surfaced by the provider capability.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The REST call itself failed (connect, TLS, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The backend rejected our credentials.
    #[error("authentication failed against {provider}: {detail}")]
    AuthFailure {
        provider: &'static str,
        detail: String,
    },

    /// The backend answered with a non-success status.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// A required creation argument is absent after all fallbacks.
    #[error("missing parameter: {name}")]
    MissingParameter { name: &'static str },

    /// The backend does not implement this capability. Explicit so an
    /// operator-requested operation is never silently skipped.
    #[error("{operation} is not supported by the {provider} backend")]
    Unsupported {
        provider: &'static str,
        operation: &'static str,
    },

    /// The response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Delegated token acquisition via an external CLI failed.
    #[error("cannot obtain delegated token: {0}")]
    DelegatedToken(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Decode(err.to_string())
    }
}
