//! Error types for fleet operations.
//!
//! `FleetError` is the core taxonomy: VCS and action command failures stay
//! local to one repository, configuration and missing-parameter errors are
//! surfaced immediately, and provider errors are wrapped from the remote
//! crate.

use flotilla_remote::RemoteError;
use thiserror::Error;

/// Result type for fleet operations.
pub type FleetResult<T> = std::result::Result<T, FleetError>;

#[derive(Debug, Error)]
pub enum FleetError {
    /// A version-control command exited non-zero. Local to one repository;
    /// the fleet run continues.
    #[error("git {command} failed: {output}")]
    Vcs { command: String, output: String },

    /// An action script exited non-zero. Local to one repository.
    #[error("action '{action}' failed: {output}")]
    Action { action: String, output: String },

    /// Required user input is absent; surfaced before any remote call.
    #[error("missing required parameter '{name}'")]
    MissingParameter { name: &'static str },

    /// A selector pattern did not compile.
    #[error("invalid pattern '{pattern}': {detail}")]
    Pattern { pattern: String, detail: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
