//! Flotilla-Remote: hosting-provider backends for Flotilla
//!
//! This crate maps GitHub-like, GitLab-like and Azure-DevOps-like REST APIs
//! onto one canonical model, so the fleet pipeline and the CLI never branch
//! on provider identity.
//!
//! ## Key Components
//!
//! - `RemoteProvider`: the capability trait every backend implements
//! - `Group` / `Repository` / `ReviewRequest`: the canonical model
//! - `Authorization`: per-request auth decorator (token, basic, delegated)
//! - `provider_for`: factory wiring settings + auth into a backend

mod auth;
mod azure;
mod error;
pub mod fakes;
mod github;
mod gitlab;
mod model;
mod provider;
mod rest;

pub use auth::{Authorization, DelegatedToken};
pub use error::{RemoteError, RemoteResult};
pub use model::{
    normalize_folder, Group, Labels, NewGroup, NewRepository, Repository, ReviewRequest,
};
pub use provider::{provider_for, ProviderKind, ProviderSettings, RemoteProvider};
