//! Fleet automation over a workspace of git repositories.
//!
//! The crate discovers working copies under a workspace root, filters them
//! through glob selectors, and drives each one through the exec pipeline:
//! sync with the default branch, run an operator-provided action script,
//! then commit, push and open a review request, with interactive gates
//! between the phases. Remote hosting back-ends come from
//! `flotilla-remote`; everything here works against the [`VersionControl`]
//! and [`ActionRunner`] traits so tests run on in-memory fakes.

mod actions;
mod command;
mod config;
mod discovery;
mod error;
pub mod fakes;
mod gate;
mod pipeline;
mod selector;
mod session;
mod status;
mod telemetry;
mod vcs;

pub use actions::{ActionRunner, WorkspaceActions};
pub use command::{run_captured, CommandOutput};
pub use config::{AuthMode, CloneProtocol, FleetConfig, ProviderConfig, TOKEN_ENV};
pub use discovery::discover_repositories;
pub use error::{FleetError, FleetResult};
pub use gate::GateController;
pub use pipeline::{CloneOutcome, CloneReport, ExecRequest, FleetPipeline};
pub use selector::{RepoSelector, Selection};
pub use session::{FleetSession, RepoOutcome, RepoResult, RunSummary};
pub use status::{working_copy_status, DirtyKind, RepoStatus, WorkingCopyStatus};
pub use telemetry::init_tracing;
pub use vcs::{CloneStatus, GitVcs, VersionControl, STASH_LABEL};
