//! Per-run session state and outcome collection.
//!
//! `accept_all` is the only state shared across repository iterations in a
//! fleet run. Everything else lives in the per-repository context and is
//! discarded when the iteration ends.

use std::fmt;

/// State owned by one fleet-run invocation.
#[derive(Debug, Default)]
pub struct FleetSession {
    /// Set once the operator answers `a` at any gate; never reset until the
    /// run ends.
    pub accept_all: bool,
}

impl FleetSession {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What happened to one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOutcome {
    Completed,
    Skipped { reason: String },
    Failed { error: String },
}

impl fmt::Display for RepoOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoOutcome::Completed => write!(f, "ok"),
            RepoOutcome::Skipped { reason } => write!(f, "skipped ({reason})"),
            RepoOutcome::Failed { error } => write!(f, "failed ({error})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepoResult {
    pub folder: String,
    pub outcome: RepoOutcome,
}

/// Collected results of one fleet run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub results: Vec<RepoResult>,
    /// True when the operator quit mid-run; repositories after the quit
    /// point never entered the pipeline.
    pub aborted: bool,
}

impl RunSummary {
    pub fn record(&mut self, folder: impl Into<String>, outcome: RepoOutcome) {
        self.results.push(RepoResult {
            folder: folder.into(),
            outcome,
        });
    }

    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, RepoOutcome::Completed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RepoOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RepoOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&RepoOutcome) -> bool) -> usize {
        self.results
            .iter()
            .filter(|r| predicate(&r.outcome))
            .count()
    }
}
