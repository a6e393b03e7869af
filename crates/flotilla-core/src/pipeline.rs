//! Fleet automation pipeline.
//!
//! One run drives every selected repository through the same sequence:
//! sync, optional work branch, action execution, then commit / push /
//! review request, each behind an operator gate in interactive mode. A
//! failure in one repository is recorded and the run moves on; only an
//! explicit quit stops the fleet.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use flotilla_remote::{RemoteProvider, Repository};

use crate::actions::ActionRunner;
use crate::config::FleetConfig;
use crate::discovery::discover_repositories;
use crate::error::{FleetError, FleetResult};
use crate::gate::GateController;
use crate::selector::RepoSelector;
use crate::session::{FleetSession, RepoOutcome, RunSummary};
use crate::vcs::{CloneStatus, VersionControl};

/// Parameters of one `exec` invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    /// Action script name under the workspace's actions directory.
    pub action: String,
    /// Arguments passed to the action verbatim.
    pub params: Vec<String>,
    /// Consult gates; a non-interactive run answers `y` everywhere.
    pub interactive: bool,
    /// Work branch to create before executing. `None` works on the
    /// current branch and skips review requests.
    pub branch: Option<String>,
    /// Required as soon as the action leaves changes behind.
    pub commit_message: Option<String>,
    /// Open a review request after a successful push.
    pub review: bool,
    /// Review title; falls back to the commit message.
    pub review_title: Option<String>,
    pub review_message: Option<String>,
    pub review_draft: bool,
}

/// What happened to one remote repository during the clone phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneOutcome {
    Cloned,
    /// The remote exists but has no commits yet.
    ClonedEmpty,
    AlreadyPresent,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct CloneReport {
    pub folder: String,
    pub outcome: CloneOutcome,
}

/// Operator's verdict at a gate.
enum GateOutcome {
    Proceed,
    Skip,
    Quit,
}

/// How one repository iteration ended.
enum RepoRun {
    Done(RepoOutcome),
    Aborted,
}

pub struct FleetPipeline {
    workspace: PathBuf,
    config: FleetConfig,
    vcs: Arc<dyn VersionControl>,
    actions: Arc<dyn ActionRunner>,
    provider: Option<Arc<dyn RemoteProvider>>,
}

impl FleetPipeline {
    pub fn new(
        workspace: impl Into<PathBuf>,
        config: FleetConfig,
        vcs: Arc<dyn VersionControl>,
        actions: Arc<dyn ActionRunner>,
        provider: Option<Arc<dyn RemoteProvider>>,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            config,
            vcs,
            actions,
            provider,
        }
    }

    /// Run `request` against every selected repository of the workspace.
    ///
    /// Remote repositories missing locally are cloned first so they take
    /// part in the same run. The summary holds one entry per repository
    /// that entered the pipeline.
    pub async fn run(
        &self,
        request: &ExecRequest,
        selector: &RepoSelector,
        gate: &mut GateController,
    ) -> FleetResult<RunSummary> {
        let remote = self.remote_repositories().await;
        for report in self.clone_missing(&remote, selector) {
            match &report.outcome {
                CloneOutcome::Cloned => info!(folder = %report.folder, "cloned"),
                CloneOutcome::ClonedEmpty => {
                    warn!(folder = %report.folder, "cloned an empty repository")
                }
                CloneOutcome::Failed(error) => {
                    warn!(folder = %report.folder, %error, "clone failed")
                }
                CloneOutcome::AlreadyPresent | CloneOutcome::Skipped(_) => {}
            }
        }
        let by_path = index_repositories(&remote);

        let folders: Vec<String> = discover_repositories(&self.workspace)?
            .into_iter()
            .filter(|folder| {
                let selection = selector.classify(folder);
                if let Some(reason) = selection.reason() {
                    debug!(folder = %folder, %reason, "filtered out");
                }
                selection.is_selected()
            })
            .collect();

        let mut session = FleetSession::new();
        let mut summary = RunSummary::default();
        for folder in &folders {
            info!(folder = %folder, "processing repository");
            let repo = by_path.get(folder.as_str()).copied();
            match self
                .process_repository(folder, repo, request, gate, &mut session)
                .await
            {
                RepoRun::Done(outcome) => {
                    match &outcome {
                        RepoOutcome::Completed => info!(folder = %folder, "done"),
                        RepoOutcome::Skipped { reason } => {
                            info!(folder = %folder, %reason, "skipped")
                        }
                        RepoOutcome::Failed { error } => {
                            warn!(folder = %folder, %error, "failed")
                        }
                    }
                    summary.record(folder.as_str(), outcome);
                }
                RepoRun::Aborted => {
                    info!(folder = %folder, "run aborted by operator");
                    summary.record(
                        folder.as_str(),
                        RepoOutcome::Skipped {
                            reason: "run aborted by operator".to_string(),
                        },
                    );
                    summary.aborted = true;
                    break;
                }
            }
        }
        Ok(summary)
    }

    /// Clone every selected remote repository that has no local folder yet.
    pub fn clone_missing(
        &self,
        repositories: &[Repository],
        selector: &RepoSelector,
    ) -> Vec<CloneReport> {
        let mut reports = Vec::new();
        let mut claimed: HashMap<&str, &str> = HashMap::new();
        for repo in repositories {
            let folder = repo.path.clone();
            let outcome = if let Some(reason) = selector.classify(&repo.path).reason() {
                CloneOutcome::Skipped(reason)
            } else if let Some(other) = claimed.get(repo.path.as_str()) {
                CloneOutcome::Skipped(format!("clone path already used by '{other}'"))
            } else if self.workspace.join(&repo.path).exists() {
                claimed.insert(&repo.path, &repo.name_with_namespace);
                CloneOutcome::AlreadyPresent
            } else {
                claimed.insert(&repo.path, &repo.name_with_namespace);
                let url = self.config.clone_url(repo);
                match self.vcs.clone_repository(url, &repo.path) {
                    Ok(CloneStatus::Cloned) => CloneOutcome::Cloned,
                    Ok(CloneStatus::ClonedEmpty) => CloneOutcome::ClonedEmpty,
                    Err(e) => CloneOutcome::Failed(e.to_string()),
                }
            };
            reports.push(CloneReport { folder, outcome });
        }
        reports
    }

    async fn remote_repositories(&self) -> Vec<Repository> {
        let Some(provider) = &self.provider else {
            return Vec::new();
        };
        match provider
            .list_repositories(&self.config.provider.group_ids)
            .await
        {
            Ok(repositories) => repositories,
            Err(e) => {
                warn!(error = %e, "cannot list remote repositories, continuing with local working copies");
                Vec::new()
            }
        }
    }

    async fn process_repository(
        &self,
        folder: &str,
        repo: Option<&Repository>,
        request: &ExecRequest,
        gate: &mut GateController,
        session: &mut FleetSession,
    ) -> RepoRun {
        let default_branch = match self.default_branch(folder, repo) {
            Ok(branch) => branch,
            Err(e) => {
                return RepoRun::Done(RepoOutcome::Failed {
                    error: e.to_string(),
                })
            }
        };

        let run = self
            .drive(folder, repo, &default_branch, request, gate, session)
            .await;

        // Leave the working copy on its default branch whenever a work
        // branch was requested, whatever the outcome was.
        if request.branch.is_some() {
            if let Err(e) = self.vcs.checkout(folder, &default_branch) {
                warn!(folder, branch = %default_branch, error = %e, "cannot restore default branch");
            }
        }

        match run {
            Ok(run) => run,
            Err(e) => RepoRun::Done(RepoOutcome::Failed {
                error: e.to_string(),
            }),
        }
    }

    /// The per-repository sequence. Errors bubble to the caller, which
    /// turns them into a failed outcome for this repository only.
    async fn drive(
        &self,
        folder: &str,
        repo: Option<&Repository>,
        default_branch: &str,
        request: &ExecRequest,
        gate: &mut GateController,
        session: &mut FleetSession,
    ) -> FleetResult<RepoRun> {
        self.vcs.stash_and_rebase(folder, default_branch);
        if let Some(branch) = &request.branch {
            self.vcs.create_branch(folder, branch)?;
        }

        match self.consult_gate(gate, session, request, "Repository ready. Execute action?")? {
            GateOutcome::Proceed => {}
            GateOutcome::Skip => return Ok(skipped("declined at execute gate")),
            GateOutcome::Quit => return Ok(RepoRun::Aborted),
        }

        debug!(folder, action = %request.action, "executing action");
        self.actions.run(&request.action, &request.params, folder)?;

        let changed = self.vcs.has_uncommitted_changes(folder)?
            || self.vcs.has_staged_changes(folder)?
            || self.vcs.has_untracked(folder)?;
        if !changed {
            info!(folder, "nothing to commit");
            return Ok(RepoRun::Done(RepoOutcome::Completed));
        }

        let message = request
            .commit_message
            .as_deref()
            .filter(|m| !m.is_empty())
            .ok_or(FleetError::MissingParameter {
                name: "commit-message",
            })?;

        match self.consult_commit_gate(gate, session, request, folder)? {
            GateOutcome::Proceed => {}
            GateOutcome::Skip => return Ok(skipped("declined at commit gate")),
            GateOutcome::Quit => return Ok(RepoRun::Aborted),
        }
        self.vcs.add_and_commit(folder, message, true)?;

        match self.consult_gate(gate, session, request, "Changes committed. Push?")? {
            GateOutcome::Proceed => {}
            GateOutcome::Skip => return Ok(skipped("declined at push gate")),
            GateOutcome::Quit => return Ok(RepoRun::Aborted),
        }
        self.vcs.push(folder, request.branch.as_deref())?;

        if let Some(run) = self
            .propose_review(folder, repo, default_branch, request, gate, session)
            .await?
        {
            return Ok(run);
        }

        Ok(RepoRun::Done(RepoOutcome::Completed))
    }

    /// Open a review request when the run qualifies for one. Returns an
    /// early outcome when a gate cut the iteration short.
    async fn propose_review(
        &self,
        folder: &str,
        repo: Option<&Repository>,
        default_branch: &str,
        request: &ExecRequest,
        gate: &mut GateController,
        session: &mut FleetSession,
    ) -> FleetResult<Option<RepoRun>> {
        if !request.review {
            return Ok(None);
        }
        let (Some(provider), Some(repo), Some(branch)) =
            (&self.provider, repo, request.branch.as_deref())
        else {
            return Ok(None);
        };
        if branch == default_branch {
            debug!(folder, branch, "work branch is the default branch, not opening a review");
            return Ok(None);
        }
        let Some(title) = review_title(request) else {
            return Ok(None);
        };

        let label = provider.labels().review_request;
        let prompt = format!("Pushed. Create {label}?");
        match self.consult_gate(gate, session, request, &prompt)? {
            GateOutcome::Proceed => {}
            GateOutcome::Skip => return Ok(Some(skipped("declined at review gate"))),
            GateOutcome::Quit => return Ok(Some(RepoRun::Aborted)),
        }

        let message = request.review_message.as_deref().unwrap_or_default();
        match provider
            .create_review_request(
                repo,
                branch,
                default_branch,
                title,
                message,
                request.review_draft,
            )
            .await
        {
            Ok(review) => info!(folder, url = %review.url, "{label} created"),
            // The branch is already pushed; a failed review request is
            // recoverable by hand and must not fail the repository.
            Err(e) => warn!(folder, error = %e, "cannot create {label}"),
        }
        Ok(None)
    }

    fn default_branch(&self, folder: &str, repo: Option<&Repository>) -> FleetResult<String> {
        if let Some(repo) = repo {
            if !repo.default_branch.is_empty() {
                return Ok(repo.default_branch.clone());
            }
        }
        self.vcs.current_branch(folder)
    }

    fn consult_gate(
        &self,
        gate: &mut GateController,
        session: &mut FleetSession,
        request: &ExecRequest,
        prompt: &str,
    ) -> FleetResult<GateOutcome> {
        if !request.interactive || session.accept_all {
            return Ok(GateOutcome::Proceed);
        }
        let answer = gate.ask(prompt, &["y", "n", "a", "q"])?;
        Ok(decide(&answer, session))
    }

    /// The commit gate also understands `d`, which prints the pending diff
    /// and asks again.
    fn consult_commit_gate(
        &self,
        gate: &mut GateController,
        session: &mut FleetSession,
        request: &ExecRequest,
        folder: &str,
    ) -> FleetResult<GateOutcome> {
        if !request.interactive || session.accept_all {
            return Ok(GateOutcome::Proceed);
        }
        loop {
            let answer = gate.ask("Action done. Commit changes?", &["y", "n", "a", "d", "q"])?;
            if answer == "d" {
                match self.vcs.diff(folder) {
                    Ok(diff) => gate.show(&diff),
                    Err(e) => warn!(folder, error = %e, "cannot display diff"),
                }
                continue;
            }
            return Ok(decide(&answer, session));
        }
    }
}

fn decide(answer: &str, session: &mut FleetSession) -> GateOutcome {
    match answer {
        "n" => GateOutcome::Skip,
        "q" => GateOutcome::Quit,
        "a" => {
            session.accept_all = true;
            GateOutcome::Proceed
        }
        _ => GateOutcome::Proceed,
    }
}

fn skipped(reason: &str) -> RepoRun {
    RepoRun::Done(RepoOutcome::Skipped {
        reason: reason.to_string(),
    })
}

fn review_title(request: &ExecRequest) -> Option<&str> {
    request
        .review_title
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| request.commit_message.as_deref().filter(|m| !m.is_empty()))
}

/// Index remote repositories by both clone path and namespaced path so a
/// working copy found at either depth maps back to its remote entry.
fn index_repositories(repositories: &[Repository]) -> HashMap<&str, &Repository> {
    let mut index: HashMap<&str, &Repository> = HashMap::new();
    for repo in repositories {
        for key in [repo.path.as_str(), repo.path_with_namespace.as_str()] {
            if !key.is_empty() {
                index.entry(key).or_insert(repo);
            }
        }
    }
    index
}
