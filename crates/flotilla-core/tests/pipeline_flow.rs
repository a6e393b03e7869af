//! Pipeline behavior tests on in-memory fakes.

use std::path::Path;
use std::sync::Arc;

use flotilla_core::fakes::{RecordingActions, RecordingVcs};
use flotilla_core::{
    ExecRequest, FleetConfig, FleetPipeline, GateController, RepoOutcome, RepoSelector, RunSummary,
};
use flotilla_remote::fakes::StaticProvider;
use flotilla_remote::{RemoteProvider, Repository};

fn workspace_with(folders: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for folder in folders {
        std::fs::create_dir_all(dir.path().join(folder).join(".git")).expect("create folder");
    }
    dir
}

fn remote_repo(path: &str, default_branch: &str) -> Repository {
    Repository {
        id: path.to_string(),
        name: path.to_string(),
        path: path.to_string(),
        name_with_namespace: format!("team/{path}"),
        path_with_namespace: format!("team/{path}"),
        ssh_url: format!("git@example.com:team/{path}.git"),
        http_url: format!("https://example.com/team/{path}.git"),
        default_branch: default_branch.to_string(),
        group_id: "team".to_string(),
        ..Repository::default()
    }
}

fn pipeline(
    workspace: &Path,
    vcs: &Arc<RecordingVcs>,
    actions: &Arc<RecordingActions>,
    provider: Option<Arc<StaticProvider>>,
) -> FleetPipeline {
    let mut config = FleetConfig::default();
    config.provider.group_ids = vec!["team".to_string()];
    FleetPipeline::new(
        workspace,
        config,
        vcs.clone(),
        actions.clone(),
        provider.map(|p| p as Arc<dyn RemoteProvider>),
    )
}

fn request(commit_message: Option<&str>) -> ExecRequest {
    ExecRequest {
        action: "fix-deps".to_string(),
        commit_message: commit_message.map(str::to_string),
        ..ExecRequest::default()
    }
}

fn select_all() -> RepoSelector {
    RepoSelector::new(None, &[]).expect("selector")
}

fn position(calls: &[String], entry: &str) -> usize {
    calls
        .iter()
        .position(|c| c == entry)
        .unwrap_or_else(|| panic!("missing call '{entry}' in {calls:?}"))
}

async fn run(
    pipeline: &FleetPipeline,
    request: &ExecRequest,
    gate: &mut GateController,
) -> RunSummary {
    pipeline
        .run(request, &select_all(), gate)
        .await
        .expect("run failed")
}

/// Test: a repository the action leaves untouched is completed without a
/// commit or a push.
#[tokio::test]
async fn test_clean_repository_never_commits_or_pushes() {
    let workspace = workspace_with(&["alpha"]);
    let vcs = Arc::new(RecordingVcs::new());
    let actions = Arc::new(RecordingActions::new());
    let pipeline = pipeline(workspace.path(), &vcs, &actions, None);

    let summary = run(&pipeline, &request(Some("fix")), &mut GateController::scripted("")).await;

    assert_eq!(summary.completed(), 1, "clean repo should complete");
    let calls = vcs.calls();
    assert!(
        !calls.iter().any(|c| c.starts_with("commit") || c.starts_with("push")),
        "no commit or push expected, got {calls:?}"
    );
    assert_eq!(actions.runs().len(), 1, "action should still run");
}

/// Test: a non-interactive run with staged changes commits then pushes.
#[tokio::test]
async fn test_staged_changes_are_committed_then_pushed() {
    let workspace = workspace_with(&["alpha"]);
    let vcs = Arc::new(RecordingVcs::new().with_staged("alpha"));
    let actions = Arc::new(RecordingActions::new());
    let pipeline = pipeline(workspace.path(), &vcs, &actions, None);

    let summary = run(
        &pipeline,
        &request(Some("fix deps")),
        &mut GateController::scripted(""),
    )
    .await;

    assert_eq!(summary.completed(), 1);
    let calls = vcs.calls();
    let commit = position(&calls, "commit alpha fix deps");
    let push = position(&calls, "push alpha");
    assert!(commit < push, "commit must precede push: {calls:?}");
}

/// Test: changes without a commit message fail that repository only.
#[tokio::test]
async fn test_missing_commit_message_fails_repository() {
    let workspace = workspace_with(&["alpha", "beta"]);
    let vcs = Arc::new(RecordingVcs::new().with_staged("alpha"));
    let actions = Arc::new(RecordingActions::new());
    let pipeline = pipeline(workspace.path(), &vcs, &actions, None);

    let summary = run(&pipeline, &request(None), &mut GateController::scripted("")).await;

    assert_eq!(summary.failed(), 1, "alpha must fail");
    assert_eq!(summary.completed(), 1, "beta is untouched and completes");
    let failed = summary
        .results
        .iter()
        .find(|r| r.folder == "alpha")
        .expect("alpha result");
    match &failed.outcome {
        RepoOutcome::Failed { error } => {
            assert!(error.contains("commit-message"), "got: {error}")
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(
        !vcs.calls().iter().any(|c| c.starts_with("commit")),
        "nothing may be committed without a message"
    );
}

/// Test: an invalid gate answer re-prompts; `n` then skips before the
/// action runs.
#[tokio::test]
async fn test_declined_execute_gate_skips_without_running_action() {
    let workspace = workspace_with(&["alpha"]);
    let vcs = Arc::new(RecordingVcs::new());
    let actions = Arc::new(RecordingActions::new());
    let pipeline = pipeline(workspace.path(), &vcs, &actions, None);

    let mut exec = request(Some("fix"));
    exec.interactive = true;
    let summary = run(&pipeline, &exec, &mut GateController::scripted("x\nn\n")).await;

    assert_eq!(summary.skipped(), 1);
    assert!(actions.runs().is_empty(), "action must not run after n");
    assert!(!summary.aborted);
}

/// Test: quitting at a gate aborts the whole run; later repositories never
/// enter the pipeline.
#[tokio::test]
async fn test_quit_aborts_remaining_repositories() {
    let workspace = workspace_with(&["alpha", "beta"]);
    let vcs = Arc::new(RecordingVcs::new());
    let actions = Arc::new(RecordingActions::new());
    let pipeline = pipeline(workspace.path(), &vcs, &actions, None);

    let mut exec = request(Some("fix"));
    exec.interactive = true;
    let summary = run(&pipeline, &exec, &mut GateController::scripted("q\n")).await;

    assert!(summary.aborted, "quit must abort the run");
    assert_eq!(summary.results.len(), 1, "beta never entered the pipeline");
    assert!(actions.runs().is_empty());
}

/// Test: `a` holds for the rest of the run, later gates are not consulted.
#[tokio::test]
async fn test_accept_all_suppresses_later_gates() {
    let workspace = workspace_with(&["alpha", "beta"]);
    let vcs = Arc::new(RecordingVcs::new().with_staged("alpha").with_staged("beta"));
    let actions = Arc::new(RecordingActions::new());
    let pipeline = pipeline(workspace.path(), &vcs, &actions, None);

    let mut exec = request(Some("fix"));
    exec.interactive = true;
    // One single scripted answer; any further gate would hit the end of
    // the script and quit.
    let summary = run(&pipeline, &exec, &mut GateController::scripted("a\n")).await;

    assert!(!summary.aborted, "accept-all must silence later gates");
    assert_eq!(summary.completed(), 2);
    assert_eq!(vcs.calls().iter().filter(|c| c.starts_with("push")).count(), 2);
}

/// Test: `d` at the commit gate prints the diff and asks again.
#[tokio::test]
async fn test_diff_answer_loops_back_to_commit_gate() {
    let workspace = workspace_with(&["alpha"]);
    let vcs = Arc::new(
        RecordingVcs::new()
            .with_staged("alpha")
            .with_diff("alpha", "+fixed line"),
    );
    let actions = Arc::new(RecordingActions::new());
    let pipeline = pipeline(workspace.path(), &vcs, &actions, None);

    let mut exec = request(Some("fix"));
    exec.interactive = true;
    let summary = run(
        &pipeline,
        &exec,
        &mut GateController::scripted("y\nd\ny\ny\n"),
    )
    .await;

    assert_eq!(summary.completed(), 1);
    let calls = vcs.calls();
    let diff = position(&calls, "diff alpha");
    let commit = position(&calls, "commit alpha fix");
    assert!(diff < commit, "diff shown before committing: {calls:?}");
}

/// Test: full work-branch flow opens a review request from the work branch
/// into the default branch and restores the default branch afterwards.
#[tokio::test]
async fn test_work_branch_review_flow() {
    let workspace = workspace_with(&["svc-auth"]);
    let vcs = Arc::new(RecordingVcs::new().with_staged("svc-auth"));
    let actions = Arc::new(RecordingActions::new());
    let provider = Arc::new(
        StaticProvider::new().with_repositories(vec![remote_repo("svc-auth", "main")]),
    );
    let pipeline = pipeline(workspace.path(), &vcs, &actions, Some(provider.clone()));

    let mut exec = request(Some("fix deps"));
    exec.branch = Some("bulk-fix".to_string());
    exec.review = true;
    let summary = run(&pipeline, &exec, &mut GateController::scripted("")).await;

    assert_eq!(summary.completed(), 1);
    let calls = vcs.calls();
    position(&calls, "create_branch svc-auth bulk-fix");
    position(&calls, "push svc-auth -u origin bulk-fix");
    let restore = position(&calls, "checkout svc-auth main");
    assert_eq!(restore, calls.len() - 1, "restore is the last git step");

    let reviews = provider.created_reviews.lock().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].repository, "team/svc-auth");
    assert_eq!(reviews[0].from_branch, "bulk-fix");
    assert_eq!(reviews[0].into_branch, "main");
    assert_eq!(reviews[0].title, "fix deps", "title falls back to the commit message");
}

/// Test: working directly on the default branch never opens a review.
#[tokio::test]
async fn test_no_review_when_work_branch_is_default() {
    let workspace = workspace_with(&["svc-auth"]);
    let vcs = Arc::new(RecordingVcs::new().with_staged("svc-auth"));
    let actions = Arc::new(RecordingActions::new());
    let provider = Arc::new(
        StaticProvider::new().with_repositories(vec![remote_repo("svc-auth", "main")]),
    );
    let pipeline = pipeline(workspace.path(), &vcs, &actions, Some(provider.clone()));

    let mut exec = request(Some("fix"));
    exec.branch = Some("main".to_string());
    exec.review = true;
    let summary = run(&pipeline, &exec, &mut GateController::scripted("")).await;

    assert_eq!(summary.completed(), 1);
    assert!(
        provider.created_reviews.lock().unwrap().is_empty(),
        "no review request from the default branch into itself"
    );
}

/// Test: without a work branch the review flag is inert; the push goes to
/// the current branch and no review request is opened.
#[tokio::test]
async fn test_no_review_without_work_branch() {
    let workspace = workspace_with(&["svc-auth"]);
    let vcs = Arc::new(RecordingVcs::new().with_staged("svc-auth"));
    let actions = Arc::new(RecordingActions::new());
    let provider = Arc::new(
        StaticProvider::new().with_repositories(vec![remote_repo("svc-auth", "main")]),
    );
    let pipeline = pipeline(workspace.path(), &vcs, &actions, Some(provider.clone()));

    let mut exec = request(Some("fix"));
    exec.review = true;
    let summary = run(&pipeline, &exec, &mut GateController::scripted("")).await;

    assert_eq!(summary.completed(), 1);
    position(&vcs.calls(), "push svc-auth");
    assert!(provider.created_reviews.lock().unwrap().is_empty());
}

/// Test: the selector decides which remote repositories are cloned.
#[tokio::test]
async fn test_clone_missing_respects_selector() {
    let workspace = workspace_with(&[]);
    let vcs = Arc::new(RecordingVcs::new());
    let actions = Arc::new(RecordingActions::new());
    let provider = Arc::new(StaticProvider::new().with_repositories(vec![
        remote_repo("billing-core", "main"),
        remote_repo("svc-auth", "main"),
        remote_repo("svc-legacy", "main"),
    ]));
    let pipeline = pipeline(workspace.path(), &vcs, &actions, Some(provider));

    let selector =
        RepoSelector::new(Some("svc-*"), &["svc-legacy".to_string()]).expect("selector");
    let summary = pipeline
        .run(&request(Some("fix")), &selector, &mut GateController::scripted(""))
        .await
        .expect("run failed");

    let calls = vcs.calls();
    assert_eq!(
        calls,
        vec!["clone git@example.com:team/svc-auth.git svc-auth".to_string()],
        "only svc-auth qualifies for cloning"
    );
    // The fake clones nothing on disk, so no local folder entered the run.
    assert!(summary.results.is_empty());
}

/// Test: both repositories sharing a clone path, only the first is cloned.
#[tokio::test]
async fn test_duplicate_clone_paths_cloned_once() {
    let workspace = workspace_with(&[]);
    let vcs = Arc::new(RecordingVcs::new());
    let actions = Arc::new(RecordingActions::new());
    let mut first = remote_repo("svc", "main");
    first.name_with_namespace = "a/svc".to_string();
    let mut second = remote_repo("svc", "main");
    second.name_with_namespace = "b/svc".to_string();
    let provider = Arc::new(StaticProvider::new().with_repositories(vec![first, second]));
    let pipeline = pipeline(workspace.path(), &vcs, &actions, Some(provider));

    pipeline
        .run(&request(Some("fix")), &select_all(), &mut GateController::scripted(""))
        .await
        .expect("run failed");

    let clones = vcs
        .calls()
        .iter()
        .filter(|c| c.starts_with("clone"))
        .count();
    assert_eq!(clones, 1, "second repository must not overwrite the first");
}

/// Test: an action failure marks that repository failed and the run moves
/// on to the next one.
#[tokio::test]
async fn test_action_failure_is_isolated() {
    let workspace = workspace_with(&["alpha", "beta"]);
    let vcs = Arc::new(RecordingVcs::new().with_staged("beta"));
    let actions = Arc::new(RecordingActions::new().failing_in("alpha"));
    let pipeline = pipeline(workspace.path(), &vcs, &actions, None);

    let summary = run(&pipeline, &request(Some("fix")), &mut GateController::scripted("")).await;

    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.completed(), 1);
    assert!(
        !vcs.calls().iter().any(|c| c == "commit alpha fix"),
        "failed action must not commit"
    );
    position(&vcs.calls(), "commit beta fix");
}

/// Test: a push failure fails the repository.
#[tokio::test]
async fn test_push_failure_fails_repository() {
    let workspace = workspace_with(&["alpha"]);
    let vcs = Arc::new(RecordingVcs::new().with_staged("alpha").failing_push("alpha"));
    let actions = Arc::new(RecordingActions::new());
    let pipeline = pipeline(workspace.path(), &vcs, &actions, None);

    let summary = run(&pipeline, &request(Some("fix")), &mut GateController::scripted("")).await;

    assert_eq!(summary.failed(), 1);
    match &summary.results[0].outcome {
        RepoOutcome::Failed { error } => assert!(error.contains("push"), "got: {error}"),
        other => panic!("expected failure, got {other:?}"),
    }
}

/// Test: the default branch is restored even when the iteration failed.
#[tokio::test]
async fn test_default_branch_restored_after_failure() {
    let workspace = workspace_with(&["alpha"]);
    let vcs = Arc::new(RecordingVcs::new());
    let actions = Arc::new(RecordingActions::new().failing_in("alpha"));
    let pipeline = pipeline(workspace.path(), &vcs, &actions, None);

    let mut exec = request(Some("fix"));
    exec.branch = Some("bulk-fix".to_string());
    let summary = run(&pipeline, &exec, &mut GateController::scripted("")).await;

    assert_eq!(summary.failed(), 1);
    position(&vcs.calls(), "checkout alpha main");
}
