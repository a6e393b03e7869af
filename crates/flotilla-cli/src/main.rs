//! Flotilla - bulk operations over a fleet of git repositories.
//!
//! The `flotilla` command manages a workspace directory full of working
//! copies hosted on one provider (GitHub-like, GitLab-like or Azure
//! DevOps-like back-ends).
//!
//! ## Commands
//!
//! - `init`: interactive workspace setup against one provider
//! - `auth`: update the stored access token
//! - `groups` / `remotes`: browse groups and repositories on the provider
//! - `list` / `status` / `up`: inspect and update local working copies
//! - `clone`: clone repositories that are missing locally
//! - `create-group` / `create-repo`: provision on the provider
//! - `exec`: run an action script across the fleet, then commit, push and
//!   open review requests behind interactive gates

use std::env;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{warn, Level};

use flotilla_core::{
    discover_repositories, init_tracing, working_copy_status, CloneOutcome, CloneProtocol,
    ExecRequest, FleetConfig, FleetPipeline, GateController, GitVcs, RepoSelector, RunSummary,
    VersionControl, WorkspaceActions, TOKEN_ENV,
};
use flotilla_remote::{
    provider_for, NewGroup, NewRepository, ProviderKind, RemoteError, RemoteProvider, Repository,
};

#[derive(Parser)]
#[command(name = "flotilla")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run bulk operations over a fleet of git repositories", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Repository selection shared by fleet-wide commands.
#[derive(Args)]
struct SelectorArgs {
    /// Only repositories matching this glob
    glob: Option<String>,

    /// Skip repositories matching this glob (repeatable)
    #[arg(short = 'e', long = "exclude")]
    exclude: Vec<String>,
}

impl SelectorArgs {
    fn selector(&self) -> Result<RepoSelector> {
        Ok(RepoSelector::new(self.glob.as_deref(), &self.exclude)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Interactively write the workspace configuration
    Init {
        /// Provider kind: github, gitlab or azure (prompted when omitted)
        #[arg(long)]
        kind: Option<String>,

        /// Provider base URL (prompted when omitted)
        #[arg(long)]
        base_url: Option<String>,

        /// Access token; empty relies on the environment (prompted when omitted)
        #[arg(long)]
        token: Option<String>,

        /// Clone protocol: ssh or https (prompted when omitted)
        #[arg(long)]
        protocol: Option<String>,

        /// Group id to operate on (repeatable; prompted when omitted)
        #[arg(long = "group")]
        groups: Vec<String>,
    },

    /// Update the stored access token
    Auth {
        /// New token (prompted when omitted)
        token: Option<String>,
    },

    /// List the groups visible to the credential
    Groups,

    /// List discovered local working copies
    List {
        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// List remote repositories of the configured groups
    Remotes,

    /// Clone remote repositories that are missing locally
    Clone {
        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// Rebase local working copies onto their upstream
    Up {
        #[command(flatten)]
        selector: SelectorArgs,

        /// Auto-stash dirty working copies around the rebase
        #[arg(long)]
        stash: bool,
    },

    /// Report branch and sync state of every working copy
    Status {
        #[command(flatten)]
        selector: SelectorArgs,
    },

    /// Create a group on the provider
    CreateGroup {
        /// Group name (prompted when omitted)
        name: Option<String>,

        /// URL path of the group (GitLab-like back-ends)
        #[arg(long)]
        path: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Visibility: private or public
        #[arg(long)]
        visibility: Option<String>,

        /// Administrator login (GitHub-like back-ends)
        #[arg(long)]
        admin: Option<String>,

        /// Work item process template (Azure DevOps-like back-ends)
        #[arg(long)]
        process_template: Option<String>,
    },

    /// Create a repository on the provider
    CreateRepo {
        /// Repository name (prompted when omitted)
        name: Option<String>,

        /// Owning group id
        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Visibility: private or public
        #[arg(long)]
        visibility: Option<String>,
    },

    /// Run an action across the fleet
    Exec {
        /// Action script name under .flotilla/actions
        action: String,

        /// Arguments passed to the action (after --)
        #[arg(last = true)]
        params: Vec<String>,

        /// Only repositories matching this glob
        #[arg(long)]
        glob: Option<String>,

        /// Skip repositories matching this glob (repeatable)
        #[arg(short = 'e', long = "exclude")]
        exclude: Vec<String>,

        /// Pause at the execute, commit, push and review gates
        #[arg(short, long)]
        interactive: bool,

        /// Work branch to create in each repository
        #[arg(short, long)]
        branch: Option<String>,

        /// Commit message for changes the action leaves behind
        #[arg(short, long)]
        commit_message: Option<String>,

        /// Open a review request after a successful push
        #[arg(long)]
        review: bool,

        /// Review title (defaults to the commit message)
        #[arg(long)]
        review_title: Option<String>,

        /// Review description
        #[arg(long)]
        review_message: Option<String>,

        /// Open the review request as a draft
        #[arg(long)]
        review_draft: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let workspace = env::current_dir().context("cannot determine the current directory")?;

    match cli.command {
        Commands::Init {
            kind,
            base_url,
            token,
            protocol,
            groups,
        } => cmd_init(&workspace, kind, base_url, token, protocol, groups).await,
        Commands::Auth { token } => cmd_auth(&workspace, token).await,
        Commands::Groups => cmd_groups(&workspace).await,
        Commands::List { selector } => cmd_list(&workspace, &selector.selector()?),
        Commands::Remotes => cmd_remotes(&workspace, cli.verbose).await,
        Commands::Clone { selector } => cmd_clone(&workspace, &selector.selector()?).await,
        Commands::Up { selector, stash } => cmd_up(&workspace, &selector.selector()?, stash),
        Commands::Status { selector } => cmd_status(&workspace, &selector.selector()?),
        Commands::CreateGroup {
            name,
            path,
            description,
            visibility,
            admin,
            process_template,
        } => {
            let draft = NewGroup {
                name,
                path,
                description,
                visibility,
                admin,
                process_template,
            };
            cmd_create_group(&workspace, draft).await
        }
        Commands::CreateRepo {
            name,
            group,
            description,
            visibility,
        } => {
            let draft = NewRepository {
                group_id: group,
                name,
                description,
                visibility,
            };
            cmd_create_repo(&workspace, draft).await
        }
        Commands::Exec {
            action,
            params,
            glob,
            exclude,
            interactive,
            branch,
            commit_message,
            review,
            review_title,
            review_message,
            review_draft,
        } => {
            let request = ExecRequest {
                action,
                params,
                interactive,
                branch,
                commit_message,
                review,
                review_title,
                review_message,
                review_draft,
            };
            let selector = RepoSelector::new(glob.as_deref(), &exclude)?;
            cmd_exec(&workspace, request, &selector).await
        }
    }
}

/// Interactive workspace setup. The credential must be able to list at least
/// one group before anything is written.
async fn cmd_init(
    workspace: &Path,
    kind: Option<String>,
    base_url: Option<String>,
    token: Option<String>,
    protocol: Option<String>,
    groups: Vec<String>,
) -> Result<()> {
    let path = FleetConfig::path(workspace);
    if path.exists() {
        bail!("configuration already exists at {}", path.display());
    }

    let mut config = FleetConfig::default();
    config.provider.kind = match kind {
        Some(kind) => kind,
        None => choose("Provider kind", &["github", "gitlab", "azure"], "github")?,
    };
    let kind = config.provider_kind()?;

    let suggested = match kind {
        ProviderKind::GitHub => "https://github.com",
        ProviderKind::GitLab => "https://gitlab.com",
        ProviderKind::AzureDevOps => "",
    };
    config.provider.base_url = match base_url {
        Some(url) => url,
        None => prompt_required("Base URL", suggested)?,
    };

    let token = match token {
        Some(token) => token,
        None => prompt(&format!("Access token (empty to rely on {TOKEN_ENV})"), "")?,
    };
    config.provider.token = Some(token).filter(|t| !t.is_empty());

    // The credential check may draw the token from the environment; that
    // token is never written to the file.
    let mut check = config.clone();
    if check.provider.token.is_none() {
        if let Ok(token) = env::var(TOKEN_ENV) {
            if !token.is_empty() {
                check.provider.token = Some(token);
            }
        }
    }
    let provider = connect(&check)?;
    let visible = provider
        .list_groups()
        .await
        .context("cannot list groups; check the base URL and token")?;
    if visible.is_empty() {
        bail!("no {} visible to this credential", provider.labels().groups);
    }
    println!("Visible {}:", provider.labels().groups);
    for group in &visible {
        println!("  {:<24} {}", group.id, group.name);
    }

    config.provider.group_ids = if groups.is_empty() {
        prompt_required("Group ids to manage (comma-separated)", "")?
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        groups
    };
    for id in &config.provider.group_ids {
        if !visible.iter().any(|g| &g.id == id) {
            warn!(%id, "group id not among the visible groups");
        }
    }

    let protocol = match protocol {
        Some(value) => value,
        None => choose("Clone protocol", &["ssh", "https"], "ssh")?,
    };
    config.provider.clone_protocol = match protocol.as_str() {
        "ssh" => CloneProtocol::Ssh,
        "https" => CloneProtocol::Https,
        other => bail!("unknown clone protocol '{other}'"),
    };
    if config.provider.clone_protocol == CloneProtocol::Https {
        config.provider.use_token_for_operations =
            choose("Use the token for git operations?", &["y", "n"], "n")? == "y";
    }

    config.save(workspace)?;
    std::fs::create_dir_all(FleetConfig::actions_root(workspace))?;

    println!("Wrote {}", path.display());
    if config.provider.token.is_none() {
        println!("Set the access token via {TOKEN_ENV} before contacting the provider.");
    }
    Ok(())
}

/// Store a new token, after checking it can list groups.
async fn cmd_auth(workspace: &Path, token: Option<String>) -> Result<()> {
    let mut config = FleetConfig::load(workspace)?;
    let token = match token {
        Some(token) => token,
        None => prompt_required("New access token", "")?,
    };
    config.provider.token = Some(token);

    let provider = connect(&config)?;
    let groups = provider
        .list_groups()
        .await
        .context("token check failed; nothing stored")?;
    config.save(workspace)?;
    println!(
        "Token stored. {} {} visible.",
        groups.len(),
        provider.labels().groups
    );
    Ok(())
}

async fn cmd_groups(workspace: &Path) -> Result<()> {
    let config = FleetConfig::load(workspace)?;
    let provider = connect(&config)?;
    let groups = provider.list_groups().await?;
    for group in &groups {
        println!("{:<24} {}", group.id, group.name);
    }
    println!();
    println!("{} {}", groups.len(), provider.labels().groups);
    Ok(())
}

/// Discovered local working copies, one per line.
fn cmd_list(workspace: &Path, selector: &RepoSelector) -> Result<()> {
    for folder in discover_repositories(workspace)? {
        if selector.is_selected(&folder) {
            println!("{folder}");
        }
    }
    Ok(())
}

async fn cmd_remotes(workspace: &Path, verbose: bool) -> Result<()> {
    let config = FleetConfig::load(workspace)?;
    let provider = connect(&config)?;
    let repositories = list_repositories(provider.as_ref(), &config).await?;
    for repo in &repositories {
        if verbose {
            println!(
                "{:<50} {:<18.18} {}",
                repo.name_with_namespace, repo.default_branch, repo.description
            );
        } else {
            println!("{:<50} {}", repo.name_with_namespace, repo.description);
        }
    }
    println!();
    println!("{} {}", repositories.len(), provider.labels().repositories);
    Ok(())
}

async fn cmd_clone(workspace: &Path, selector: &RepoSelector) -> Result<()> {
    let config = FleetConfig::load(workspace)?;
    let provider = connect(&config)?;
    let repositories = list_repositories(provider.as_ref(), &config).await?;

    let vcs = workspace_vcs(workspace);
    let actions = WorkspaceActions::new(workspace);
    let pipeline = FleetPipeline::new(
        workspace,
        config,
        Arc::new(vcs),
        Arc::new(actions),
        Some(provider),
    );

    let reports = pipeline.clone_missing(&repositories, selector);
    let mut cloned = 0;
    for report in &reports {
        match &report.outcome {
            CloneOutcome::Cloned => {
                cloned += 1;
                println!("{:<30} cloned", report.folder);
            }
            CloneOutcome::ClonedEmpty => {
                cloned += 1;
                warn!(folder = %report.folder, "cloned an empty repository");
            }
            CloneOutcome::AlreadyPresent => println!("{:<30} already present", report.folder),
            CloneOutcome::Skipped(reason) => println!("{:<30} skipped: {reason}", report.folder),
            CloneOutcome::Failed(error) => {
                warn!(folder = %report.folder, %error, "clone failed")
            }
        }
    }
    println!();
    println!("{cloned} cloned, {} listed", reports.len());
    Ok(())
}

fn cmd_up(workspace: &Path, selector: &RepoSelector, stash: bool) -> Result<()> {
    let vcs = workspace_vcs(workspace);
    for folder in discover_repositories(workspace)? {
        if !selector.is_selected(&folder) {
            continue;
        }
        match vcs.pull_rebase(&folder, stash) {
            Ok(output) => {
                let line = if output.is_empty() {
                    "up to date".to_string()
                } else {
                    output
                };
                println!("{folder:<30} {line}");
            }
            Err(e) => warn!(folder = %folder, error = %e, "update failed"),
        }
    }
    Ok(())
}

fn cmd_status(workspace: &Path, selector: &RepoSelector) -> Result<()> {
    let vcs = workspace_vcs(workspace);
    for folder in discover_repositories(workspace)? {
        if !selector.is_selected(&folder) {
            continue;
        }
        match working_copy_status(&vcs, &folder) {
            Ok(report) => println!("{:<30} {:<25.25} {}", folder, report.branch, report.status),
            Err(e) => warn!(folder = %folder, error = %e, "cannot determine status"),
        }
    }
    Ok(())
}

async fn cmd_create_group(workspace: &Path, mut draft: NewGroup) -> Result<()> {
    let config = FleetConfig::load(workspace)?;
    let provider = connect(&config)?;
    let id = loop {
        match provider.create_group(&draft).await {
            Ok(id) => break id,
            Err(RemoteError::MissingParameter { name }) => {
                let value = prompt(&format!("{} {name}", provider.labels().group), "")?;
                if value.is_empty() {
                    return Err(RemoteError::MissingParameter { name }.into());
                }
                fill_group_field(&mut draft, name, value);
            }
            Err(e) => return Err(e.into()),
        }
    };
    println!(
        "Created {} '{}' (id {id})",
        provider.labels().group,
        draft.name.as_deref().unwrap_or_default()
    );
    Ok(())
}

async fn cmd_create_repo(workspace: &Path, mut draft: NewRepository) -> Result<()> {
    let config = FleetConfig::load(workspace)?;
    let provider = connect(&config)?;
    let id = loop {
        match provider.create_repository(&draft).await {
            Ok(id) => break id,
            Err(RemoteError::MissingParameter { name }) => {
                let value = prompt(&format!("{} {name}", provider.labels().repository), "")?;
                if value.is_empty() {
                    return Err(RemoteError::MissingParameter { name }.into());
                }
                fill_repository_field(&mut draft, name, value);
            }
            Err(e) => return Err(e.into()),
        }
    };
    println!(
        "Created {} '{}' (id {id})",
        provider.labels().repository,
        draft.name.as_deref().unwrap_or_default()
    );
    Ok(())
}

async fn cmd_exec(workspace: &Path, request: ExecRequest, selector: &RepoSelector) -> Result<()> {
    let config = FleetConfig::load(workspace)?;
    let provider = connect(&config)?;
    let vcs = workspace_vcs(workspace);
    let actions = WorkspaceActions::new(workspace);
    let pipeline = FleetPipeline::new(
        workspace,
        config,
        Arc::new(vcs),
        Arc::new(actions),
        Some(provider),
    );

    let mut gate = GateController::from_stdin();
    let summary = pipeline.run(&request, selector, &mut gate).await?;
    print_summary(&summary);
    if summary.aborted {
        bail!("run aborted by operator");
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    for result in &summary.results {
        println!("{:<30} {}", result.folder, result.outcome);
    }
    println!(
        "{} ok, {} skipped, {} failed",
        summary.completed(),
        summary.skipped(),
        summary.failed()
    );
}

/// Ask one free-form setup question; empty input takes the default.
fn prompt(question: &str, default: &str) -> Result<String> {
    if default.is_empty() {
        print!("{question}: ");
    } else {
        print!("{question} [{default}]: ");
    }
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        bail!("input ended during setup");
    }
    let value = line.trim();
    Ok(if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    })
}

fn prompt_required(question: &str, default: &str) -> Result<String> {
    loop {
        let value = prompt(question, default)?;
        if !value.is_empty() {
            return Ok(value);
        }
    }
}

/// Ask until the answer is one of the accepted values.
fn choose(question: &str, accepted: &[&str], default: &str) -> Result<String> {
    let rendered = format!("{question} ( {} )", accepted.join(" / "));
    loop {
        let answer = prompt(&rendered, default)?.to_lowercase();
        if accepted.contains(&answer.as_str()) {
            return Ok(answer);
        }
    }
}

/// Apply an operator-supplied value to the field a backend reported missing.
fn fill_group_field(draft: &mut NewGroup, name: &str, value: String) {
    match name {
        "path" => draft.path = Some(value),
        "admin" => draft.admin = Some(value),
        _ => draft.name = Some(value),
    }
}

fn fill_repository_field(draft: &mut NewRepository, name: &str, value: String) {
    match name {
        "group" => draft.group_id = Some(value),
        _ => draft.name = Some(value),
    }
}

/// Network failures degrade to an empty listing; anything else is fatal.
async fn list_repositories(
    provider: &dyn RemoteProvider,
    config: &FleetConfig,
) -> Result<Vec<Repository>> {
    match provider
        .list_repositories(&config.provider.group_ids)
        .await
    {
        Ok(repositories) => Ok(repositories),
        Err(RemoteError::Network(detail)) => {
            warn!(%detail, "provider unreachable, treating as no results");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

fn connect(config: &FleetConfig) -> Result<Arc<dyn RemoteProvider>> {
    let kind = config.provider_kind()?;
    Ok(provider_for(kind, config.provider_settings())?)
}

/// Git adapter for the workspace, with the operation token applied when the
/// configuration asks for token-authenticated operations.
fn workspace_vcs(workspace: &Path) -> GitVcs {
    match FleetConfig::load(workspace) {
        Ok(config) => match config.operation_token() {
            Some(token) => GitVcs::with_operation_token(workspace, token),
            None => GitVcs::new(workspace),
        },
        Err(_) => GitVcs::new(workspace),
    }
}
