//! taskdeck CLI - project and task dashboard client
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`TASKDECK_*`)
//! 3. Project config (`.taskdeck/config.toml` in the project root)
//! 4. Global config (`~/.taskdeck/config.toml`, or `--config`)
//! 5. Default values (lowest priority)
//!
//! # Access
//!
//! Every command except `login` runs behind a route guard. A signed-out
//! invocation is redirected to the login route; a member invoking an
//! admin-only command gets the admin fallback message. Both exit non-zero.

mod commands;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use taskdeck_auth::Role;
use taskdeck_runtime::config::{ConfigLoader, ConfigResolver, TaskdeckConfig};
use taskdeck_runtime::models::{ProjectStatus, TaskStatus};
use taskdeck_types::{ProjectId, TaskId, UserId};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// taskdeck - role-aware project and task dashboard
#[derive(Parser, Debug)]
#[command(name = "taskdeck")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long = "project-root", id = "project_root", global = true)]
    project_root: Option<PathBuf>,

    /// Global config file (defaults to ~/.taskdeck/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Backend URL (overrides TASKDECK_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Backend anon key (overrides TASKDECK_ANON_KEY)
    #[arg(long, global = true)]
    anon_key: Option<String>,

    /// Session file (overrides TASKDECK_SESSION_FILE)
    #[arg(long, global = true, value_name = "PATH")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKDECK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in user and their capabilities
    Whoami,
    /// Manage projects
    #[command(subcommand)]
    Projects(ProjectCommand),
    /// Manage tasks
    #[command(subcommand)]
    Tasks(TaskCommand),
    /// Read and post comments
    #[command(subcommand)]
    Comments(CommentCommand),
    /// Manage users (admin)
    #[command(subcommand)]
    Users(UserCommand),
}

#[derive(Subcommand, Debug)]
enum ProjectCommand {
    List,
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<ProjectStatus>,
    },
    Edit {
        id: ProjectId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<ProjectStatus>,
    },
    Delete {
        id: ProjectId,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// List a project's tasks, or every task visible to you
    List {
        #[arg(long)]
        project: Option<ProjectId>,
    },
    /// List tasks assigned to you
    Mine,
    Create {
        #[arg(long)]
        project: ProjectId,
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        assignee: Option<UserId>,
    },
    Edit {
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Status {
        id: TaskId,
        status: TaskStatus,
    },
    Assign {
        id: TaskId,
        user: UserId,
    },
    Delete {
        id: TaskId,
    },
}

#[derive(ClapArgs, Debug, Clone, Copy)]
#[group(required = true, multiple = false)]
struct ParentArgs {
    #[arg(long)]
    task: Option<TaskId>,
    #[arg(long)]
    project: Option<ProjectId>,
}

#[derive(Subcommand, Debug)]
enum CommentCommand {
    List {
        #[command(flatten)]
        parent: ParentArgs,
    },
    Add {
        #[command(flatten)]
        parent: ParentArgs,
        text: String,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// List every user (admin)
    List,
    /// List assignable members
    Members,
    /// Change a user's role (admin)
    SetRole { id: UserId, role: Role },
}

/// CLI-based configuration resolver.
///
/// Applies CLI argument overrides as the highest-priority layer.
struct CliConfigResolver {
    project_root: PathBuf,
    global_config: Option<PathBuf>,
    debug: bool,
    url: Option<String>,
    anon_key: Option<String>,
    session_file: Option<PathBuf>,
}

impl CliConfigResolver {
    fn from_args(args: &Args) -> Self {
        let project_root = args.project_root.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to get current directory, using '.'");
                PathBuf::from(".")
            })
        });

        Self {
            project_root,
            global_config: args.config.clone(),
            debug: args.debug,
            url: args.url.clone(),
            anon_key: args.anon_key.clone(),
            session_file: args.session_file.clone(),
        }
    }

    fn load(&self) -> Result<TaskdeckConfig> {
        let mut loader = ConfigLoader::new().with_project_root(&self.project_root);
        if let Some(ref path) = self.global_config {
            loader = loader.with_global_config(path);
        }
        let mut config = loader.load().context("Config error")?;
        self.apply(&mut config);
        Ok(config)
    }
}

impl ConfigResolver for CliConfigResolver {
    fn apply(&self, config: &mut TaskdeckConfig) {
        if self.debug {
            config.debug = true;
        }
        if let Some(ref url) = self.url {
            config.backend.url = Some(url.clone());
        }
        if let Some(ref key) = self.anon_key {
            config.backend.anon_key = Some(key.clone());
        }
        if let Some(ref path) = self.session_file {
            config.paths.session_file = Some(path.clone());
        }
    }
}

/// Terminal filter: --debug > RUST_LOG > config `log.level`.
///
/// HTTP/TLS crates stay at WARN in debug mode.
fn init_tracing(config: &TaskdeckConfig) {
    let filter = if config.debug {
        EnvFilter::new("debug,hyper=warn,hyper_util=warn,h2=warn,reqwest=warn,rustls=warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter()))
    };

    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(layer).init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let resolver = CliConfigResolver::from_args(&args);
    let config = resolver.load()?;
    init_tracing(&config);

    tracing::debug!(
        project = %resolver.project_root.display(),
        session_file = %config.session_file().display(),
        "configuration resolved"
    );

    commands::run(args.command, &config).await
}
