//! Command handlers.
//!
//! Each handler talks to the hosted backend through [`RestBackend`]. The saved
//! session is restored before the [`SessionStore`] starts, so the store's first
//! resolution already sees it.

use crate::{Command, CommentCommand, ParentArgs, ProjectCommand, TaskCommand, UserCommand};
use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;
use taskdeck_auth::{AuthState, GuardDecision, RouteGuard, User};
use taskdeck_runtime::backend::{AuthBackend, RestBackend};
use taskdeck_runtime::config::TaskdeckConfig;
use taskdeck_runtime::models::{
    Comment, CommentParent, NewProject, NewTask, Project, ProjectPatch, Task, TaskPatch,
};
use taskdeck_runtime::{Services, SessionFile, SessionStore};
use tracing::{debug, warn};

/// Shown when a member runs an admin-only command.
const ADMIN_FALLBACK: &str = "This command requires the admin role.";

/// Exit code for a guard redirect.
const EXIT_REDIRECT: u8 = 2;

/// Exit code for the admin fallback.
const EXIT_FORBIDDEN: u8 = 3;

pub(crate) async fn run(command: Command, config: &TaskdeckConfig) -> Result<ExitCode> {
    let (url, anon_key) = config.backend.endpoint()?;
    let backend = Arc::new(
        RestBackend::new(url, anon_key, config.backend.timeout())
            .context("failed to build backend client")?,
    );
    let session_file = SessionFile::new(config.session_file());

    match command {
        Command::Login { email, password } => login(&backend, &session_file, &email, &password).await,
        Command::Logout => logout(&backend, &session_file).await,
        command => guarded(command, config, &backend, &session_file).await,
    }
}

fn requires_admin(command: &Command) -> bool {
    matches!(
        command,
        Command::Users(UserCommand::List | UserCommand::SetRole { .. })
    )
}

async fn guarded(
    command: Command,
    config: &TaskdeckConfig,
    backend: &Arc<RestBackend>,
    session_file: &SessionFile,
) -> Result<ExitCode> {
    restore(backend, session_file).await;

    let store = SessionStore::start(Arc::clone(backend));
    let state = store.resolved().await;

    let guard: RouteGuard<&'static str> = RouteGuard::new(
        config
            .guard_config(requires_admin(&command))
            .with_fallback(ADMIN_FALLBACK),
    );
    debug!(state = %guard.state(&state), "route guard evaluated");
    match guard.evaluate(&state) {
        GuardDecision::RenderChildren => {}
        GuardDecision::Redirect { to, .. } => {
            eprintln!("Redirecting to {to}");
            if to == config.routes.login {
                eprintln!("Not signed in. Run `taskdeck login --email <EMAIL>` first.");
            }
            return Ok(ExitCode::from(EXIT_REDIRECT));
        }
        GuardDecision::RenderFallback(message) => {
            eprintln!("{message}");
            return Ok(ExitCode::from(EXIT_FORBIDDEN));
        }
        GuardDecision::Loading => anyhow::bail!("session did not settle"),
    }

    let services = Services::new(Arc::clone(backend), store.gate());
    match command {
        Command::Whoami => whoami(&state),
        Command::Projects(cmd) => projects(&services, cmd).await?,
        Command::Tasks(cmd) => tasks(&services, cmd).await?,
        Command::Comments(cmd) => comments(&services, cmd).await?,
        Command::Users(cmd) => users(&services, cmd).await?,
        Command::Login { .. } | Command::Logout => {}
    }
    Ok(ExitCode::SUCCESS)
}

/// Adopts the saved session, rewriting the file if the tokens were rotated.
async fn restore(backend: &RestBackend, file: &SessionFile) {
    let saved = match file.load().await {
        Ok(saved) => saved,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable session file");
            None
        }
    };
    let Some(saved) = saved else {
        debug!(path = %file.path().display(), "no saved session");
        return;
    };

    match backend.set_session(saved.clone()).await {
        Ok(active) if active != saved => {
            if let Err(e) = file.save(&active).await {
                warn!(error = %e, "failed to save refreshed session");
            }
        }
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "saved session could not be restored");
            if let Err(e) = file.clear().await {
                warn!(error = %e, "failed to remove stale session file");
            }
        }
    }
}

async fn login(
    backend: &Arc<RestBackend>,
    file: &SessionFile,
    email: &str,
    password: &str,
) -> Result<ExitCode> {
    let session = backend
        .sign_in_with_password(email, password)
        .await
        .context("sign in failed")?;
    file.save(&session).await?;

    let store = SessionStore::start(Arc::clone(backend));
    let state = store.resolved().await;
    match state.user {
        Some(user) => println!("Signed in as {} ({})", user.name, role_label(&user)),
        None => println!("Signed in as {email}, but no user record was found"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn logout(backend: &RestBackend, file: &SessionFile) -> Result<ExitCode> {
    restore(backend, file).await;
    if let Err(e) = backend.sign_out().await {
        warn!(error = %e, "server-side sign out failed");
    }
    file.clear().await?;
    println!("Signed out");
    Ok(ExitCode::SUCCESS)
}

fn role_label(user: &User) -> &'static str {
    user.role.map_or("no role", |r| r.as_str())
}

fn whoami(state: &AuthState) {
    let Some(user) = state.user.as_ref() else {
        return;
    };
    println!("{} <{}>", user.name, user.id);
    println!("role: {}", role_label(user));
    for (name, allowed) in state.permissions().flags().entries() {
        println!("  {name:<20} {}", if allowed { "yes" } else { "no" });
    }
}

async fn projects(services: &Services, cmd: ProjectCommand) -> Result<()> {
    let projects = services.projects();
    match cmd {
        ProjectCommand::List => {
            for project in projects.list().await? {
                print_project(&project);
            }
        }
        ProjectCommand::Create {
            name,
            description,
            status,
        } => {
            let mut new = NewProject::new(name);
            if let Some(description) = description {
                new = new.with_description(description);
            }
            if let Some(status) = status {
                new = new.with_status(status);
            }
            print_project(&projects.create(new).await?);
        }
        ProjectCommand::Edit {
            id,
            name,
            description,
            status,
        } => {
            let patch = ProjectPatch {
                name,
                description,
                status,
            };
            print_project(&projects.update(id, patch).await?);
        }
        ProjectCommand::Delete { id } => {
            projects.delete(id).await?;
            println!("Deleted project {id}");
        }
    }
    Ok(())
}

async fn tasks(services: &Services, cmd: TaskCommand) -> Result<()> {
    let tasks = services.tasks();
    match cmd {
        TaskCommand::List { project } => {
            let list = match project {
                Some(project) => tasks.list_by_project(project).await?,
                None => tasks.list_visible().await?,
            };
            list.iter().for_each(print_task);
        }
        TaskCommand::Mine => tasks.list_assigned_to_me().await?.iter().for_each(print_task),
        TaskCommand::Create {
            project,
            title,
            description,
            assignee,
        } => {
            let mut new = NewTask::new(project, title);
            if let Some(description) = description {
                new = new.with_description(description);
            }
            if let Some(user) = assignee {
                new = new.assigned_to(user);
            }
            print_task(&tasks.create(new).await?);
        }
        TaskCommand::Edit {
            id,
            title,
            description,
        } => {
            let patch = TaskPatch {
                title,
                description,
                ..TaskPatch::default()
            };
            print_task(&tasks.update(id, patch).await?);
        }
        TaskCommand::Status { id, status } => print_task(&tasks.update_status(id, status).await?),
        TaskCommand::Assign { id, user } => print_task(&tasks.assign(id, user).await?),
        TaskCommand::Delete { id } => {
            tasks.delete(id).await?;
            println!("Deleted task {id}");
        }
    }
    Ok(())
}

impl ParentArgs {
    fn parent(self) -> Result<CommentParent> {
        match (self.task, self.project) {
            (Some(task), _) => Ok(CommentParent::Task(task)),
            (None, Some(project)) => Ok(CommentParent::Project(project)),
            (None, None) => anyhow::bail!("either --task or --project is required"),
        }
    }
}

async fn comments(services: &Services, cmd: CommentCommand) -> Result<()> {
    let comments = services.comments();
    match cmd {
        CommentCommand::List { parent } => {
            for comment in comments.list(parent.parent()?).await? {
                print_comment(&comment);
            }
        }
        CommentCommand::Add { parent, text } => {
            print_comment(&comments.add(parent.parent()?, &text).await?);
        }
    }
    Ok(())
}

async fn users(services: &Services, cmd: UserCommand) -> Result<()> {
    let users = services.users();
    let list = match cmd {
        UserCommand::List => users.list().await?,
        UserCommand::Members => users.members().await?,
        UserCommand::SetRole { id, role } => vec![users.set_role(id, role).await?],
    };
    for user in &list {
        println!("{}  {:<7}  {}", user.id, role_label(user), user.name);
    }
    Ok(())
}

fn print_project(project: &Project) {
    println!("{}  {:<11}  {}", project.id, project.status.as_str(), project.name);
}

fn print_task(task: &Task) {
    println!(
        "{}  {:<11}  {}  [{}]",
        task.id,
        task.status.as_str(),
        task.title,
        task.assignee_name().unwrap_or("unassigned")
    );
}

fn print_comment(comment: &Comment) {
    println!(
        "{}  {}: {}",
        comment.created_at.format("%Y-%m-%d %H:%M"),
        comment.author_name(),
        comment.comment_text
    );
}
