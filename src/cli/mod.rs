//! Command-line interface for taskgate
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule; all of them run
//! against a file-backed store rooted at `--root`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::EventDestination;
use crate::notification::email;
use crate::notification::push::{JsonlPush, NoopPush, PushChannel};
use crate::notification::DeliveryReport;
use crate::output::{HumanOutput, OutputOptions};
use crate::service::TaskService;
use crate::storage::Storage;
use crate::store::FileStore;

mod actor;
mod comment;
mod dep;
mod entity;
mod init;
mod notify;
mod task;

/// taskgate - dependency-gated tasks with notification fan-out
#[derive(Parser, Debug)]
#[command(name = "taskgate")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data root holding .taskgate/ and .taskgate.toml (defaults to current directory)
    #[arg(long, global = true, env = "TASKGATE_ROOT")]
    pub root: Option<PathBuf>,

    /// Acting user id
    #[arg(long, global = true, env = "TASKGATE_ACTOR")]
    pub actor: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write real-time push events as JSON lines ("-" for stdout, or a file path)
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the data root
    Init,

    /// Set or show the acting user
    #[command(subcommand)]
    Actor(ActorCommands),

    /// User management
    #[command(subcommand)]
    User(UserCommands),

    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Task list management
    #[command(subcommand)]
    List(ListCommands),

    /// Task commands
    #[command(subcommand)]
    Task(TaskCommands),

    /// Dependency edges between projects, lists or tasks
    #[command(subcommand)]
    Dep(DepCommands),

    /// Comments on tasks
    #[command(subcommand)]
    Comment(CommentCommands),

    /// Workspace invitations
    #[command(subcommand)]
    Invite(InviteCommands),

    /// The acting user's notifications
    #[command(subcommand)]
    Notify(NotifyCommands),

    /// The acting user's notification preferences
    #[command(subcommand)]
    Prefs(PrefsCommands),
}

#[derive(Subcommand, Debug)]
pub enum ActorCommands {
    /// Persist the acting user for this data root
    Set {
        /// User id
        id: String,
    },
    /// Show the resolved acting user
    Show,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Add or update a user
    Add {
        /// User id (letters, digits and '-')
        id: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Email address
        #[arg(long, default_value = "")]
        email: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project
    Add {
        /// Project name
        name: String,
        /// Workspace (organization) id
        #[arg(long, default_value = "default")]
        workspace: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ListCommands {
    /// Create a list in a project
    Add {
        /// Project id
        project: String,
        /// List name
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    New {
        /// Project id
        project: String,
        /// Task title
        title: String,
        /// List id
        #[arg(long)]
        list: Option<String>,
        /// Parent task id (creates a subtask)
        #[arg(long)]
        parent: Option<String>,
        /// Priority: low, medium, high, urgent
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Due date (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },

    /// Show a task with assignees, subtasks, dependencies and activity
    Show {
        /// Task id
        id: String,
    },

    /// Change a task's status (entering done is gated)
    Status {
        /// Task id
        id: String,
        /// New status: todo, in_progress, in_review, done, blocked
        status: String,
        /// Explicit completion timestamp, or "none" to clear it
        #[arg(long)]
        completed_at: Option<String>,
    },

    /// Change a task's priority
    Priority {
        /// Task id
        id: String,
        /// Priority: low, medium, high, urgent
        priority: String,
    },

    /// Set or clear a task's due date
    Due {
        /// Task id
        id: String,
        /// Due date (RFC 3339 or YYYY-MM-DD), or "none"
        due: String,
    },

    /// Assign a user to a task
    Assign {
        /// Task id
        id: String,
        /// User id
        user: String,
        /// Remove the assignment instead
        #[arg(long)]
        remove: bool,
    },

    /// Watch a task
    Watch {
        /// Task id
        id: String,
        /// User id (defaults to the acting user)
        #[arg(long)]
        user: Option<String>,
        /// Stop watching instead
        #[arg(long)]
        remove: bool,
    },

    /// Delete a task and its subtasks
    Rm {
        /// Task id
        id: String,
    },

    /// Notify assignees about overdue and soon-due tasks
    ScanDue {
        /// Reference time (RFC 3339 or YYYY-MM-DD); defaults to now
        #[arg(long)]
        now: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Add an edge: SOURCE must complete before TARGET
    Add {
        /// Upstream entity id
        source: String,
        /// Downstream entity id
        target: String,
        /// Entity kind: task, list, project
        #[arg(long, default_value = "task")]
        kind: String,
        /// Edge type tag
        #[arg(long = "type")]
        dependency_type: Option<String>,
    },

    /// Remove an edge
    Rm {
        /// Edge id
        id: String,
        /// Entity kind: task, list, project
        #[arg(long, default_value = "task")]
        kind: String,
    },

    /// List the edges into an entity
    Ls {
        /// Downstream entity id
        target: String,
        /// Entity kind: task, list, project
        #[arg(long, default_value = "task")]
        kind: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CommentCommands {
    /// Comment on a task; `@[Name](user-id)` mentions a user
    Add {
        /// Task id
        task: String,
        /// Comment body
        content: String,
        /// Parent comment id for a threaded reply
        #[arg(long)]
        parent: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum InviteCommands {
    /// Accept an invitation as the acting user
    Accept {
        /// User who sent the invitation
        #[arg(long)]
        inviter: String,
        /// Workspace id
        #[arg(long)]
        workspace: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum NotifyCommands {
    /// List notifications
    Ls {
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
    },
    /// Mark one notification read
    Read {
        /// Notification id
        id: String,
    },
    /// Mark every notification read
    ReadAll,
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommands {
    /// Show preferences
    Show,
    /// Enable or disable one category on one channel
    Set {
        /// Category: task_assigned, task_status, task_comment, task_due,
        /// project_member, project_role, milestone, invitation
        category: String,
        /// Channel: in_app, email
        channel: String,
        /// on or off
        value: String,
    },
}

/// Everything a command needs: storage, config, the acting user and a
/// service over the file store.
pub(crate) struct Context {
    pub storage: Storage,
    pub config: Config,
    pub actor: String,
    pub output: OutputOptions,
    pub service: TaskService,
}

impl Context {
    fn open(cli: &Cli) -> Result<Self> {
        let root = match &cli.root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };
        let storage = Storage::new(root);
        let config = Config::load_from_root(storage.root())?;
        let actor = crate::actor::resolve_actor(&storage, &config, cli.actor.as_deref())?;

        let push: Arc<dyn PushChannel> = match EventDestination::parse(cli.events.as_deref()) {
            Some(destination) => Arc::new(JsonlPush::new(destination.open()?)),
            None => Arc::new(NoopPush),
        };
        let email = email::from_config(&config.email)?;
        let store = Arc::new(FileStore::new(storage.clone()));
        let service = TaskService::new(store, &config, push, email)?;

        let events_to_stdout = matches!(
            EventDestination::parse(cli.events.as_deref()),
            Some(EventDestination::Stdout)
        );
        Ok(Self {
            storage,
            config,
            actor,
            output: OutputOptions {
                json: cli.json && !events_to_stdout,
                quiet: cli.quiet,
            },
            service,
        })
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.dispatch())
    }

    async fn dispatch(self) -> Result<()> {
        if let Commands::Init = self.command {
            let root = match &self.root {
                Some(root) => root.clone(),
                None => std::env::current_dir()?,
            };
            return init::run(
                Storage::new(root),
                OutputOptions {
                    json: self.json,
                    quiet: self.quiet,
                },
            );
        }

        let ctx = Context::open(&self)?;
        match self.command {
            Commands::Init => Ok(()),
            Commands::Actor(cmd) => match cmd {
                ActorCommands::Set { id } => actor::run_set(&ctx, &id).await,
                ActorCommands::Show => actor::run_show(&ctx),
            },
            Commands::User(UserCommands::Add { id, name, email }) => {
                entity::run_user_add(&ctx, &id, &name, &email).await
            }
            Commands::Project(ProjectCommands::Add { name, workspace }) => {
                entity::run_project_add(&ctx, &name, &workspace).await
            }
            Commands::List(ListCommands::Add { project, name }) => {
                entity::run_list_add(&ctx, &project, &name).await
            }
            Commands::Task(cmd) => task::run(&ctx, cmd).await,
            Commands::Dep(cmd) => dep::run(&ctx, cmd).await,
            Commands::Comment(CommentCommands::Add {
                task,
                content,
                parent,
            }) => comment::run_add(&ctx, &task, &content, parent.as_deref()).await,
            Commands::Invite(InviteCommands::Accept { inviter, workspace }) => {
                comment::run_invite_accept(&ctx, &inviter, &workspace).await
            }
            Commands::Notify(cmd) => notify::run(&ctx, cmd).await,
            Commands::Prefs(cmd) => notify::run_prefs(&ctx, cmd).await,
        }
    }
}

/// Parse RFC 3339, or a bare `YYYY-MM-DD` as midnight UTC.
pub(crate) fn parse_datetime(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "invalid date '{trimmed}' (expected RFC 3339 or YYYY-MM-DD)"
            ))
        })
}

/// `None` for "none"/"clear", otherwise a parsed date.
pub(crate) fn parse_optional_datetime(raw: &str) -> Result<Option<DateTime<Utc>>> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "none" | "clear" | "" => Ok(None),
        _ => parse_datetime(raw).map(Some),
    }
}

/// Surface swallowed delivery failures as warnings.
pub(crate) fn push_delivery_warnings(human: &mut HumanOutput, reports: &[DeliveryReport]) {
    for failure in reports.iter().flat_map(|report| report.failures.iter()) {
        human.push_warning(format!("notification delivery: {failure}"));
    }
}
