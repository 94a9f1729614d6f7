//! Task service
//!
//! The entry points that mutate tasks and comments. Each one performs its
//! primary write first (through the completion gate where status is
//! involved), then computes recipients and hands one event per recipient to
//! the notification pipeline. Delivery problems never fail the primary
//! operation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::dependency::{DependencyGraph, EntityKind, ResolvedDependency};
use crate::error::{Error, Result};
use crate::events::names;
use crate::gate::{CompletionGate, UpdateOutcome};
use crate::mention;
use crate::notification::email::EmailSink;
use crate::notification::preference::{Channel, NotificationCategory, NotificationPreference};
use crate::notification::push::PushChannel;
use crate::notification::{
    DeliveryReport, Notification, NotificationEvent, NotificationPipeline, NotificationType,
    PreferenceResolver,
};
use crate::store::{
    Comment, EntityStore, Mention, Project, TaskFilter, TaskList, TaskRole, User,
};
use crate::task::{ActivityEntry, TaskPriority, TaskRecord, TaskStatus, TaskUpdate};

const EXCERPT_CHARS: usize = 140;

/// Fields for a new task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: String,
    pub title: String,
    pub list_id: Option<String>,
    pub parent_id: Option<String>,
    pub priority: TaskPriority,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            list_id: None,
            parent_id: None,
            priority: TaskPriority::default(),
            start_date: None,
            due_date: None,
        }
    }
}

/// A task with everything attached to it.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub task: TaskRecord,
    pub assignees: Vec<String>,
    pub watchers: Vec<String>,
    pub subtasks: Vec<TaskRecord>,
    pub dependencies: Vec<ResolvedDependency>,
    pub activity: Vec<ActivityEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskChange {
    #[serde(flatten)]
    pub outcome: UpdateOutcome,
    pub notifications: Vec<DeliveryReport>,
}

/// Result of an assignment: whether it was new, and the delivery report
/// when someone was notified.
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub added: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<DeliveryReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentOutcome {
    pub comment: Comment,
    pub mentions: Vec<Mention>,
    pub notifications: Vec<DeliveryReport>,
}

pub struct TaskService {
    store: Arc<dyn EntityStore>,
    graph: DependencyGraph,
    gate: CompletionGate,
    pipeline: Arc<NotificationPipeline>,
    due_soon: Duration,
}

impl TaskService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        config: &Config,
        push: Arc<dyn PushChannel>,
        email: Arc<dyn EmailSink>,
    ) -> Result<Self> {
        let graph = DependencyGraph::new(Arc::clone(&store), config.dependencies.clone());
        let gate = CompletionGate::new(Arc::clone(&store), &graph);
        let resolver = PreferenceResolver {
            mentions_bypass_email_preference: config
                .notifications
                .mentions_bypass_email_preference,
        };
        let pipeline = Arc::new(NotificationPipeline::new(
            Arc::clone(&store),
            push,
            email,
            resolver,
            config.app.clone(),
        ));
        Ok(Self {
            store,
            graph,
            gate,
            pipeline,
            due_soon: config.notifications.due_soon()?,
        })
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn dependencies(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn gate(&self) -> &CompletionGate {
        &self.gate
    }

    pub fn pipeline(&self) -> &Arc<NotificationPipeline> {
        &self.pipeline
    }

    // =========================================================================
    // Users, projects, lists
    // =========================================================================

    pub async fn create_user(&self, id: &str, name: &str, email: &str) -> Result<User> {
        let user = User {
            id: id.trim().to_string(),
            name: non_empty(name, "user name")?,
            email: email.trim().to_string(),
        };
        self.store.put_user(user.clone()).await?;
        info!(user = %user.id, "user saved");
        Ok(user)
    }

    pub async fn create_project(&self, name: &str, workspace_id: &str) -> Result<Project> {
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: non_empty(name, "project name")?,
            workspace_id: non_empty(workspace_id, "workspace id")?,
            is_archived: false,
        };
        self.store.put_project(project.clone()).await?;
        info!(project = %project.id, workspace = %project.workspace_id, "project created");
        Ok(project)
    }

    pub async fn create_list(&self, project_id: &str, name: &str) -> Result<TaskList> {
        let list = TaskList {
            id: Uuid::new_v4().to_string(),
            name: non_empty(name, "list name")?,
            project_id: project_id.to_string(),
        };
        self.store.put_list(list.clone()).await?;
        info!(list = %list.id, project = project_id, "list created");
        Ok(list)
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub async fn create_task(&self, new: NewTask, actor_id: &str) -> Result<TaskRecord> {
        let title = non_empty(&new.title, "task title")?;
        let position = match &new.parent_id {
            Some(parent_id) => {
                let parent = self.get_task(parent_id).await?;
                if parent.project_id != new.project_id {
                    return Err(Error::InvalidArgument(format!(
                        "parent task '{parent_id}' belongs to another project"
                    )));
                }
                self.store.subtasks(parent_id).await?.len() as i64
            }
            None => 0,
        };

        let mut task = TaskRecord::new(Uuid::new_v4().to_string(), title, new.project_id);
        task.list_id = new.list_id;
        task.parent_id = new.parent_id;
        task.priority = new.priority;
        task.start_date = new.start_date;
        task.due_date = new.due_date;
        task.position = position;
        task.created_by = Some(actor_id.to_string());

        self.store.insert_task(task.clone()).await?;
        info!(task = %task.id, project = %task.project_id, "task created");
        Ok(task)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<TaskRecord> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or_else(|| Error::not_found("task", task_id))
    }

    pub async fn task_view(&self, task_id: &str) -> Result<TaskView> {
        let task = self.get_task(task_id).await?;
        Ok(TaskView {
            assignees: self.store.members(task_id, TaskRole::Assignee).await?,
            watchers: self.store.members(task_id, TaskRole::Watcher).await?,
            subtasks: self.store.subtasks(task_id).await?,
            dependencies: self
                .graph
                .list_dependencies(task_id, EntityKind::Task)
                .await?,
            activity: self.store.activity_for_task(task_id).await?,
            task,
        })
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<()> {
        if !self.store.delete_task(task_id).await? {
            return Err(Error::not_found("task", task_id));
        }
        info!(task = task_id, "task deleted");
        Ok(())
    }

    /// Gated update. A status change notifies assignees and watchers; any
    /// change is broadcast to the task's workspace.
    pub async fn update_task(
        &self,
        task_id: &str,
        update: TaskUpdate,
        actor_id: &str,
    ) -> Result<TaskChange> {
        let outcome = self.gate.apply_update(task_id, update, Some(actor_id)).await?;
        let mut notifications = Vec::new();

        if outcome.status_changed() {
            let task = &outcome.task;
            let actor_name = self.display_name(actor_id).await;
            let recipients = self
                .task_recipients(&task.id, actor_id, &BTreeSet::new())
                .await;
            for recipient in recipients {
                let event = NotificationEvent::new(
                    NotificationType::TaskStatusChanged,
                    recipient,
                    format!("Status changed: {}", task.title),
                    format!(
                        "{actor_name} moved \"{}\" from {} to {}",
                        task.title, outcome.previous_status, task.status
                    ),
                )
                .actor(Some(actor_id))
                .task(task.project_id.clone(), task.id.clone())
                .metadata(serde_json::json!({
                    "task_title": task.title,
                    "from": outcome.previous_status,
                    "to": task.status,
                }));
                notifications.push(self.pipeline.notify(event).await);
            }
        }

        if !outcome.activity.is_empty() {
            let payload = serde_json::json!({
                "task": outcome.task,
                "changes": outcome.activity,
                "actor_id": actor_id,
            });
            self.broadcast_to_workspace(&outcome.task.project_id, names::TASK_UPDATED, payload)
                .await;
        }

        Ok(TaskChange {
            outcome,
            notifications,
        })
    }

    pub async fn attempt_status_transition(
        &self,
        task_id: &str,
        status: TaskStatus,
        actor_id: &str,
    ) -> Result<TaskChange> {
        self.update_task(task_id, TaskUpdate::status(status), actor_id)
            .await
    }

    // =========================================================================
    // Assignees and watchers
    // =========================================================================

    /// Idempotent; only a new assignment notifies, and never the actor.
    pub async fn assign_task(
        &self,
        task_id: &str,
        user_id: &str,
        actor_id: &str,
    ) -> Result<Assignment> {
        let task = self.get_task(task_id).await?;
        let added = self
            .store
            .add_member(task_id, user_id, TaskRole::Assignee)
            .await?;
        if !added {
            debug!(task = task_id, user = user_id, "already assigned");
            return Ok(Assignment {
                added: false,
                notification: None,
            });
        }
        info!(task = task_id, user = user_id, "task assigned");
        if user_id == actor_id {
            return Ok(Assignment {
                added: true,
                notification: None,
            });
        }

        let actor_name = self.display_name(actor_id).await;
        let event = NotificationEvent::new(
            NotificationType::TaskAssigned,
            user_id,
            task.title.clone(),
            format!("{actor_name} assigned you to \"{}\"", task.title),
        )
        .actor(Some(actor_id))
        .task(task.project_id.clone(), task.id.clone())
        .metadata(serde_json::json!({ "task_title": task.title }));
        Ok(Assignment {
            added: true,
            notification: Some(self.pipeline.notify(event).await),
        })
    }

    pub async fn unassign_task(&self, task_id: &str, user_id: &str) -> Result<bool> {
        self.get_task(task_id).await?;
        self.store
            .remove_member(task_id, user_id, TaskRole::Assignee)
            .await
    }

    pub async fn watch_task(&self, task_id: &str, user_id: &str) -> Result<bool> {
        self.store
            .add_member(task_id, user_id, TaskRole::Watcher)
            .await
    }

    pub async fn unwatch_task(&self, task_id: &str, user_id: &str) -> Result<bool> {
        self.get_task(task_id).await?;
        self.store
            .remove_member(task_id, user_id, TaskRole::Watcher)
            .await
    }

    /// Assignees and watchers of a task, minus the actor and `exclude`.
    /// Lookup failures yield an empty set.
    pub async fn task_recipients(
        &self,
        task_id: &str,
        actor_id: &str,
        exclude: &BTreeSet<String>,
    ) -> Vec<String> {
        let mut members = Vec::new();
        for role in [TaskRole::Assignee, TaskRole::Watcher] {
            match self.store.members(task_id, role).await {
                Ok(ids) => members.extend(ids),
                Err(err) => {
                    warn!(task = task_id, error = %err, "recipient lookup failed");
                    return Vec::new();
                }
            }
        }

        let mut seen = BTreeSet::new();
        members
            .into_iter()
            .filter(|id| id != actor_id && !exclude.contains(id))
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Store the comment and its mentions together, then notify mentioned
    /// users and the remaining assignees and watchers.
    pub async fn add_comment(
        &self,
        task_id: &str,
        content: &str,
        parent_id: Option<&str>,
        author_id: &str,
    ) -> Result<CommentOutcome> {
        if content.trim().is_empty() {
            return Err(Error::InvalidArgument("comment cannot be empty".to_string()));
        }
        let task = self.get_task(task_id).await?;

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            task_id: task.id.clone(),
            content: content.to_string(),
            parent_id: parent_id.map(str::to_string),
            created_by_id: author_id.to_string(),
            created_at: Utc::now(),
        };
        let mentioned = mention::resolve_mentions(self.store.as_ref(), content).await?;
        let mentions: Vec<Mention> = mentioned
            .iter()
            .map(|user| Mention {
                comment_id: comment.id.clone(),
                user_id: user.id.clone(),
                mentioned_by_id: author_id.to_string(),
            })
            .collect();
        self.store
            .insert_comment(comment.clone(), mentions.clone())
            .await?;
        info!(task = %task.id, comment = %comment.id, mentions = mentions.len(), "comment added");

        let author_name = self.display_name(author_id).await;
        let excerpt = excerpt(content);
        let mut notifications = Vec::new();

        let mentioned_ids: BTreeSet<String> =
            mentions.iter().map(|m| m.user_id.clone()).collect();
        for user_id in mentioned_ids.iter().filter(|id| id.as_str() != author_id) {
            let event = NotificationEvent::new(
                NotificationType::Mentioned,
                user_id.clone(),
                task.title.clone(),
                format!("{author_name} mentioned you on \"{}\"", task.title),
            )
            .actor(Some(author_id))
            .task(task.project_id.clone(), task.id.clone())
            .metadata(serde_json::json!({
                "comment_id": comment.id,
                "task_title": task.title,
                "excerpt": excerpt,
            }));
            notifications.push(self.pipeline.notify(event).await);
        }

        for recipient in self
            .task_recipients(&task.id, author_id, &mentioned_ids)
            .await
        {
            let event = NotificationEvent::new(
                NotificationType::TaskCommented,
                recipient,
                format!("New comment: {}", task.title),
                format!("{author_name} commented on \"{}\"", task.title),
            )
            .actor(Some(author_id))
            .task(task.project_id.clone(), task.id.clone())
            .metadata(serde_json::json!({
                "comment_id": comment.id,
                "task_title": task.title,
                "excerpt": excerpt,
            }));
            notifications.push(self.pipeline.notify(event).await);
        }

        self.broadcast_to_workspace(
            &task.project_id,
            names::COMMENT_CREATED,
            serde_json::json!({ "comment": comment, "mentions": mentions }),
        )
        .await;

        Ok(CommentOutcome {
            comment,
            mentions,
            notifications,
        })
    }

    // =========================================================================
    // Invitations and due dates
    // =========================================================================

    pub async fn accept_invitation(
        &self,
        inviter_id: &str,
        invitee_id: &str,
        workspace_id: &str,
    ) -> Result<DeliveryReport> {
        if self.store.get_user(inviter_id).await?.is_none() {
            return Err(Error::not_found("user", inviter_id));
        }
        let invitee_name = self.display_name(invitee_id).await;
        info!(inviter = inviter_id, invitee = invitee_id, workspace = workspace_id, "invitation accepted");

        let event = NotificationEvent::new(
            NotificationType::InvitationAccepted,
            inviter_id,
            "Invitation accepted",
            format!("{invitee_name} accepted your invitation"),
        )
        .actor(Some(invitee_id))
        .metadata(serde_json::json!({
            "workspace_id": workspace_id,
            "invitee_id": invitee_id,
        }));
        Ok(self.pipeline.notify(event).await)
    }

    /// Notify assignees of open tasks that are overdue or due within the
    /// configured window. A task/user pair is notified once per due date.
    pub async fn scan_due_dates(&self, now: DateTime<Utc>) -> Result<Vec<DeliveryReport>> {
        let tasks = self
            .store
            .list_tasks(TaskFilter {
                with_due_date: true,
                ..TaskFilter::default()
            })
            .await?;

        // A window too wide to add to `now` has no upper bound.
        let horizon = now.checked_add_signed(self.due_soon);
        let mut reports = Vec::new();
        for task in tasks.into_iter().filter(|task| !task.status.is_done()) {
            let Some(due) = task.due_date else {
                continue;
            };
            let kind = if due < now {
                NotificationType::TaskOverdue
            } else if horizon.map_or(true, |horizon| due <= horizon) {
                NotificationType::TaskDueSoon
            } else {
                continue;
            };

            let due_text = due.to_rfc3339();
            for assignee in self.store.members(&task.id, TaskRole::Assignee).await? {
                if self
                    .already_notified(&assignee, kind, &task.id, &due_text)
                    .await?
                {
                    continue;
                }
                let (title, message) = match kind {
                    NotificationType::TaskOverdue => (
                        format!("Overdue: {}", task.title),
                        format!("\"{}\" was due {}", task.title, due.format("%Y-%m-%d %H:%M UTC")),
                    ),
                    _ => (
                        format!("Due soon: {}", task.title),
                        format!("\"{}\" is due {}", task.title, due.format("%Y-%m-%d %H:%M UTC")),
                    ),
                };
                let event = NotificationEvent::new(kind, assignee, title, message)
                    .task(task.project_id.clone(), task.id.clone())
                    .metadata(serde_json::json!({
                        "task_title": task.title,
                        "due_date": due_text,
                    }));
                reports.push(self.pipeline.notify(event).await);
            }
        }
        info!(sent = reports.len(), "due date scan finished");
        Ok(reports)
    }

    async fn already_notified(
        &self,
        user_id: &str,
        kind: NotificationType,
        task_id: &str,
        due_text: &str,
    ) -> Result<bool> {
        Ok(self
            .store
            .notifications_for_user(user_id, false)
            .await?
            .iter()
            .any(|row| {
                row.kind == kind
                    && row.task_id.as_deref() == Some(task_id)
                    && row.metadata.get("due_date").and_then(|v| v.as_str()) == Some(due_text)
            }))
    }

    // =========================================================================
    // Notification reads and preferences
    // =========================================================================

    pub async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        self.store.notifications_for_user(user_id, unread_only).await
    }

    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> Result<Notification> {
        self.store
            .mark_notification_read(user_id, notification_id, Utc::now())
            .await?
            .ok_or_else(|| Error::not_found("notification", notification_id))
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize> {
        self.store
            .mark_all_notifications_read(user_id, Utc::now())
            .await
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<usize> {
        Ok(self.store.notifications_for_user(user_id, true).await?.len())
    }

    /// The user's preference row, created with everything enabled on first
    /// access.
    pub async fn get_preferences(&self, user_id: &str) -> Result<NotificationPreference> {
        if let Some(existing) = self.store.get_preference(user_id).await? {
            return Ok(existing);
        }
        let created = NotificationPreference::new(user_id);
        self.store.put_preference(created.clone()).await?;
        Ok(created)
    }

    pub async fn update_preference(
        &self,
        user_id: &str,
        category: NotificationCategory,
        channel: Channel,
        enabled: bool,
    ) -> Result<NotificationPreference> {
        let mut preference = self.get_preferences(user_id).await?;
        preference.set(category, channel, enabled);
        self.store.put_preference(preference.clone()).await?;
        info!(user = user_id, category = %category, enabled, "preference updated");
        Ok(preference)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn display_name(&self, user_id: &str) -> String {
        match self.store.get_user(user_id).await {
            Ok(Some(user)) => user.name,
            _ => user_id.to_string(),
        }
    }

    async fn broadcast_to_workspace(&self, project_id: &str, event: &str, payload: serde_json::Value) {
        let workspace_id = match self.store.get_project(project_id).await {
            Ok(Some(project)) => project.workspace_id,
            Ok(None) => return,
            Err(err) => {
                warn!(project = project_id, error = %err, "workspace lookup failed");
                return;
            }
        };
        if let Err(err) = self
            .pipeline
            .push()
            .emit_to_workspace(&workspace_id, event, payload)
            .await
        {
            warn!(workspace = %workspace_id, event, error = %err, "workspace broadcast failed");
        }
    }
}

fn non_empty(value: &str, what: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(format!("{what} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn excerpt(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let long = "é".repeat(EXCERPT_CHARS + 10);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 1);
        assert!(cut.ends_with('…'));
        assert_eq!(excerpt("  short  "), "short");
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(non_empty("   ", "task title").is_err());
        assert_eq!(non_empty(" Launch ", "name").expect("name"), "Launch");
    }
}
