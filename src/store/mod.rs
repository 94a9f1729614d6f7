//! Entity store interface.
//!
//! The core never talks to a database directly. It consumes an
//! [`EntityStore`]: per-entity create/read/update/delete plus the two graph
//! queries the gating logic needs ("edges with target X", "tasks with parent
//! X"). Both shipped implementations share [`StoreState`], so the in-memory
//! and on-disk stores answer every query identically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dependency::{DependencyEdge, EntityKind};
use crate::error::Result;
use crate::notification::preference::NotificationPreference;
use crate::notification::Notification;
use crate::task::{ActivityEntry, TaskRecord};

pub mod file;
pub mod memory;
mod state;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use state::StoreState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub workspace_id: String,
    #[serde(default)]
    pub is_archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskList {
    pub id: String,
    pub name: String,
    pub project_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: String,
    pub task_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub created_by_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mention {
    pub comment_id: String,
    pub user_id: String,
    pub mentioned_by_id: String,
}

/// Which membership join a task/user link belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskRole {
    Assignee,
    Watcher,
}

/// Filter for bulk task queries.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: Option<String>,
    pub list_id: Option<String>,
    pub include_archived: bool,
    pub with_due_date: bool,
}

/// Persistence consumed by the dependency engine, the completion gate and
/// the notification pipeline.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // Users, projects, lists
    async fn put_user(&self, user: User) -> Result<()>;
    async fn get_user(&self, id: &str) -> Result<Option<User>>;
    /// Batch lookup; unknown ids are skipped.
    async fn users_by_ids(&self, ids: &[String]) -> Result<Vec<User>>;
    async fn put_project(&self, project: Project) -> Result<()>;
    async fn get_project(&self, id: &str) -> Result<Option<Project>>;
    async fn put_list(&self, list: TaskList) -> Result<()>;
    async fn get_list(&self, id: &str) -> Result<Option<TaskList>>;

    // Tasks
    async fn insert_task(&self, task: TaskRecord) -> Result<()>;
    async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>>;
    async fn tasks_by_ids(&self, ids: &[String]) -> Result<Vec<TaskRecord>>;
    /// Direct children only, ordered by position.
    async fn subtasks(&self, parent_id: &str) -> Result<Vec<TaskRecord>>;
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<TaskRecord>>;
    /// Replace the task row and append its activity entries in one write.
    async fn update_task(&self, task: TaskRecord, activity: Vec<ActivityEntry>) -> Result<()>;
    /// Removes the task and its subtask tree with their memberships, comments
    /// and activity. Dependency edges are left untouched.
    async fn delete_task(&self, id: &str) -> Result<bool>;
    async fn activity_for_task(&self, task_id: &str) -> Result<Vec<ActivityEntry>>;

    // Assignees and watchers
    async fn add_member(&self, task_id: &str, user_id: &str, role: TaskRole) -> Result<bool>;
    async fn remove_member(&self, task_id: &str, user_id: &str, role: TaskRole) -> Result<bool>;
    async fn members(&self, task_id: &str, role: TaskRole) -> Result<Vec<String>>;

    // Dependencies
    async fn insert_dependency(&self, edge: DependencyEdge) -> Result<()>;
    async fn get_dependency(&self, kind: EntityKind, id: &str) -> Result<Option<DependencyEdge>>;
    async fn delete_dependency(&self, kind: EntityKind, id: &str) -> Result<Option<DependencyEdge>>;
    async fn dependencies_by_target(&self, kind: EntityKind, target_id: &str)
        -> Result<Vec<DependencyEdge>>;
    /// Edges whose source is any of `source_ids`; one call per traversal level.
    async fn dependencies_by_sources(
        &self,
        kind: EntityKind,
        source_ids: &[String],
    ) -> Result<Vec<DependencyEdge>>;

    // Comments and mentions
    /// Insert the comment and all of its mentions atomically.
    async fn insert_comment(&self, comment: Comment, mentions: Vec<Mention>) -> Result<()>;
    async fn get_comment(&self, id: &str) -> Result<Option<Comment>>;
    async fn mentions_for_comment(&self, comment_id: &str) -> Result<Vec<Mention>>;

    // Notifications
    async fn insert_notification(&self, notification: Notification) -> Result<()>;
    async fn notifications_for_user(&self, user_id: &str, unread_only: bool)
        -> Result<Vec<Notification>>;
    async fn mark_notification_read(
        &self,
        user_id: &str,
        notification_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Notification>>;
    async fn mark_all_notifications_read(&self, user_id: &str, at: DateTime<Utc>) -> Result<usize>;

    // Preferences
    async fn get_preference(&self, user_id: &str) -> Result<Option<NotificationPreference>>;
    async fn put_preference(&self, preference: NotificationPreference) -> Result<()>;
}

/// Read/write access to a [`StoreState`]. Implementing this is enough to get
/// a full [`EntityStore`].
#[async_trait]
pub trait StateBackend: Send + Sync {
    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StoreState) -> Result<T> + Send;

    /// Apply `f`; nothing is persisted when it returns an error.
    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut StoreState) -> Result<T> + Send;
}

#[async_trait]
impl<B: StateBackend> EntityStore for B {
    async fn put_user(&self, user: User) -> Result<()> {
        self.write(move |s| s.put_user(user)).await
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.read(|s| Ok(s.users.get(id).cloned())).await
    }

    async fn users_by_ids(&self, ids: &[String]) -> Result<Vec<User>> {
        self.read(|s| Ok(s.users_by_ids(ids))).await
    }

    async fn put_project(&self, project: Project) -> Result<()> {
        self.write(move |s| {
            s.projects.insert(project.id.clone(), project);
            Ok(())
        })
        .await
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        self.read(|s| Ok(s.projects.get(id).cloned())).await
    }

    async fn put_list(&self, list: TaskList) -> Result<()> {
        self.write(move |s| s.put_list(list)).await
    }

    async fn get_list(&self, id: &str) -> Result<Option<TaskList>> {
        self.read(|s| Ok(s.lists.get(id).cloned())).await
    }

    async fn insert_task(&self, task: TaskRecord) -> Result<()> {
        self.write(move |s| s.insert_task(task)).await
    }

    async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>> {
        self.read(|s| Ok(s.tasks.get(id).cloned())).await
    }

    async fn tasks_by_ids(&self, ids: &[String]) -> Result<Vec<TaskRecord>> {
        self.read(|s| Ok(s.tasks_by_ids(ids))).await
    }

    async fn subtasks(&self, parent_id: &str) -> Result<Vec<TaskRecord>> {
        self.read(|s| Ok(s.subtasks(parent_id))).await
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<TaskRecord>> {
        self.read(move |s| Ok(s.list_tasks(&filter))).await
    }

    async fn update_task(&self, task: TaskRecord, activity: Vec<ActivityEntry>) -> Result<()> {
        self.write(move |s| s.update_task(task, activity)).await
    }

    async fn delete_task(&self, id: &str) -> Result<bool> {
        self.write(|s| Ok(s.delete_task(id))).await
    }

    async fn activity_for_task(&self, task_id: &str) -> Result<Vec<ActivityEntry>> {
        self.read(|s| Ok(s.activity_for_task(task_id))).await
    }

    async fn add_member(&self, task_id: &str, user_id: &str, role: TaskRole) -> Result<bool> {
        self.write(|s| s.add_member(task_id, user_id, role)).await
    }

    async fn remove_member(&self, task_id: &str, user_id: &str, role: TaskRole) -> Result<bool> {
        self.write(|s| Ok(s.remove_member(task_id, user_id, role)))
            .await
    }

    async fn members(&self, task_id: &str, role: TaskRole) -> Result<Vec<String>> {
        self.read(|s| Ok(s.members(task_id, role))).await
    }

    async fn insert_dependency(&self, edge: DependencyEdge) -> Result<()> {
        self.write(move |s| s.insert_dependency(edge)).await
    }

    async fn get_dependency(&self, kind: EntityKind, id: &str) -> Result<Option<DependencyEdge>> {
        self.read(|s| Ok(s.get_dependency(kind, id))).await
    }

    async fn delete_dependency(&self, kind: EntityKind, id: &str) -> Result<Option<DependencyEdge>> {
        self.write(|s| Ok(s.delete_dependency(kind, id))).await
    }

    async fn dependencies_by_target(
        &self,
        kind: EntityKind,
        target_id: &str,
    ) -> Result<Vec<DependencyEdge>> {
        self.read(|s| Ok(s.dependencies_by_target(kind, target_id)))
            .await
    }

    async fn dependencies_by_sources(
        &self,
        kind: EntityKind,
        source_ids: &[String],
    ) -> Result<Vec<DependencyEdge>> {
        self.read(|s| Ok(s.dependencies_by_sources(kind, source_ids)))
            .await
    }

    async fn insert_comment(&self, comment: Comment, mentions: Vec<Mention>) -> Result<()> {
        self.write(move |s| s.insert_comment(comment, mentions)).await
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        self.read(|s| Ok(s.comments.get(id).cloned())).await
    }

    async fn mentions_for_comment(&self, comment_id: &str) -> Result<Vec<Mention>> {
        self.read(|s| Ok(s.mentions_for_comment(comment_id))).await
    }

    async fn insert_notification(&self, notification: Notification) -> Result<()> {
        self.write(move |s| {
            s.notifications.push(notification);
            Ok(())
        })
        .await
    }

    async fn notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        self.read(|s| Ok(s.notifications_for_user(user_id, unread_only)))
            .await
    }

    async fn mark_notification_read(
        &self,
        user_id: &str,
        notification_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Notification>> {
        self.write(|s| Ok(s.mark_notification_read(user_id, notification_id, at)))
            .await
    }

    async fn mark_all_notifications_read(&self, user_id: &str, at: DateTime<Utc>) -> Result<usize> {
        self.write(|s| Ok(s.mark_all_notifications_read(user_id, at)))
            .await
    }

    async fn get_preference(&self, user_id: &str) -> Result<Option<NotificationPreference>> {
        self.read(|s| Ok(s.preferences.get(user_id).cloned())).await
    }

    async fn put_preference(&self, preference: NotificationPreference) -> Result<()> {
        self.write(move |s| {
            s.preferences
                .insert(preference.user_id.clone(), preference);
            Ok(())
        })
        .await
    }
}
