use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Comment, Mention, Project, TaskFilter, TaskList, TaskRole, User};
use crate::dependency::{DependencyEdge, EntityKind};
use crate::error::{Error, Result};
use crate::notification::preference::NotificationPreference;
use crate::notification::Notification;
use crate::task::{ActivityEntry, TaskRecord};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TaskMember {
    task_id: String,
    user_id: String,
    role: TaskRole,
}

/// The complete entity set.
///
/// Every mutation validates its references before touching any field, so a
/// returned error always leaves the state unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub users: BTreeMap<String, User>,
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
    #[serde(default)]
    pub lists: BTreeMap<String, TaskList>,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskRecord>,
    #[serde(default)]
    members: Vec<TaskMember>,
    #[serde(default)]
    pub activity: Vec<ActivityEntry>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyEdge>,
    #[serde(default)]
    pub comments: BTreeMap<String, Comment>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub preferences: BTreeMap<String, NotificationPreference>,
}

impl StoreState {
    // =========================================================================
    // Users, projects, lists
    // =========================================================================

    pub fn put_user(&mut self, user: User) -> Result<()> {
        if !is_valid_user_id(&user.id) {
            return Err(Error::InvalidArgument(format!(
                "user id '{}' must contain only letters, digits and '-'",
                user.id
            )));
        }
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    pub fn users_by_ids(&self, ids: &[String]) -> Vec<User> {
        let mut seen = BTreeSet::new();
        ids.iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| self.users.get(id).cloned())
            .collect()
    }

    pub fn put_list(&mut self, list: TaskList) -> Result<()> {
        if !self.projects.contains_key(&list.project_id) {
            return Err(Error::not_found("project", &list.project_id));
        }
        self.lists.insert(list.id.clone(), list);
        Ok(())
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn insert_task(&mut self, task: TaskRecord) -> Result<()> {
        if self.tasks.contains_key(&task.id) {
            return Err(Error::InvalidArgument(format!(
                "task '{}' already exists",
                task.id
            )));
        }
        self.check_task_refs(&task)?;
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn update_task(&mut self, task: TaskRecord, activity: Vec<ActivityEntry>) -> Result<()> {
        if !self.tasks.contains_key(&task.id) {
            return Err(Error::not_found("task", &task.id));
        }
        self.check_task_refs(&task)?;
        self.tasks.insert(task.id.clone(), task);
        self.activity.extend(activity);
        Ok(())
    }

    fn check_task_refs(&self, task: &TaskRecord) -> Result<()> {
        if !self.projects.contains_key(&task.project_id) {
            return Err(Error::not_found("project", &task.project_id));
        }
        if let Some(list_id) = &task.list_id {
            match self.lists.get(list_id) {
                Some(list) if list.project_id == task.project_id => {}
                Some(_) => {
                    return Err(Error::InvalidArgument(format!(
                        "list '{list_id}' belongs to another project"
                    )))
                }
                None => return Err(Error::not_found("list", list_id)),
            }
        }
        if let Some(parent_id) = &task.parent_id {
            if parent_id == &task.id {
                return Err(Error::InvalidArgument(
                    "a task cannot be its own parent".to_string(),
                ));
            }
            if !self.tasks.contains_key(parent_id) {
                return Err(Error::not_found("task", parent_id));
            }
        }
        Ok(())
    }

    pub fn tasks_by_ids(&self, ids: &[String]) -> Vec<TaskRecord> {
        let mut seen = BTreeSet::new();
        ids.iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| self.tasks.get(id).cloned())
            .collect()
    }

    pub fn subtasks(&self, parent_id: &str) -> Vec<TaskRecord> {
        let mut children: Vec<TaskRecord> = self
            .tasks
            .values()
            .filter(|task| task.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        children
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Vec<TaskRecord> {
        let mut tasks: Vec<TaskRecord> = self
            .tasks
            .values()
            .filter(|task| {
                filter
                    .project_id
                    .as_deref()
                    .map_or(true, |id| task.project_id == id)
            })
            .filter(|task| {
                filter
                    .list_id
                    .as_deref()
                    .map_or(true, |id| task.list_id.as_deref() == Some(id))
            })
            .filter(|task| filter.include_archived || !task.is_archived)
            .filter(|task| !filter.with_due_date || task.due_date.is_some())
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        tasks
    }

    /// Remove a task and its subtask tree, with their memberships, comments
    /// and activity. Dependency edges are not touched.
    pub fn delete_task(&mut self, id: &str) -> bool {
        if !self.tasks.contains_key(id) {
            return false;
        }

        let mut doomed = BTreeSet::new();
        let mut frontier = vec![id.to_string()];
        while let Some(current) = frontier.pop() {
            if !doomed.insert(current.clone()) {
                continue;
            }
            frontier.extend(
                self.tasks
                    .values()
                    .filter(|task| task.parent_id.as_deref() == Some(current.as_str()))
                    .map(|task| task.id.clone()),
            );
        }

        self.tasks.retain(|task_id, _| !doomed.contains(task_id));
        self.members.retain(|member| !doomed.contains(&member.task_id));
        self.activity.retain(|entry| !doomed.contains(&entry.task_id));
        let removed_comments: BTreeSet<String> = self
            .comments
            .values()
            .filter(|comment| doomed.contains(&comment.task_id))
            .map(|comment| comment.id.clone())
            .collect();
        self.comments
            .retain(|comment_id, _| !removed_comments.contains(comment_id));
        self.mentions
            .retain(|mention| !removed_comments.contains(&mention.comment_id));
        true
    }

    pub fn activity_for_task(&self, task_id: &str) -> Vec<ActivityEntry> {
        self.activity
            .iter()
            .filter(|entry| entry.task_id == task_id)
            .cloned()
            .collect()
    }

    // =========================================================================
    // Assignees and watchers
    // =========================================================================

    pub fn add_member(&mut self, task_id: &str, user_id: &str, role: TaskRole) -> Result<bool> {
        if !self.tasks.contains_key(task_id) {
            return Err(Error::not_found("task", task_id));
        }
        if !self.users.contains_key(user_id) {
            return Err(Error::not_found("user", user_id));
        }
        if self.has_member(task_id, user_id, role) {
            return Ok(false);
        }
        self.members.push(TaskMember {
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            role,
        });
        Ok(true)
    }

    pub fn remove_member(&mut self, task_id: &str, user_id: &str, role: TaskRole) -> bool {
        let before = self.members.len();
        self.members.retain(|member| {
            !(member.task_id == task_id && member.user_id == user_id && member.role == role)
        });
        self.members.len() != before
    }

    fn has_member(&self, task_id: &str, user_id: &str, role: TaskRole) -> bool {
        self.members
            .iter()
            .any(|member| member.task_id == task_id && member.user_id == user_id && member.role == role)
    }

    pub fn members(&self, task_id: &str, role: TaskRole) -> Vec<String> {
        self.members
            .iter()
            .filter(|member| member.task_id == task_id && member.role == role)
            .map(|member| member.user_id.clone())
            .collect()
    }

    // =========================================================================
    // Dependencies
    // =========================================================================

    pub fn insert_dependency(&mut self, edge: DependencyEdge) -> Result<()> {
        if self.dependencies.contains_key(&edge.id) {
            return Err(Error::InvalidArgument(format!(
                "dependency '{}' already exists",
                edge.id
            )));
        }
        self.dependencies.insert(edge.id.clone(), edge);
        Ok(())
    }

    pub fn get_dependency(&self, kind: EntityKind, id: &str) -> Option<DependencyEdge> {
        self.dependencies
            .get(id)
            .filter(|edge| edge.kind == kind)
            .cloned()
    }

    pub fn delete_dependency(&mut self, kind: EntityKind, id: &str) -> Option<DependencyEdge> {
        self.get_dependency(kind, id)?;
        self.dependencies.remove(id)
    }

    pub fn dependencies_by_target(&self, kind: EntityKind, target_id: &str) -> Vec<DependencyEdge> {
        self.edges_where(kind, |edge| edge.target_id == target_id)
    }

    pub fn dependencies_by_sources(
        &self,
        kind: EntityKind,
        source_ids: &[String],
    ) -> Vec<DependencyEdge> {
        let sources: BTreeSet<&str> = source_ids.iter().map(String::as_str).collect();
        self.edges_where(kind, |edge| sources.contains(edge.source_id.as_str()))
    }

    fn edges_where(
        &self,
        kind: EntityKind,
        predicate: impl Fn(&DependencyEdge) -> bool,
    ) -> Vec<DependencyEdge> {
        let mut edges: Vec<DependencyEdge> = self
            .dependencies
            .values()
            .filter(|edge| edge.kind == kind && predicate(edge))
            .cloned()
            .collect();
        edges.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        edges
    }

    // =========================================================================
    // Comments and mentions
    // =========================================================================

    pub fn insert_comment(&mut self, comment: Comment, mentions: Vec<Mention>) -> Result<()> {
        if !self.tasks.contains_key(&comment.task_id) {
            return Err(Error::not_found("task", &comment.task_id));
        }
        if let Some(parent_id) = &comment.parent_id {
            match self.comments.get(parent_id) {
                Some(parent) if parent.task_id == comment.task_id => {}
                Some(_) => {
                    return Err(Error::InvalidArgument(format!(
                        "comment '{parent_id}' belongs to another task"
                    )))
                }
                None => return Err(Error::not_found("comment", parent_id)),
            }
        }
        if let Some(mention) = mentions
            .iter()
            .find(|mention| mention.comment_id != comment.id)
        {
            return Err(Error::InvalidArgument(format!(
                "mention of '{}' references another comment",
                mention.user_id
            )));
        }
        self.comments.insert(comment.id.clone(), comment);
        self.mentions.extend(mentions);
        Ok(())
    }

    pub fn mentions_for_comment(&self, comment_id: &str) -> Vec<Mention> {
        self.mentions
            .iter()
            .filter(|mention| mention.comment_id == comment_id)
            .cloned()
            .collect()
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Newest first.
    pub fn notifications_for_user(&self, user_id: &str, unread_only: bool) -> Vec<Notification> {
        let mut rows: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|row| row.user_id == user_id && (!unread_only || !row.is_read))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        rows
    }

    pub fn mark_notification_read(
        &mut self,
        user_id: &str,
        notification_id: &str,
        at: DateTime<Utc>,
    ) -> Option<Notification> {
        let row = self
            .notifications
            .iter_mut()
            .find(|row| row.id == notification_id && row.user_id == user_id)?;
        if !row.is_read {
            row.is_read = true;
            row.read_at = Some(at);
        }
        Some(row.clone())
    }

    pub fn mark_all_notifications_read(&mut self, user_id: &str, at: DateTime<Utc>) -> usize {
        let mut changed = 0;
        for row in self
            .notifications
            .iter_mut()
            .filter(|row| row.user_id == user_id && !row.is_read)
        {
            row.is_read = true;
            row.read_at = Some(at);
            changed += 1;
        }
        changed
    }
}

/// Ids that mention markup can reference: `[A-Za-z0-9-]+`.
pub fn is_valid_user_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationType;
    use crate::task::TaskStatus;

    fn seeded() -> StoreState {
        let mut state = StoreState::default();
        state.projects.insert(
            "p1".to_string(),
            Project {
                id: "p1".to_string(),
                name: "Launch".to_string(),
                workspace_id: "w1".to_string(),
                is_archived: false,
            },
        );
        state
            .put_user(User {
                id: "u-1".to_string(),
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
            })
            .expect("user");
        state
    }

    #[test]
    fn rejects_user_ids_that_mentions_cannot_reference() {
        let mut state = StoreState::default();
        let err = state
            .put_user(User {
                id: "bad id".to_string(),
                name: "x".to_string(),
                email: "x@example.com".to_string(),
            })
            .expect_err("invalid id");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn insert_task_requires_existing_parent() {
        let mut state = seeded();
        let mut child = TaskRecord::new("t2", "Child", "p1");
        child.parent_id = Some("t1".to_string());
        let err = state.insert_task(child.clone()).expect_err("missing parent");
        assert!(matches!(err, Error::NotFound { kind: "task", .. }));
        assert!(state.tasks.is_empty());

        state
            .insert_task(TaskRecord::new("t1", "Parent", "p1"))
            .expect("parent");
        state.insert_task(child).expect("child");
        assert_eq!(state.subtasks("t1").len(), 1);
    }

    #[test]
    fn subtasks_are_ordered_by_position() {
        let mut state = seeded();
        state
            .insert_task(TaskRecord::new("t1", "Parent", "p1"))
            .expect("parent");
        for (id, position) in [("c", 2), ("a", 0), ("b", 1)] {
            let mut child = TaskRecord::new(id, id, "p1");
            child.parent_id = Some("t1".to_string());
            child.position = position;
            state.insert_task(child).expect("child");
        }
        let ids: Vec<String> = state.subtasks("t1").into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn delete_task_cascades_subtree_but_keeps_edges() {
        let mut state = seeded();
        state
            .insert_task(TaskRecord::new("t1", "Parent", "p1"))
            .expect("parent");
        let mut child = TaskRecord::new("t2", "Child", "p1");
        child.parent_id = Some("t1".to_string());
        state.insert_task(child).expect("child");
        state
            .add_member("t2", "u-1", TaskRole::Watcher)
            .expect("watch");
        state
            .insert_dependency(DependencyEdge::new(EntityKind::Task, "t1", "t9", None))
            .expect("edge");

        assert!(state.delete_task("t1"));
        assert!(state.tasks.is_empty());
        assert!(state.members("t2", TaskRole::Watcher).is_empty());
        assert_eq!(state.dependencies.len(), 1);
        assert!(!state.delete_task("t1"));
    }

    #[test]
    fn membership_is_idempotent() {
        let mut state = seeded();
        state
            .insert_task(TaskRecord::new("t1", "Task", "p1"))
            .expect("task");
        assert!(state.add_member("t1", "u-1", TaskRole::Assignee).expect("add"));
        assert!(!state.add_member("t1", "u-1", TaskRole::Assignee).expect("re-add"));
        assert!(state.members("t1", TaskRole::Watcher).is_empty());
        assert!(state.remove_member("t1", "u-1", TaskRole::Assignee));
        assert!(!state.remove_member("t1", "u-1", TaskRole::Assignee));
    }

    #[test]
    fn dependency_queries_are_scoped_by_kind() {
        let mut state = seeded();
        let task_edge = DependencyEdge::new(EntityKind::Task, "a", "b", None);
        let list_edge = DependencyEdge::new(EntityKind::List, "a", "b", None);
        let task_edge_id = task_edge.id.clone();
        state.insert_dependency(task_edge).expect("task edge");
        state.insert_dependency(list_edge).expect("list edge");

        assert_eq!(state.dependencies_by_target(EntityKind::Task, "b").len(), 1);
        assert_eq!(
            state
                .dependencies_by_sources(EntityKind::List, &["a".to_string()])
                .len(),
            1
        );
        assert!(state
            .delete_dependency(EntityKind::Project, &task_edge_id)
            .is_none());
        assert!(state
            .delete_dependency(EntityKind::Task, &task_edge_id)
            .is_some());
    }

    #[test]
    fn mark_read_only_touches_own_rows() {
        let mut state = seeded();
        let mut row = Notification::new(
            NotificationType::TaskAssigned,
            "u-1",
            "Assigned",
            "You were assigned",
        );
        row.id = "n1".to_string();
        state.notifications.push(row);

        let now = Utc::now();
        assert!(state.mark_notification_read("u-2", "n1", now).is_none());
        let read = state
            .mark_notification_read("u-1", "n1", now)
            .expect("own row");
        assert!(read.is_read);
        assert_eq!(read.read_at, Some(now));
        assert_eq!(state.mark_all_notifications_read("u-1", now), 0);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = seeded();
        let mut task = TaskRecord::new("t1", "Task", "p1");
        task.status = TaskStatus::Done;
        state.insert_task(task).expect("task");
        state
            .add_member("t1", "u-1", TaskRole::Assignee)
            .expect("assign");

        let json = serde_json::to_string(&state).expect("serialize");
        let loaded: StoreState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(loaded.tasks, state.tasks);
        assert_eq!(loaded.members("t1", TaskRole::Assignee), vec!["u-1"]);
    }
}
