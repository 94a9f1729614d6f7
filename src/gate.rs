//! Completion gate
//!
//! Any status can move to any other status, except that entering DONE
//! requires every upstream task dependency and every direct subtask to be
//! DONE already. The gate also keeps `completed_at` in step with status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::dependency::{DependencyGraph, EntityKind};
use crate::error::{Error, Result};
use crate::store::EntityStore;
use crate::task::{diff_activity, ActivityEntry, TaskRecord, TaskStatus, TaskUpdate};

/// Result of an accepted update.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub task: TaskRecord,
    pub previous_status: TaskStatus,
    pub activity: Vec<ActivityEntry>,
}

impl UpdateOutcome {
    pub fn status_changed(&self) -> bool {
        self.previous_status != self.task.status
    }
}

pub struct CompletionGate {
    store: Arc<dyn EntityStore>,
    guard: Arc<Mutex<()>>,
}

impl CompletionGate {
    /// The gate shares the graph's write guard, so an edge cannot be added
    /// between a completion check and its write.
    pub fn new(store: Arc<dyn EntityStore>, graph: &DependencyGraph) -> Self {
        Self {
            store,
            guard: graph.guard(),
        }
    }

    pub async fn attempt_status_transition(
        &self,
        task_id: &str,
        status: TaskStatus,
        actor_id: Option<&str>,
    ) -> Result<UpdateOutcome> {
        self.apply_update(task_id, TaskUpdate::status(status), actor_id)
            .await
    }

    /// Apply a partial update, gating entry into DONE and writing one
    /// activity entry per changed field alongside the task row.
    pub async fn apply_update(
        &self,
        task_id: &str,
        update: TaskUpdate,
        actor_id: Option<&str>,
    ) -> Result<UpdateOutcome> {
        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(Error::InvalidArgument("task title cannot be empty".to_string()));
            }
        }

        let _held = self.guard.lock().await;

        let current = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| Error::not_found("task", task_id))?;

        if update.status == Some(TaskStatus::Done) {
            self.check_dependencies(&current).await?;
            self.check_subtasks(&current).await?;
        }

        let now = Utc::now();
        let mut next = current.clone();
        if let Some(title) = update.title {
            next.title = title.trim().to_string();
        }
        if let Some(priority) = update.priority {
            next.priority = priority;
        }
        if let Some(due_date) = update.due_date {
            next.due_date = due_date;
        }
        if let Some(status) = update.status {
            next.status = status;
        }
        next.completed_at = next_completed_at(
            current.status,
            next.status,
            current.completed_at,
            update.completed_at,
            now,
        );

        let activity = diff_activity(&current, &next, actor_id, now);
        if next != current {
            next.updated_at = now;
            self.store.update_task(next.clone(), activity.clone()).await?;
            info!(
                task = %next.id,
                from = %current.status,
                to = %next.status,
                changes = activity.len(),
                "task updated"
            );
        }

        Ok(UpdateOutcome {
            task: next,
            previous_status: current.status,
            activity,
        })
    }

    async fn check_dependencies(&self, task: &TaskRecord) -> Result<()> {
        let edges = self
            .store
            .dependencies_by_target(EntityKind::Task, &task.id)
            .await?;
        if edges.is_empty() {
            return Ok(());
        }

        let source_ids: Vec<String> = edges.iter().map(|edge| edge.source_id.clone()).collect();
        let sources = self.store.tasks_by_ids(&source_ids).await?;
        for id in &source_ids {
            if !sources.iter().any(|source| &source.id == id) {
                debug!(task = %task.id, source = %id, "dependency source missing; treated as satisfied");
            }
        }

        let blockers: Vec<String> = sources
            .into_iter()
            .filter(|source| !source.status.is_done())
            .map(|source| source.title)
            .collect();
        if blockers.is_empty() {
            Ok(())
        } else {
            Err(Error::BlockedByDependency {
                task_id: task.id.clone(),
                task: task.title.clone(),
                blockers,
            })
        }
    }

    async fn check_subtasks(&self, task: &TaskRecord) -> Result<()> {
        let pending: Vec<String> = self
            .store
            .subtasks(&task.id)
            .await?
            .into_iter()
            .filter(|child| !child.status.is_done())
            .map(|child| child.title)
            .collect();
        if pending.is_empty() {
            Ok(())
        } else {
            Err(Error::BlockedBySubtask {
                task_id: task.id.clone(),
                task: task.title.clone(),
                pending,
            })
        }
    }
}

/// `completed_at` after a transition from `previous` to `next`.
///
/// An explicit override always wins. Otherwise entering DONE stamps `now`,
/// staying DONE keeps the existing stamp and leaving DONE clears it.
pub fn next_completed_at(
    previous: TaskStatus,
    next: TaskStatus,
    current: Option<DateTime<Utc>>,
    override_value: Option<Option<DateTime<Utc>>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if let Some(value) = override_value {
        return value;
    }
    match (previous.is_done(), next.is_done()) {
        (false, true) => Some(now),
        (true, true) => current.or(Some(now)),
        (_, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn entering_done_stamps_now() {
        let now = Utc::now();
        assert_eq!(
            next_completed_at(TaskStatus::InReview, TaskStatus::Done, None, None, now),
            Some(now)
        );
    }

    #[test]
    fn done_to_done_keeps_stamp() {
        let earlier = Utc::now() - Duration::days(3);
        assert_eq!(
            next_completed_at(TaskStatus::Done, TaskStatus::Done, Some(earlier), None, Utc::now()),
            Some(earlier)
        );
    }

    #[test]
    fn leaving_done_clears_unless_overridden() {
        let earlier = Utc::now() - Duration::days(1);
        for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Blocked] {
            assert_eq!(
                next_completed_at(TaskStatus::Done, status, Some(earlier), None, Utc::now()),
                None
            );
        }
        assert_eq!(
            next_completed_at(
                TaskStatus::Done,
                TaskStatus::Todo,
                Some(earlier),
                Some(Some(earlier)),
                Utc::now()
            ),
            Some(earlier)
        );
    }

    #[test]
    fn non_done_transitions_stay_clear() {
        assert_eq!(
            next_completed_at(TaskStatus::Todo, TaskStatus::InProgress, None, None, Utc::now()),
            None
        );
    }
}
