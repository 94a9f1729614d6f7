//! Notifications: stored rows, the events that produce them, and the
//! delivery machinery (preferences, fan-out, email and real-time push).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub mod email;
pub mod pipeline;
pub mod preference;
pub mod push;
pub mod templates;

pub use pipeline::{DeliveryReport, NotificationPipeline};
pub use preference::{
    Channel, ChannelDecision, NotificationCategory, NotificationPreference, PreferenceResolver,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    TaskAssigned,
    TaskStatusChanged,
    TaskCommented,
    TaskDueSoon,
    TaskOverdue,
    ProjectMemberAdded,
    ProjectRoleChanged,
    MilestoneCompleted,
    MilestoneAtRisk,
    InvitationAccepted,
    Mentioned,
    SecurityAlert,
    /// Any kind this build does not know about.
    #[serde(other)]
    Other,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::TaskAssigned => "TASK_ASSIGNED",
            NotificationType::TaskStatusChanged => "TASK_STATUS_CHANGED",
            NotificationType::TaskCommented => "TASK_COMMENTED",
            NotificationType::TaskDueSoon => "TASK_DUE_SOON",
            NotificationType::TaskOverdue => "TASK_OVERDUE",
            NotificationType::ProjectMemberAdded => "PROJECT_MEMBER_ADDED",
            NotificationType::ProjectRoleChanged => "PROJECT_ROLE_CHANGED",
            NotificationType::MilestoneCompleted => "MILESTONE_COMPLETED",
            NotificationType::MilestoneAtRisk => "MILESTONE_AT_RISK",
            NotificationType::InvitationAccepted => "INVITATION_ACCEPTED",
            NotificationType::Mentioned => "MENTIONED",
            NotificationType::SecurityAlert => "SECURITY_ALERT",
            NotificationType::Other => "OTHER",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted notification. Only `is_read`/`read_at` change after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<String>,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        kind: NotificationType,
        user_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Ulid::new().to_string(),
            kind,
            user_id: user_id.into(),
            actor_id: None,
            project_id: None,
            task_id: None,
            milestone_id: None,
            title: title.into(),
            message: message.into(),
            metadata: serde_json::Value::Null,
            link: None,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn from_event(event: &NotificationEvent, link: Option<String>) -> Self {
        Self {
            actor_id: event.actor_id.clone(),
            project_id: event.project_id.clone(),
            task_id: event.task_id.clone(),
            milestone_id: event.milestone_id.clone(),
            metadata: event.metadata.clone(),
            link,
            ..Self::new(
                event.kind,
                event.recipient_id.clone(),
                event.title.clone(),
                event.message.clone(),
            )
        }
    }
}

/// Input to one `notify` call: a single recipient for a single domain event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: NotificationType,
    pub recipient_id: String,
    pub actor_id: Option<String>,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub milestone_id: Option<String>,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub link: Option<String>,
}

impl NotificationEvent {
    pub fn new(
        kind: NotificationType,
        recipient_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            recipient_id: recipient_id.into(),
            actor_id: None,
            project_id: None,
            task_id: None,
            milestone_id: None,
            title: title.into(),
            message: message.into(),
            metadata: serde_json::Value::Null,
            link: None,
        }
    }

    pub fn actor(mut self, actor_id: Option<&str>) -> Self {
        self.actor_id = actor_id.map(str::to_string);
        self
    }

    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn task(mut self, project_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self.task_id = Some(task_id.into());
        self
    }

    pub fn milestone(mut self, milestone_id: impl Into<String>) -> Self {
        self.milestone_id = Some(milestone_id.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kinds_deserialize_as_other() {
        let kind: NotificationType =
            serde_json::from_str("\"BUDGET_EXCEEDED\"").expect("deserialize");
        assert_eq!(kind, NotificationType::Other);
        let known: NotificationType = serde_json::from_str("\"TASK_DUE_SOON\"").expect("known");
        assert_eq!(known, NotificationType::TaskDueSoon);
    }

    #[test]
    fn row_copies_event_context() {
        let event = NotificationEvent::new(NotificationType::Mentioned, "u-9", "Mentioned", "hi")
            .actor(Some("u-1"))
            .task("p1", "t1")
            .metadata(serde_json::json!({"comment_id": "c1"}));
        let row = Notification::from_event(&event, Some("http://x/t1".to_string()));
        assert_eq!(row.user_id, "u-9");
        assert_eq!(row.actor_id.as_deref(), Some("u-1"));
        assert_eq!(row.task_id.as_deref(), Some("t1"));
        assert_eq!(row.metadata["comment_id"], "c1");
        assert!(!row.is_read);

        let json = serde_json::to_value(&row).expect("serialize");
        assert_eq!(json["type"], "MENTIONED");
    }
}
