//! Per-user channel preferences and the resolver that turns a notification
//! kind plus an optional preference row into delivery decisions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::NotificationType;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    TaskAssigned,
    TaskStatus,
    TaskComment,
    TaskDue,
    ProjectMember,
    ProjectRole,
    Milestone,
    Invitation,
}

impl NotificationCategory {
    pub const ALL: [NotificationCategory; 8] = [
        NotificationCategory::TaskAssigned,
        NotificationCategory::TaskStatus,
        NotificationCategory::TaskComment,
        NotificationCategory::TaskDue,
        NotificationCategory::ProjectMember,
        NotificationCategory::ProjectRole,
        NotificationCategory::Milestone,
        NotificationCategory::Invitation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationCategory::TaskAssigned => "task_assigned",
            NotificationCategory::TaskStatus => "task_status",
            NotificationCategory::TaskComment => "task_comment",
            NotificationCategory::TaskDue => "task_due",
            NotificationCategory::ProjectMember => "project_member",
            NotificationCategory::ProjectRole => "project_role",
            NotificationCategory::Milestone => "milestone",
            NotificationCategory::Invitation => "invitation",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        NotificationCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("unknown notification category '{}'", s.trim()))
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Email,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::InApp, Channel::Email];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::InApp => "in_app",
            Channel::Email => "email",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "in_app" | "app" => Ok(Channel::InApp),
            "email" => Ok(Channel::Email),
            other => Err(Error::InvalidArgument(format!(
                "unknown channel '{other}' (expected in_app, email)"
            ))),
        }
    }
}

impl NotificationType {
    /// Preference category consulted for this kind, if any.
    pub fn category(self) -> Option<NotificationCategory> {
        match self {
            NotificationType::TaskAssigned => Some(NotificationCategory::TaskAssigned),
            NotificationType::TaskStatusChanged => Some(NotificationCategory::TaskStatus),
            NotificationType::TaskCommented => Some(NotificationCategory::TaskComment),
            NotificationType::TaskDueSoon | NotificationType::TaskOverdue => {
                Some(NotificationCategory::TaskDue)
            }
            NotificationType::ProjectMemberAdded => Some(NotificationCategory::ProjectMember),
            NotificationType::ProjectRoleChanged => Some(NotificationCategory::ProjectRole),
            NotificationType::MilestoneCompleted | NotificationType::MilestoneAtRisk => {
                Some(NotificationCategory::Milestone)
            }
            NotificationType::InvitationAccepted => Some(NotificationCategory::Invitation),
            NotificationType::Mentioned
            | NotificationType::SecurityAlert
            | NotificationType::Other => None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// One row per user. Missing fields read as enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPreference {
    pub user_id: String,
    #[serde(default = "default_true")]
    pub task_assigned_in_app: bool,
    #[serde(default = "default_true")]
    pub task_assigned_email: bool,
    #[serde(default = "default_true")]
    pub task_status_in_app: bool,
    #[serde(default = "default_true")]
    pub task_status_email: bool,
    #[serde(default = "default_true")]
    pub task_comment_in_app: bool,
    #[serde(default = "default_true")]
    pub task_comment_email: bool,
    #[serde(default = "default_true")]
    pub task_due_in_app: bool,
    #[serde(default = "default_true")]
    pub task_due_email: bool,
    #[serde(default = "default_true")]
    pub project_member_in_app: bool,
    #[serde(default = "default_true")]
    pub project_member_email: bool,
    #[serde(default = "default_true")]
    pub project_role_in_app: bool,
    #[serde(default = "default_true")]
    pub project_role_email: bool,
    #[serde(default = "default_true")]
    pub milestone_in_app: bool,
    #[serde(default = "default_true")]
    pub milestone_email: bool,
    #[serde(default = "default_true")]
    pub invitation_in_app: bool,
    #[serde(default = "default_true")]
    pub invitation_email: bool,
}

impl NotificationPreference {
    /// Everything enabled.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            task_assigned_in_app: true,
            task_assigned_email: true,
            task_status_in_app: true,
            task_status_email: true,
            task_comment_in_app: true,
            task_comment_email: true,
            task_due_in_app: true,
            task_due_email: true,
            project_member_in_app: true,
            project_member_email: true,
            project_role_in_app: true,
            project_role_email: true,
            milestone_in_app: true,
            milestone_email: true,
            invitation_in_app: true,
            invitation_email: true,
        }
    }

    fn flag_mut(&mut self, category: NotificationCategory, channel: Channel) -> &mut bool {
        use NotificationCategory as C;
        match (category, channel) {
            (C::TaskAssigned, Channel::InApp) => &mut self.task_assigned_in_app,
            (C::TaskAssigned, Channel::Email) => &mut self.task_assigned_email,
            (C::TaskStatus, Channel::InApp) => &mut self.task_status_in_app,
            (C::TaskStatus, Channel::Email) => &mut self.task_status_email,
            (C::TaskComment, Channel::InApp) => &mut self.task_comment_in_app,
            (C::TaskComment, Channel::Email) => &mut self.task_comment_email,
            (C::TaskDue, Channel::InApp) => &mut self.task_due_in_app,
            (C::TaskDue, Channel::Email) => &mut self.task_due_email,
            (C::ProjectMember, Channel::InApp) => &mut self.project_member_in_app,
            (C::ProjectMember, Channel::Email) => &mut self.project_member_email,
            (C::ProjectRole, Channel::InApp) => &mut self.project_role_in_app,
            (C::ProjectRole, Channel::Email) => &mut self.project_role_email,
            (C::Milestone, Channel::InApp) => &mut self.milestone_in_app,
            (C::Milestone, Channel::Email) => &mut self.milestone_email,
            (C::Invitation, Channel::InApp) => &mut self.invitation_in_app,
            (C::Invitation, Channel::Email) => &mut self.invitation_email,
        }
    }

    pub fn get(&self, category: NotificationCategory, channel: Channel) -> bool {
        use NotificationCategory as C;
        match (category, channel) {
            (C::TaskAssigned, Channel::InApp) => self.task_assigned_in_app,
            (C::TaskAssigned, Channel::Email) => self.task_assigned_email,
            (C::TaskStatus, Channel::InApp) => self.task_status_in_app,
            (C::TaskStatus, Channel::Email) => self.task_status_email,
            (C::TaskComment, Channel::InApp) => self.task_comment_in_app,
            (C::TaskComment, Channel::Email) => self.task_comment_email,
            (C::TaskDue, Channel::InApp) => self.task_due_in_app,
            (C::TaskDue, Channel::Email) => self.task_due_email,
            (C::ProjectMember, Channel::InApp) => self.project_member_in_app,
            (C::ProjectMember, Channel::Email) => self.project_member_email,
            (C::ProjectRole, Channel::InApp) => self.project_role_in_app,
            (C::ProjectRole, Channel::Email) => self.project_role_email,
            (C::Milestone, Channel::InApp) => self.milestone_in_app,
            (C::Milestone, Channel::Email) => self.milestone_email,
            (C::Invitation, Channel::InApp) => self.invitation_in_app,
            (C::Invitation, Channel::Email) => self.invitation_email,
        }
    }

    pub fn set(&mut self, category: NotificationCategory, channel: Channel, enabled: bool) {
        *self.flag_mut(category, channel) = enabled;
    }
}

/// Which channels one notification goes out on.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ChannelDecision {
    pub in_app: bool,
    pub email: bool,
}

impl ChannelDecision {
    pub const fn new(in_app: bool, email: bool) -> Self {
        Self { in_app, email }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PreferenceResolver {
    /// Mentions email even when the recipient turned comment email off.
    pub mentions_bypass_email_preference: bool,
}

impl Default for PreferenceResolver {
    fn default() -> Self {
        Self {
            mentions_bypass_email_preference: true,
        }
    }
}

impl PreferenceResolver {
    pub fn resolve(
        &self,
        kind: NotificationType,
        preference: Option<&NotificationPreference>,
    ) -> ChannelDecision {
        match kind {
            NotificationType::Mentioned => {
                let email = self.mentions_bypass_email_preference
                    || preference.map_or(true, |pref| {
                        pref.get(NotificationCategory::TaskComment, Channel::Email)
                    });
                ChannelDecision::new(true, email)
            }
            NotificationType::SecurityAlert => ChannelDecision::new(true, true),
            other => match other.category() {
                Some(category) => match preference {
                    Some(pref) => ChannelDecision::new(
                        pref.get(category, Channel::InApp),
                        pref.get(category, Channel::Email),
                    ),
                    None => ChannelDecision::new(true, true),
                },
                None => ChannelDecision::new(true, false),
            },
        }
    }
}

/// Resolve with the default policy.
pub fn resolve(
    kind: NotificationType,
    preference: Option<&NotificationPreference>,
) -> ChannelDecision {
    PreferenceResolver::default().resolve(kind, preference)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECOGNIZED: [NotificationType; 12] = [
        NotificationType::TaskAssigned,
        NotificationType::TaskStatusChanged,
        NotificationType::TaskCommented,
        NotificationType::TaskDueSoon,
        NotificationType::TaskOverdue,
        NotificationType::ProjectMemberAdded,
        NotificationType::ProjectRoleChanged,
        NotificationType::MilestoneCompleted,
        NotificationType::MilestoneAtRisk,
        NotificationType::InvitationAccepted,
        NotificationType::Mentioned,
        NotificationType::SecurityAlert,
    ];

    #[test]
    fn absent_row_notifies_everywhere() {
        for kind in RECOGNIZED {
            assert_eq!(resolve(kind, None), ChannelDecision::new(true, true), "{kind}");
        }
        assert_eq!(
            resolve(NotificationType::Other, None),
            ChannelDecision::new(true, false)
        );
    }

    #[test]
    fn stored_flags_are_consulted_per_category() {
        let mut pref = NotificationPreference::new("u-1");
        pref.set(NotificationCategory::TaskDue, Channel::Email, false);
        pref.set(NotificationCategory::Milestone, Channel::InApp, false);

        assert_eq!(
            resolve(NotificationType::TaskOverdue, Some(&pref)),
            ChannelDecision::new(true, false)
        );
        assert_eq!(
            resolve(NotificationType::TaskDueSoon, Some(&pref)),
            ChannelDecision::new(true, false)
        );
        assert_eq!(
            resolve(NotificationType::MilestoneAtRisk, Some(&pref)),
            ChannelDecision::new(false, true)
        );
        assert_eq!(
            resolve(NotificationType::TaskAssigned, Some(&pref)),
            ChannelDecision::new(true, true)
        );
    }

    #[test]
    fn mentions_ignore_opt_outs_by_default() {
        let mut pref = NotificationPreference::new("u-1");
        pref.set(NotificationCategory::TaskComment, Channel::InApp, false);
        pref.set(NotificationCategory::TaskComment, Channel::Email, false);

        assert_eq!(
            resolve(NotificationType::Mentioned, Some(&pref)),
            ChannelDecision::new(true, true)
        );

        let strict = PreferenceResolver {
            mentions_bypass_email_preference: false,
        };
        assert_eq!(
            strict.resolve(NotificationType::Mentioned, Some(&pref)),
            ChannelDecision::new(true, false)
        );
        assert_eq!(
            strict.resolve(NotificationType::Mentioned, None),
            ChannelDecision::new(true, true)
        );
    }

    #[test]
    fn security_alerts_always_email() {
        let mut pref = NotificationPreference::new("u-1");
        for category in NotificationCategory::ALL {
            pref.set(category, Channel::Email, false);
        }
        assert!(resolve(NotificationType::SecurityAlert, Some(&pref)).email);
        assert!(!resolve(NotificationType::Other, Some(&pref)).email);
    }

    #[test]
    fn partial_rows_default_to_enabled() {
        let pref: NotificationPreference =
            serde_json::from_str(r#"{"user_id":"u-1","task_status_email":false}"#)
                .expect("deserialize");
        assert!(!pref.task_status_email);
        assert!(pref.task_status_in_app);
        assert!(pref.invitation_email);
    }

    #[test]
    fn category_and_channel_parse() {
        assert_eq!(
            "task-due".parse::<NotificationCategory>().expect("category"),
            NotificationCategory::TaskDue
        );
        assert_eq!("in-app".parse::<Channel>().expect("channel"), Channel::InApp);
        assert!("sms".parse::<Channel>().is_err());
    }
}
