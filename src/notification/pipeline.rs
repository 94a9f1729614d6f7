//! Fan-out of one domain event to one recipient.
//!
//! `notify` never fails. In-app delivery (row + push) happens first and is
//! kept even when email delivery fails afterwards; every failure is logged
//! and recorded in the returned [`DeliveryReport`].

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::email::EmailSink;
use super::preference::PreferenceResolver;
use super::push::PushChannel;
use super::templates;
use super::{Notification, NotificationEvent};
use crate::config::AppConfig;
use crate::events::names;
use crate::store::EntityStore;

/// What happened to one `notify` call.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DeliveryReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
    pub pushed: bool,
    pub emailed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl DeliveryReport {
    pub fn stored(&self) -> bool {
        self.notification_id.is_some()
    }
}

pub struct NotificationPipeline {
    store: Arc<dyn EntityStore>,
    push: Arc<dyn PushChannel>,
    email: Arc<dyn EmailSink>,
    resolver: PreferenceResolver,
    app: AppConfig,
}

impl NotificationPipeline {
    pub fn new(
        store: Arc<dyn EntityStore>,
        push: Arc<dyn PushChannel>,
        email: Arc<dyn EmailSink>,
        resolver: PreferenceResolver,
        app: AppConfig,
    ) -> Self {
        Self {
            store,
            push,
            email,
            resolver,
            app,
        }
    }

    pub fn push(&self) -> &Arc<dyn PushChannel> {
        &self.push
    }

    pub async fn notify(&self, event: NotificationEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let preference = match self.store.get_preference(&event.recipient_id).await {
            Ok(preference) => preference,
            Err(err) => {
                warn!(user = %event.recipient_id, error = %err, "preference lookup failed; using defaults");
                report.failures.push(format!("preferences: {err}"));
                None
            }
        };
        let decision = self.resolver.resolve(event.kind, preference.as_ref());
        debug!(
            kind = %event.kind,
            user = %event.recipient_id,
            in_app = decision.in_app,
            email = decision.email,
            "notification channels resolved"
        );

        let link = event.link.clone().or_else(|| self.deep_link(&event));
        let row = Notification::from_event(&event, link);

        if decision.in_app {
            self.deliver_in_app(&row, &mut report).await;
        }
        if decision.email {
            self.deliver_email(&row, &mut report).await;
        }

        if report.failures.is_empty() {
            info!(kind = %row.kind, user = %row.user_id, stored = report.stored(), emailed = report.emailed, "notification delivered");
        }
        report
    }

    /// Run `notify` on its own task so the caller does not wait for it.
    pub fn spawn_notify(self: &Arc<Self>, event: NotificationEvent) -> JoinHandle<DeliveryReport> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.notify(event).await })
    }

    fn deep_link(&self, event: &NotificationEvent) -> Option<String> {
        match (&event.project_id, &event.task_id) {
            (Some(project_id), Some(task_id)) => Some(self.app.task_url(project_id, task_id)),
            (Some(project_id), None) => Some(self.app.project_url(project_id)),
            _ => None,
        }
    }

    async fn deliver_in_app(&self, row: &Notification, report: &mut DeliveryReport) {
        if let Err(err) = self.store.insert_notification(row.clone()).await {
            warn!(user = %row.user_id, kind = %row.kind, error = %err, "failed to store notification");
            report.failures.push(format!("store: {err}"));
            return;
        }
        report.notification_id = Some(row.id.clone());

        let payload = match serde_json::to_value(row) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(notification = %row.id, error = %err, "failed to encode push payload");
                report.failures.push(format!("push: {err}"));
                return;
            }
        };
        match self
            .push
            .emit_to_user(&row.user_id, names::NOTIFICATION_NEW, payload)
            .await
        {
            Ok(()) => report.pushed = true,
            Err(err) => {
                warn!(notification = %row.id, error = %err, "real-time push failed");
                report.failures.push(format!("push: {err}"));
            }
        }
    }

    async fn deliver_email(&self, row: &Notification, report: &mut DeliveryReport) {
        let user = match self.store.get_user(&row.user_id).await {
            Ok(Some(user)) if !user.email.trim().is_empty() => user,
            Ok(_) => {
                debug!(user = %row.user_id, "no email address; skipping email");
                return;
            }
            Err(err) => {
                warn!(user = %row.user_id, error = %err, "recipient lookup failed; skipping email");
                report.failures.push(format!("email: {err}"));
                return;
            }
        };

        let message = templates::render(row, &user.email, &user.name);
        match self.email.send_email(message).await {
            Ok(()) => report.emailed = true,
            Err(err) => {
                warn!(user = %row.user_id, kind = %row.kind, error = %err, "email delivery failed");
                report.failures.push(format!("email: {err}"));
            }
        }
    }
}
