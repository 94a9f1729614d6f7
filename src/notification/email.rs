//! Email delivery sinks.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::EmailConfig;
use crate::error::{Error, Result};

pub const SMTP_USER_ENV: &str = "TASKGATE_SMTP_USER";
pub const SMTP_PASS_ENV: &str = "TASKGATE_SMTP_PASS";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait EmailSink: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> anyhow::Result<()>;
}

/// Build the sink selected by `email.transport`.
pub fn from_config(config: &EmailConfig) -> Result<Arc<dyn EmailSink>> {
    match config.transport.as_str() {
        "smtp" => Ok(Arc::new(SmtpEmailSink::from_env(config))),
        "log" => Ok(Arc::new(LogEmailSink)),
        "off" => Ok(Arc::new(NoopEmailSink)),
        other => Err(Error::InvalidConfig(format!(
            "email.transport must be log, smtp or off (got '{other}')"
        ))),
    }
}

/// Sends through an SMTP relay. The blocking transport runs on the blocking
/// thread pool.
#[derive(Debug, Clone)]
pub struct SmtpEmailSink {
    host: String,
    port: u16,
    from: String,
    credentials: Option<(String, String)>,
}

impl SmtpEmailSink {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        from: impl Into<String>,
        credentials: Option<(String, String)>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            from: from.into(),
            credentials,
        }
    }

    /// Credentials come from `TASKGATE_SMTP_USER` / `TASKGATE_SMTP_PASS`;
    /// without both the relay is used unauthenticated.
    pub fn from_env(config: &EmailConfig) -> Self {
        let credentials = match (std::env::var(SMTP_USER_ENV), std::env::var(SMTP_PASS_ENV)) {
            (Ok(user), Ok(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        };
        Self::new(
            config.smtp_host.clone(),
            config.smtp_port,
            config.from.clone(),
            credentials,
        )
    }

    fn build_message(&self, message: &EmailMessage) -> anyhow::Result<Message> {
        Message::builder()
            .from(self.from.parse::<Mailbox>().context("invalid from address")?)
            .to(message.to.parse::<Mailbox>().context("invalid recipient address")?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())
            .context("failed to build email")
    }

    fn transport(&self) -> anyhow::Result<SmtpTransport> {
        let transport = match &self.credentials {
            Some((user, pass)) => SmtpTransport::relay(&self.host)
                .context("SMTP relay error")?
                .port(self.port)
                .credentials(Credentials::new(user.clone(), pass.clone()))
                .build(),
            None => SmtpTransport::builder_dangerous(&self.host)
                .port(self.port)
                .build(),
        };
        Ok(transport)
    }
}

#[async_trait]
impl EmailSink for SmtpEmailSink {
    async fn send_email(&self, message: EmailMessage) -> anyhow::Result<()> {
        let email = self.build_message(&message)?;
        let mailer = self.transport()?;
        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .context("email task panicked")?
            .context("failed to send email")?;
        debug!(to = %message.to, subject = %message.subject, "email sent");
        Ok(())
    }
}

/// Logs rendered emails instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmailSink;

#[async_trait]
impl EmailSink for LogEmailSink {
    async fn send_email(&self, message: EmailMessage) -> anyhow::Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            bytes = message.html.len(),
            "email (log transport)"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEmailSink;

#[async_trait]
impl EmailSink for NoopEmailSink {
    async fn send_email(&self, _message: EmailMessage) -> anyhow::Result<()> {
        Ok(())
    }
}
