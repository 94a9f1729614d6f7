//! Configuration loading and management
//!
//! Handles parsing of `.taskgate.toml` configuration files.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Name of the configuration file at the data root
pub const CONFIG_FILE: &str = ".taskgate.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Deep-link configuration
    #[serde(default)]
    pub app: AppConfig,

    /// Actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Dependency graph configuration
    #[serde(default)]
    pub dependencies: DependencyConfig,

    /// Notification policy
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Email delivery
    #[serde(default)]
    pub email: EmailConfig,
}

/// Deep-link templates used for notification links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Prefix for every generated link
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Link to a task, with `{project_id}` and `{task_id}` placeholders
    #[serde(default = "default_task_link")]
    pub task_link: String,

    /// Link to a project, with a `{project_id}` placeholder
    #[serde(default = "default_project_link")]
    pub project_link: String,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_task_link() -> String {
    "/projects/{project_id}/tasks/{task_id}".to_string()
}

fn default_project_link() -> String {
    "/projects/{project_id}".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            task_link: default_task_link(),
            project_link: default_project_link(),
        }
    }
}

impl AppConfig {
    pub fn task_url(&self, project_id: &str, task_id: &str) -> String {
        let path = self
            .task_link
            .replace("{project_id}", project_id)
            .replace("{task_id}", task_id);
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn project_url(&self, project_id: &str) -> String {
        let path = self.project_link.replace("{project_id}", project_id);
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Actor-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Default actor when none specified
    #[serde(default = "default_actor")]
    pub default: String,
}

fn default_actor() -> String {
    "system".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            default: default_actor(),
        }
    }
}

/// Dependency graph configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConfig {
    /// Maximum number of levels walked by the cycle check
    #[serde(default = "default_max_traversal_depth")]
    pub max_traversal_depth: usize,

    /// Reject cycles for project and list edges, not only task edges
    #[serde(default = "default_true")]
    pub enforce_acyclic_all_kinds: bool,
}

fn default_max_traversal_depth() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            max_traversal_depth: default_max_traversal_depth(),
            enforce_acyclic_all_kinds: true,
        }
    }
}

/// Notification policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Mentions are emailed even when the recipient opted out of comment email
    #[serde(default = "default_true")]
    pub mentions_bypass_email_preference: bool,

    /// Tasks due within this window are reported as due soon (e.g. "24h")
    #[serde(default = "default_due_soon_window")]
    pub due_soon_window: String,
}

fn default_due_soon_window() -> String {
    "24h".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            mentions_bypass_email_preference: true,
            due_soon_window: default_due_soon_window(),
        }
    }
}

impl NotificationConfig {
    pub fn due_soon(&self) -> Result<Duration> {
        parse_duration(&self.due_soon_window)
    }
}

/// Email delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Delivery transport: log, smtp, off
    #[serde(default = "default_email_transport")]
    pub transport: String,

    /// Sender address
    #[serde(default = "default_email_from")]
    pub from: String,

    /// SMTP relay host
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    /// SMTP relay port
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
}

fn default_email_transport() -> String {
    "log".to_string()
}

fn default_email_from() -> String {
    "noreply@taskgate.local".to_string()
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: default_email_transport(),
            from: default_email_from(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
        }
    }
}

impl Config {
    /// Load configuration from a `.taskgate.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the data root, or return defaults
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.app.validate()?;
        if self.dependencies.max_traversal_depth == 0 {
            return Err(Error::InvalidConfig(
                "dependencies.max_traversal_depth must be > 0".to_string(),
            ));
        }
        parse_duration(&self.notifications.due_soon_window).map_err(|err| {
            Error::InvalidConfig(format!("notifications.due_soon_window: {err}"))
        })?;
        match self.email.transport.as_str() {
            "log" | "smtp" | "off" => {}
            other => {
                return Err(Error::InvalidConfig(format!(
                    "email.transport: invalid transport '{other}' (expected log|smtp|off)"
                )))
            }
        }
        if self.email.transport == "smtp" && self.email.smtp_host.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "email.smtp_host cannot be empty with smtp transport".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "app.base_url cannot be empty".to_string(),
            ));
        }
        for placeholder in ["{project_id}", "{task_id}"] {
            if !self.task_link.contains(placeholder) {
                return Err(Error::InvalidConfig(format!(
                    "app.task_link must contain {placeholder}"
                )));
            }
        }
        if !self.project_link.contains("{project_id}") {
            return Err(Error::InvalidConfig(
                "app.project_link must contain {project_id}".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a duration string like "30m", "24h" or "7d". A bare number is minutes.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::InvalidArgument("Duration cannot be empty".to_string()));
    }

    let (num_str, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s, "m"),
    };

    let num: i64 = num_str
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("Invalid duration number: {num_str}")))?;

    let duration = match unit.to_lowercase().as_str() {
        "s" | "sec" | "second" | "seconds" => Duration::try_seconds(num),
        "m" | "min" | "minute" | "minutes" => Duration::try_minutes(num),
        "h" | "hr" | "hour" | "hours" => Duration::try_hours(num),
        "d" | "day" | "days" => Duration::try_days(num),
        "w" | "week" | "weeks" => Duration::try_weeks(num),
        _ => {
            return Err(Error::InvalidArgument(format!(
                "Invalid duration unit '{unit}'. Expected: s, m, h, d, w"
            )));
        }
    };

    duration.ok_or_else(|| Error::InvalidArgument(format!("Duration out of range: {s}")))
}
