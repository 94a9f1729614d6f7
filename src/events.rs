//! Real-time event envelope and JSON-lines output.
//!
//! Every push (to a user's private channel or to a workspace) is wrapped in
//! an [`Event`]; the CLI can write them to stdout or a file as JSON lines.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const EVENT_SCHEMA_VERSION: &str = "taskgate.event.v1";

/// Event names pushed to clients.
pub mod names {
    pub const NOTIFICATION_NEW: &str = "notification:new";
    pub const TASK_UPDATED: &str = "task:updated";
    pub const COMMENT_CREATED: &str = "comment:created";
}

#[derive(Debug, Clone)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

/// Where a push goes: one user's sessions or everyone watching a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PushTarget {
    User(String),
    Workspace(String),
}

impl fmt::Display for PushTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushTarget::User(id) => write!(f, "user:{id}"),
            PushTarget::Workspace(id) => write!(f, "workspace:{id}"),
        }
    }
}

impl From<PushTarget> for String {
    fn from(target: PushTarget) -> Self {
        target.to_string()
    }
}

impl TryFrom<String> for PushTarget {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        match value.split_once(':') {
            Some(("user", id)) if !id.is_empty() => Ok(PushTarget::User(id.to_string())),
            Some(("workspace", id)) if !id.is_empty() => {
                Ok(PushTarget::Workspace(id.to_string()))
            }
            _ => Err(Error::InvalidArgument(format!(
                "invalid push channel '{value}'"
            ))),
        }
    }
}

/// A pushed event with its payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub schema_version: String,
    pub event: String,
    pub channel: PushTarget,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(channel: PushTarget, event: &str, data: serde_json::Value) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION.to_string(),
            event: event.to_string(),
            channel,
            timestamp: Utc::now(),
            data,
        }
    }
}

/// Event sink that writes JSONL output to a destination.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl EventSink {
    /// Emit events to stdout.
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Emit events to a file, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    /// Write a single event as JSONL.
    pub fn emit(&mut self, event: &Event) -> Result<()> {
        let serialized = serde_json::to_vec(event)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }
}
