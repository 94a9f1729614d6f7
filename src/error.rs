//! Error types for taskgate
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown entity, invalid dependency)
//! - 3: Blocked by a gating rule (incomplete dependencies or subtasks)
//! - 4: Operation failed (store, lock or serialization error)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the taskgate CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for taskgate operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid dependency: {0}")]
    InvalidDependency(String),

    #[error("Dependency {source_id} -> {target_id} would create a cycle")]
    CycleDetected {
        source_id: String,
        target_id: String,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Gating blocks (exit code 3)
    #[error("Cannot complete '{task}': waiting on dependencies: {}", .blockers.join(", "))]
    BlockedByDependency {
        task_id: String,
        task: String,
        blockers: Vec<String>,
    },

    #[error("Cannot complete '{task}': unfinished subtasks: {}", .pending.join(", "))]
    BlockedBySubtask {
        task_id: String,
        task: String,
        pending: Vec<String>,
    },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidDependency(_)
            | Error::CycleDetected { .. }
            | Error::NotFound { .. }
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_) => exit_codes::USER_ERROR,

            Error::BlockedByDependency { .. } | Error::BlockedBySubtask { .. } => {
                exit_codes::BLOCKED
            }

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Validation failures the caller can fix (the 400 class of a web handler).
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Error::InvalidDependency(_)
                | Error::CycleDetected { .. }
                | Error::BlockedByDependency { .. }
                | Error::BlockedBySubtask { .. }
                | Error::NotFound { .. }
        )
    }

    /// Structured context for renderers that need more than the message.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::CycleDetected {
                source_id,
                target_id,
            } => Some(serde_json::json!({
                "source_id": source_id,
                "target_id": target_id,
            })),
            Error::BlockedByDependency {
                task_id,
                task,
                blockers,
            } => Some(serde_json::json!({
                "task_id": task_id,
                "task": task,
                "blocking_tasks": blockers,
            })),
            Error::BlockedBySubtask {
                task_id,
                task,
                pending,
            } => Some(serde_json::json!({
                "task_id": task_id,
                "task": task,
                "pending_subtasks": pending,
            })),
            Error::NotFound { kind, id } => Some(serde_json::json!({
                "kind": kind,
                "id": id,
            })),
            _ => None,
        }
    }
}

/// Result type alias for taskgate operations
pub type Result<T> = std::result::Result<T, Error>;

