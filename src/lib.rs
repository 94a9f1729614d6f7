//! taskgate - dependency-gated tasks with notification fan-out
//!
//! This library provides the core of the taskgate CLI and can be embedded
//! behind any other front end.
//!
//! # Core Concepts
//!
//! - **Dependencies**: `source -> target` edges between projects, lists or
//!   tasks; cycles are refused
//! - **Completion gate**: a task reaches DONE only when its upstream sources
//!   and its subtasks are done
//! - **Mentions**: `@[Name](user-id)` tokens in comment bodies
//! - **Preferences**: per-user, per-category switches for in-app and email
//! - **Notifications**: store, push and email fan-out that never fails the
//!   operation that triggered it
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.taskgate.toml`
//! - `error`: Error types and result aliases
//! - `store`: Entity store trait with in-memory and file backends
//! - `dependency`: Dependency graph engine and cycle detection
//! - `gate`: Completion gate and task updates
//! - `mention`: Mention parsing and resolution
//! - `notification`: Notification model, preferences, push, email, pipeline
//! - `service`: Task, comment and invitation operations with fan-out
//! - `events`: JSONL event records for push delivery
//! - `actor`: Acting-user identity
//! - `storage`: Data directory layout
//! - `lock`: File locking and atomic writes

pub mod actor;
pub mod cli;
pub mod config;
pub mod dependency;
pub mod error;
pub mod events;
pub mod gate;
pub mod lock;
pub mod mention;
pub mod notification;
pub mod output;
pub mod service;
pub mod storage;
pub mod store;
pub mod task;

pub use error::{Error, Result};
