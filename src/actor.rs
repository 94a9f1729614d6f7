//! Acting-user resolution.
//!
//! Resolution order:
//! 1) CLI --actor (explicit)
//! 2) TASKGATE_ACTOR environment variable
//! 3) Persisted value in .taskgate/actor
//! 4) Config default (actor.default)

use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::Storage;

pub const ACTOR_ENV: &str = "TASKGATE_ACTOR";

/// Resolve the acting user using CLI, environment, persisted value, and config.
pub fn resolve_actor(storage: &Storage, config: &Config, cli_actor: Option<&str>) -> Result<String> {
    if let Some(actor) = non_empty(cli_actor) {
        return Ok(actor.to_string());
    }

    if let Ok(env_actor) = std::env::var(ACTOR_ENV) {
        if let Some(actor) = non_empty(Some(env_actor.as_str())) {
            return Ok(actor.to_string());
        }
    }

    if let Some(actor) = load_persisted_actor(storage)? {
        return Ok(actor);
    }

    Ok(config.actor.default.clone())
}

/// Persist the acting user in `.taskgate/actor`.
pub fn persist_actor(storage: &Storage, actor: &str) -> Result<()> {
    let actor = non_empty(Some(actor))
        .ok_or_else(|| Error::InvalidArgument("actor cannot be empty".to_string()))?;
    storage.init()?;
    std::fs::write(storage.actor_file(), format!("{actor}\n"))?;
    Ok(())
}

pub fn load_persisted_actor(storage: &Storage) -> Result<Option<String>> {
    let path = storage.actor_file();
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)?;
    Ok(non_empty(Some(raw.as_str())).map(str::to_string))
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
