//! taskgate actor command implementation
//!
//! Provides acting-user helpers (set/show).

use std::path::PathBuf;

use super::Context;
use crate::actor;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct ActorSetReport {
    actor: String,
    path: PathBuf,
    known_user: bool,
}

#[derive(serde::Serialize)]
struct ActorShowReport {
    actor: String,
    is_default: bool,
}

pub async fn run_set(ctx: &Context, id: &str) -> Result<()> {
    actor::persist_actor(&ctx.storage, id)?;
    let actor_name = actor::resolve_actor(&ctx.storage, &ctx.config, Some(id))?;
    let actor_path = ctx.storage.actor_file();
    let known_user = ctx.service.store().get_user(&actor_name).await?.is_some();

    let report = ActorSetReport {
        actor: actor_name.clone(),
        path: actor_path.clone(),
        known_user,
    };

    let mut human = HumanOutput::new(format!("taskgate actor set: {actor_name}"));
    human.push_summary("actor", actor_name.clone());
    human.push_summary("path", actor_path.display().to_string());
    if !known_user {
        human.push_warning(format!("no user '{actor_name}' in the store yet"));
        human.push_next_step(format!(
            "taskgate user add {actor_name} --name <name> --email <email>"
        ));
    }

    emit_success(ctx.output, "actor set", &report, Some(&human))
}

pub fn run_show(ctx: &Context) -> Result<()> {
    let is_default = ctx.actor == ctx.config.actor.default;
    let report = ActorShowReport {
        actor: ctx.actor.clone(),
        is_default,
    };

    let mut human = HumanOutput::new(format!("taskgate actor: {}", ctx.actor));
    human.push_summary("actor", ctx.actor.clone());
    if is_default {
        human.push_warning("actor not set; using config default".to_string());
        human.push_next_step("taskgate actor set <id>");
    }

    emit_success(ctx.output, "actor show", &report, Some(&human))
}
