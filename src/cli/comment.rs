//! taskgate comment and invite commands

use serde::Serialize;

use super::{push_delivery_warnings, Context};
use crate::error::Result;
use crate::notification::DeliveryReport;
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct InviteReport {
    inviter_id: String,
    invitee_id: String,
    workspace_id: String,
    notification: DeliveryReport,
}

pub async fn run_add(ctx: &Context, task: &str, content: &str, parent: Option<&str>) -> Result<()> {
    let outcome = ctx
        .service
        .add_comment(task, content, parent, &ctx.actor)
        .await?;

    let mut human = HumanOutput::new(format!("comment added: {}", outcome.comment.id));
    human.push_summary("task", outcome.comment.task_id.clone());
    if let Some(parent) = &outcome.comment.parent_id {
        human.push_summary("reply to", parent.clone());
    }
    if !outcome.mentions.is_empty() {
        let mentioned: Vec<&str> = outcome.mentions.iter().map(|m| m.user_id.as_str()).collect();
        human.push_summary("mentioned", mentioned.join(", "));
    }
    human.push_summary("notified", outcome.notifications.len().to_string());
    push_delivery_warnings(&mut human, &outcome.notifications);

    emit_success(ctx.output, "comment add", &outcome, Some(&human))
}

pub async fn run_invite_accept(ctx: &Context, inviter: &str, workspace: &str) -> Result<()> {
    let notification = ctx
        .service
        .accept_invitation(inviter, &ctx.actor, workspace)
        .await?;

    let mut human = HumanOutput::new(format!("invitation accepted: {workspace}"));
    human.push_summary("inviter", inviter.to_string());
    human.push_summary("invitee", ctx.actor.clone());
    push_delivery_warnings(&mut human, std::slice::from_ref(&notification));

    let report = InviteReport {
        inviter_id: inviter.to_string(),
        invitee_id: ctx.actor.clone(),
        workspace_id: workspace.to_string(),
        notification,
    };
    emit_success(ctx.output, "invite accept", &report, Some(&human))
}
