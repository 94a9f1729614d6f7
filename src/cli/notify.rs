//! taskgate notify and prefs commands
//!
//! Both operate on the acting user's own rows.

use serde::Serialize;

use super::{Context, NotifyCommands, PrefsCommands};
use crate::error::{Error, Result};
use crate::notification::{Channel, Notification, NotificationCategory, NotificationPreference};
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct NotificationListReport {
    user_id: String,
    unread: usize,
    notifications: Vec<Notification>,
}

#[derive(Serialize)]
struct ReadAllReport {
    user_id: String,
    marked: usize,
}

pub async fn run(ctx: &Context, cmd: NotifyCommands) -> Result<()> {
    match cmd {
        NotifyCommands::Ls { unread } => {
            let notifications = ctx.service.list_notifications(&ctx.actor, unread).await?;
            let unread_count = ctx.service.unread_count(&ctx.actor).await?;

            let mut human = HumanOutput::new(format!(
                "notifications for {}: {} ({} unread)",
                ctx.actor,
                notifications.len(),
                unread_count
            ));
            for notification in &notifications {
                let marker = if notification.is_read { " " } else { "*" };
                human.push_detail(format!(
                    "{marker} {} {} {}: {}",
                    notification.id,
                    notification.created_at.format("%Y-%m-%d %H:%M"),
                    notification.kind,
                    notification.message
                ));
            }
            if unread_count > 0 {
                human.push_next_step("taskgate notify read-all");
            }

            let report = NotificationListReport {
                user_id: ctx.actor.clone(),
                unread: unread_count,
                notifications,
            };
            emit_success(ctx.output, "notify ls", &report, Some(&human))
        }
        NotifyCommands::Read { id } => {
            let notification = ctx.service.mark_read(&ctx.actor, &id).await?;
            let human = HumanOutput::new(format!("notification read: {}", notification.id));
            emit_success(ctx.output, "notify read", &notification, Some(&human))
        }
        NotifyCommands::ReadAll => {
            let marked = ctx.service.mark_all_read(&ctx.actor).await?;
            let human = HumanOutput::new(format!("marked {marked} notification(s) read"));
            let report = ReadAllReport {
                user_id: ctx.actor.clone(),
                marked,
            };
            emit_success(ctx.output, "notify read-all", &report, Some(&human))
        }
    }
}

pub async fn run_prefs(ctx: &Context, cmd: PrefsCommands) -> Result<()> {
    match cmd {
        PrefsCommands::Show => {
            let preference = ctx.service.get_preferences(&ctx.actor).await?;
            let human = preference_table(format!("preferences for {}", ctx.actor), &preference);
            emit_success(ctx.output, "prefs show", &preference, Some(&human))
        }
        PrefsCommands::Set {
            category,
            channel,
            value,
        } => {
            let category: NotificationCategory = category.parse()?;
            let channel: Channel = channel.parse()?;
            let enabled = parse_switch(&value)?;
            let preference = ctx
                .service
                .update_preference(&ctx.actor, category, channel, enabled)
                .await?;

            let mut human = preference_table(
                format!("{category} via {channel}: {}", on_off(enabled)),
                &preference,
            );
            if category == NotificationCategory::TaskComment
                && channel == Channel::Email
                && !enabled
                && ctx.config.notifications.mentions_bypass_email_preference
            {
                human.push_warning("mentions are still emailed; they bypass this setting");
            }
            emit_success(ctx.output, "prefs set", &preference, Some(&human))
        }
    }
}

fn preference_table(header: String, preference: &NotificationPreference) -> HumanOutput {
    let mut human = HumanOutput::new(header);
    for category in NotificationCategory::ALL {
        let cells: Vec<String> = Channel::ALL
            .into_iter()
            .map(|channel| format!("{channel}={}", on_off(preference.get(category, channel))))
            .collect();
        human.push_summary(category.as_str(), cells.join(" "));
    }
    human
}

fn parse_switch(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(Error::InvalidArgument(format!(
            "expected on or off, got '{other}'"
        ))),
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
