//! taskgate task command implementation

use chrono::Utc;
use serde::Serialize;

use super::{parse_datetime, parse_optional_datetime, push_delivery_warnings, Context, TaskCommands};
use crate::error::Result;
use crate::notification::DeliveryReport;
use crate::output::{emit_success, HumanOutput};
use crate::service::{NewTask, TaskChange};
use crate::task::{TaskPriority, TaskRecord, TaskStatus, TaskUpdate};

#[derive(Serialize)]
struct MembershipReport {
    task_id: String,
    user_id: String,
    role: &'static str,
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification: Option<DeliveryReport>,
}

#[derive(Serialize)]
struct DeleteReport {
    task_id: String,
}

#[derive(Serialize)]
struct ScanReport {
    now: chrono::DateTime<Utc>,
    sent: usize,
    notifications: Vec<DeliveryReport>,
}

pub async fn run(ctx: &Context, cmd: TaskCommands) -> Result<()> {
    match cmd {
        TaskCommands::New {
            project,
            title,
            list,
            parent,
            priority,
            due,
        } => {
            let mut new = NewTask::new(project, title);
            new.list_id = list;
            new.parent_id = parent;
            new.priority = priority.parse()?;
            new.due_date = due.as_deref().map(parse_datetime).transpose()?;
            run_new(ctx, new).await
        }
        TaskCommands::Show { id } => run_show(ctx, &id).await,
        TaskCommands::Status {
            id,
            status,
            completed_at,
        } => {
            let status: TaskStatus = status.parse()?;
            let mut update = TaskUpdate::status(status);
            update.completed_at = completed_at
                .as_deref()
                .map(parse_optional_datetime)
                .transpose()?;
            run_update(ctx, &id, update, "task status").await
        }
        TaskCommands::Priority { id, priority } => {
            let priority: TaskPriority = priority.parse()?;
            let update = TaskUpdate {
                priority: Some(priority),
                ..TaskUpdate::default()
            };
            run_update(ctx, &id, update, "task priority").await
        }
        TaskCommands::Due { id, due } => {
            let update = TaskUpdate {
                due_date: Some(parse_optional_datetime(&due)?),
                ..TaskUpdate::default()
            };
            run_update(ctx, &id, update, "task due").await
        }
        TaskCommands::Assign { id, user, remove } => run_assign(ctx, &id, &user, remove).await,
        TaskCommands::Watch { id, user, remove } => {
            let user = user.unwrap_or_else(|| ctx.actor.clone());
            run_watch(ctx, &id, &user, remove).await
        }
        TaskCommands::Rm { id } => run_rm(ctx, &id).await,
        TaskCommands::ScanDue { now } => {
            let now = match now {
                Some(raw) => parse_datetime(&raw)?,
                None => Utc::now(),
            };
            run_scan_due(ctx, now).await
        }
    }
}

async fn run_new(ctx: &Context, new: NewTask) -> Result<()> {
    let task = ctx.service.create_task(new, &ctx.actor).await?;

    let mut human = HumanOutput::new(format!("task created: {}", task.id));
    push_task_summary(&mut human, &task);
    human.push_next_step(format!("taskgate task assign {} <user>", task.id));

    emit_success(ctx.output, "task new", &task, Some(&human))
}

async fn run_show(ctx: &Context, id: &str) -> Result<()> {
    let view = ctx.service.task_view(id).await?;

    let mut human = HumanOutput::new(format!("{} ({})", view.task.title, view.task.id));
    push_task_summary(&mut human, &view.task);
    if !view.assignees.is_empty() {
        human.push_summary("assignees", view.assignees.join(", "));
    }
    if !view.watchers.is_empty() {
        human.push_summary("watchers", view.watchers.join(", "));
    }
    for child in &view.subtasks {
        human.push_detail(format!("subtask {} [{}] {}", child.id, child.status, child.title));
    }
    for dep in &view.dependencies {
        let source = match &dep.source {
            Some(source) if source.complete => format!("{} (done)", source.name),
            Some(source) => format!("{} (open)", source.name),
            None => format!("{} (missing)", dep.edge.source_id),
        };
        human.push_detail(format!("depends on {source} via {}", dep.edge.dependency_type));
    }
    for entry in &view.activity {
        human.push_detail(format!(
            "{} {}: {} -> {}",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.field.as_str(),
            entry.old_value.as_deref().unwrap_or("-"),
            entry.new_value.as_deref().unwrap_or("-"),
        ));
    }

    emit_success(ctx.output, "task show", &view, Some(&human))
}

async fn run_update(ctx: &Context, id: &str, update: TaskUpdate, command: &str) -> Result<()> {
    let change: TaskChange = ctx.service.update_task(id, update, &ctx.actor).await?;
    let task = &change.outcome.task;

    let header = if change.outcome.activity.is_empty() {
        format!("task unchanged: {}", task.id)
    } else {
        format!("task updated: {}", task.id)
    };
    let mut human = HumanOutput::new(header);
    push_task_summary(&mut human, task);
    for entry in &change.outcome.activity {
        human.push_detail(format!(
            "{}: {} -> {}",
            entry.field.as_str(),
            entry.old_value.as_deref().unwrap_or("-"),
            entry.new_value.as_deref().unwrap_or("-"),
        ));
    }
    if !change.notifications.is_empty() {
        human.push_summary("notified", change.notifications.len().to_string());
    }
    push_delivery_warnings(&mut human, &change.notifications);

    emit_success(ctx.output, command, &change, Some(&human))
}

async fn run_assign(ctx: &Context, id: &str, user: &str, remove: bool) -> Result<()> {
    let (changed, notification) = if remove {
        (ctx.service.unassign_task(id, user).await?, None)
    } else {
        let assignment = ctx.service.assign_task(id, user, &ctx.actor).await?;
        (assignment.added, assignment.notification)
    };

    let report = MembershipReport {
        task_id: id.to_string(),
        user_id: user.to_string(),
        role: "assignee",
        changed,
        notification,
    };

    let verb = match (remove, changed) {
        (false, true) => "assigned",
        (true, true) => "unassigned",
        (false, false) => "already assigned",
        (true, false) => "was not assigned",
    };
    let mut human = HumanOutput::new(format!("{user} {verb}: {id}"));
    if let Some(notification) = &report.notification {
        push_delivery_warnings(&mut human, std::slice::from_ref(notification));
    }

    emit_success(ctx.output, "task assign", &report, Some(&human))
}

async fn run_watch(ctx: &Context, id: &str, user: &str, remove: bool) -> Result<()> {
    let changed = if remove {
        ctx.service.unwatch_task(id, user).await?
    } else {
        ctx.service.watch_task(id, user).await?
    };

    let report = MembershipReport {
        task_id: id.to_string(),
        user_id: user.to_string(),
        role: "watcher",
        changed,
        notification: None,
    };
    let verb = match (remove, changed) {
        (false, true) => "now watching",
        (true, true) => "stopped watching",
        (false, false) => "already watching",
        (true, false) => "was not watching",
    };
    let human = HumanOutput::new(format!("{user} {verb}: {id}"));

    emit_success(ctx.output, "task watch", &report, Some(&human))
}

async fn run_rm(ctx: &Context, id: &str) -> Result<()> {
    ctx.service.delete_task(id).await?;
    let mut human = HumanOutput::new(format!("task deleted: {id}"));
    human.push_warning("dependency edges referencing this task are kept and count as satisfied".to_string());
    emit_success(
        ctx.output,
        "task rm",
        &DeleteReport {
            task_id: id.to_string(),
        },
        Some(&human),
    )
}

async fn run_scan_due(ctx: &Context, now: chrono::DateTime<Utc>) -> Result<()> {
    let notifications = ctx.service.scan_due_dates(now).await?;
    let report = ScanReport {
        now,
        sent: notifications.len(),
        notifications,
    };

    let mut human = HumanOutput::new(format!("due date scan: {} notification(s)", report.sent));
    push_delivery_warnings(&mut human, &report.notifications);

    emit_success(ctx.output, "task scan-due", &report, Some(&human))
}

fn push_task_summary(human: &mut HumanOutput, task: &TaskRecord) {
    human.push_summary("title", task.title.clone());
    human.push_summary("status", task.status.to_string());
    human.push_summary("priority", task.priority.to_string());
    human.push_summary("project", task.project_id.clone());
    if let Some(parent) = &task.parent_id {
        human.push_summary("parent", parent.clone());
    }
    if let Some(due) = task.due_date {
        human.push_summary("due", due.to_rfc3339());
    }
    if let Some(done) = task.completed_at {
        human.push_summary("completed", done.to_rfc3339());
    }
}
