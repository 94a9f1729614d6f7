//! taskgate user/project/list commands

use super::Context;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

pub async fn run_user_add(ctx: &Context, id: &str, name: &str, email: &str) -> Result<()> {
    let user = ctx.service.create_user(id, name, email).await?;

    let mut human = HumanOutput::new(format!("user saved: {}", user.id));
    human.push_summary("name", user.name.clone());
    if user.email.is_empty() {
        human.push_warning("no email address; email notifications will be skipped".to_string());
    } else {
        human.push_summary("email", user.email.clone());
    }

    emit_success(ctx.output, "user add", &user, Some(&human))
}

pub async fn run_project_add(ctx: &Context, name: &str, workspace: &str) -> Result<()> {
    let project = ctx.service.create_project(name, workspace).await?;

    let mut human = HumanOutput::new(format!("project created: {}", project.id));
    human.push_summary("name", project.name.clone());
    human.push_summary("workspace", project.workspace_id.clone());
    human.push_next_step(format!("taskgate task new {} \"<title>\"", project.id));

    emit_success(ctx.output, "project add", &project, Some(&human))
}

pub async fn run_list_add(ctx: &Context, project: &str, name: &str) -> Result<()> {
    let list = ctx.service.create_list(project, name).await?;

    let mut human = HumanOutput::new(format!("list created: {}", list.id));
    human.push_summary("name", list.name.clone());
    human.push_summary("project", list.project_id.clone());

    emit_success(ctx.output, "list add", &list, Some(&human))
}
