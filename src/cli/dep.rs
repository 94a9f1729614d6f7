//! taskgate dep command implementation

use serde::Serialize;

use super::{Context, DepCommands};
use crate::dependency::{EntityKind, ResolvedDependency};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct DepListReport {
    target_id: String,
    kind: EntityKind,
    blocked: bool,
    dependencies: Vec<ResolvedDependency>,
}

pub async fn run(ctx: &Context, cmd: DepCommands) -> Result<()> {
    match cmd {
        DepCommands::Add {
            source,
            target,
            kind,
            dependency_type,
        } => {
            let kind: EntityKind = kind.parse()?;
            let edge = ctx
                .service
                .dependencies()
                .create_dependency(&source, &target, dependency_type.as_deref(), kind)
                .await?;

            let mut human = HumanOutput::new(format!("dependency created: {}", edge.id));
            human.push_summary("kind", kind.to_string());
            human.push_summary("edge", format!("{} -> {}", edge.source_id, edge.target_id));
            human.push_summary("type", edge.dependency_type.clone());
            human.push_next_step(format!("taskgate dep ls {} --kind {kind}", edge.target_id));

            emit_success(ctx.output, "dep add", &edge, Some(&human))
        }
        DepCommands::Rm { id, kind } => {
            let kind: EntityKind = kind.parse()?;
            let edge = ctx.service.dependencies().delete_dependency(&id, kind).await?;

            let mut human = HumanOutput::new(format!("dependency removed: {}", edge.id));
            human.push_summary("edge", format!("{} -> {}", edge.source_id, edge.target_id));

            emit_success(ctx.output, "dep rm", &edge, Some(&human))
        }
        DepCommands::Ls { target, kind } => {
            let kind: EntityKind = kind.parse()?;
            let dependencies = ctx
                .service
                .dependencies()
                .list_dependencies(&target, kind)
                .await?;
            let blocked = dependencies
                .iter()
                .any(|dep| dep.source.as_ref().is_some_and(|source| !source.complete));

            let mut human = HumanOutput::new(format!(
                "{} dependencies of {target}: {}",
                kind.label(),
                dependencies.len()
            ));
            human.push_summary("blocked", if blocked { "yes" } else { "no" });
            for dep in &dependencies {
                let state = match &dep.source {
                    Some(source) if source.complete => format!("{} complete", source.name),
                    Some(source) => format!("{} pending", source.name),
                    None => "source missing (ignored)".to_string(),
                };
                human.push_detail(format!(
                    "{} {} [{}] {state}",
                    dep.edge.id, dep.edge.source_id, dep.edge.dependency_type
                ));
            }

            let report = DepListReport {
                target_id: target,
                kind,
                blocked,
                dependencies,
            };
            emit_success(ctx.output, "dep ls", &report, Some(&human))
        }
    }
}
