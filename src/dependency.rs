//! Dependency graph engine
//!
//! An edge `source -> target` means the source must complete before the
//! target can. Edges are scoped to one entity kind; the engine refuses any
//! edge that would close a directed cycle within that kind.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DependencyConfig;
use crate::error::{Error, Result};
use crate::store::{EntityStore, TaskFilter};

pub const DEFAULT_DEPENDENCY_TYPE: &str = "FINISH_TO_START";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Project,
    List,
    Task,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Project => "PROJECT",
            EntityKind::List => "LIST",
            EntityKind::Task => "TASK",
        }
    }

    /// Lowercase noun used in not-found messages.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::List => "list",
            EntityKind::Task => "task",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "project" => Ok(EntityKind::Project),
            "list" => Ok(EntityKind::List),
            "task" => Ok(EntityKind::Task),
            other => Err(Error::InvalidArgument(format!(
                "unknown entity kind '{other}' (expected project, list, task)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyEdge {
    pub id: String,
    pub kind: EntityKind,
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub dependency_type: String,
    pub created_at: DateTime<Utc>,
}

impl DependencyEdge {
    pub fn new(
        kind: EntityKind,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        dependency_type: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            source_id: source_id.into(),
            target_id: target_id.into(),
            dependency_type: dependency_type
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_DEPENDENCY_TYPE)
                .to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Display details for one endpoint of an edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntitySummary {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    pub complete: bool,
}

/// An edge with its source entity resolved; `source` is `None` when the
/// source no longer exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedDependency {
    #[serde(flatten)]
    pub edge: DependencyEdge,
    pub source: Option<EntitySummary>,
}

pub struct DependencyGraph {
    store: Arc<dyn EntityStore>,
    settings: DependencyConfig,
    guard: Arc<Mutex<()>>,
}

impl DependencyGraph {
    pub fn new(store: Arc<dyn EntityStore>, settings: DependencyConfig) -> Self {
        Self {
            store,
            settings,
            guard: Arc::new(Mutex::new(())),
        }
    }

    /// Serializes graph writes with gated status writes.
    pub(crate) fn guard(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.guard)
    }

    pub async fn create_dependency(
        &self,
        source_id: &str,
        target_id: &str,
        dependency_type: Option<&str>,
        kind: EntityKind,
    ) -> Result<DependencyEdge> {
        if source_id == target_id {
            return Err(Error::InvalidDependency(format!(
                "{} '{source_id}' cannot depend on itself",
                kind.label()
            )));
        }

        let _held = self.guard.lock().await;

        for id in [source_id, target_id] {
            if self.summarize(kind, id).await?.is_none() {
                return Err(Error::not_found(kind.label(), id));
            }
        }

        let existing = self.store.dependencies_by_target(kind, target_id).await?;
        if existing.iter().any(|edge| edge.source_id == source_id) {
            return Err(Error::InvalidDependency(format!(
                "{} '{target_id}' already depends on '{source_id}'",
                kind.label()
            )));
        }

        if self.checks_cycles(kind) && self.would_create_cycle(source_id, target_id, kind).await? {
            return Err(Error::CycleDetected {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
            });
        }

        let edge = DependencyEdge::new(kind, source_id, target_id, dependency_type);
        self.store.insert_dependency(edge.clone()).await?;
        info!(
            kind = %kind,
            source = source_id,
            target = target_id,
            edge = %edge.id,
            "dependency created"
        );
        Ok(edge)
    }

    pub async fn delete_dependency(&self, id: &str, kind: EntityKind) -> Result<DependencyEdge> {
        let _held = self.guard.lock().await;
        let edge = self
            .store
            .delete_dependency(kind, id)
            .await?
            .ok_or_else(|| Error::not_found("dependency", id))?;
        info!(kind = %kind, edge = id, "dependency deleted");
        Ok(edge)
    }

    /// Every edge whose target is `target_id`, with source details.
    pub async fn list_dependencies(
        &self,
        target_id: &str,
        kind: EntityKind,
    ) -> Result<Vec<ResolvedDependency>> {
        let edges = self.store.dependencies_by_target(kind, target_id).await?;
        let mut resolved = Vec::with_capacity(edges.len());
        for edge in edges {
            let source = self.summarize(kind, &edge.source_id).await?;
            resolved.push(ResolvedDependency { edge, source });
        }
        Ok(resolved)
    }

    /// Upstream sources that are not complete yet. Missing sources are
    /// treated as satisfied.
    pub async fn blockers(&self, id: &str, kind: EntityKind) -> Result<Vec<EntitySummary>> {
        Ok(self
            .list_dependencies(id, kind)
            .await?
            .into_iter()
            .filter_map(|dep| match dep.source {
                Some(source) => (!source.complete).then_some(source),
                None => {
                    debug!(edge = %dep.edge.id, source = %dep.edge.source_id, "dangling dependency source ignored");
                    None
                }
            })
            .collect())
    }

    pub async fn is_blocked(&self, id: &str, kind: EntityKind) -> Result<bool> {
        Ok(!self.blockers(id, kind).await?.is_empty())
    }

    fn checks_cycles(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Task || self.settings.enforce_acyclic_all_kinds
    }

    /// Breadth-first walk from `target_id` along existing edges, one store
    /// query per level. Reaching `source_id` means the new edge would close
    /// a cycle. Exceeding the depth bound counts as a cycle.
    async fn would_create_cycle(
        &self,
        source_id: &str,
        target_id: &str,
        kind: EntityKind,
    ) -> Result<bool> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(target_id.to_string());
        let mut frontier = vec![target_id.to_string()];
        let mut depth = 0usize;

        while !frontier.is_empty() {
            if depth >= self.settings.max_traversal_depth {
                warn!(
                    kind = %kind,
                    source = source_id,
                    target = target_id,
                    depth,
                    "dependency traversal exceeded depth bound"
                );
                return Ok(true);
            }

            let edges = self.store.dependencies_by_sources(kind, &frontier).await?;
            let mut next = Vec::new();
            for edge in edges {
                if edge.target_id == source_id {
                    debug!(kind = %kind, source = source_id, target = target_id, depth, "cycle found");
                    return Ok(true);
                }
                if visited.insert(edge.target_id.clone()) {
                    next.push(edge.target_id);
                }
            }
            frontier = next;
            depth += 1;
        }

        Ok(false)
    }

    async fn summarize(&self, kind: EntityKind, id: &str) -> Result<Option<EntitySummary>> {
        let summary = match kind {
            EntityKind::Task => self.store.get_task(id).await?.map(|task| EntitySummary {
                complete: task.status.is_done(),
                id: task.id,
                kind,
                name: task.title,
            }),
            EntityKind::List => match self.store.get_list(id).await? {
                Some(list) => {
                    let complete = self
                        .container_complete(TaskFilter {
                            list_id: Some(list.id.clone()),
                            ..TaskFilter::default()
                        })
                        .await?;
                    Some(EntitySummary {
                        id: list.id,
                        kind,
                        name: list.name,
                        complete,
                    })
                }
                None => None,
            },
            EntityKind::Project => match self.store.get_project(id).await? {
                Some(project) => {
                    let complete = self
                        .container_complete(TaskFilter {
                            project_id: Some(project.id.clone()),
                            ..TaskFilter::default()
                        })
                        .await?;
                    Some(EntitySummary {
                        id: project.id,
                        kind,
                        name: project.name,
                        complete,
                    })
                }
                None => None,
            },
        };
        Ok(summary)
    }

    async fn container_complete(&self, filter: TaskFilter) -> Result<bool> {
        Ok(self
            .store
            .list_tasks(filter)
            .await?
            .iter()
            .all(|task| task.status.is_done()))
    }
}
