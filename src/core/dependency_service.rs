use std::collections::{HashMap, HashSet};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::core::cycle_guard::{self, DependencyGraph};
use crate::core::evaluator::{self, BlockingStatus, EvaluationOptions};
use crate::core::view::{self, DependencyView};
use crate::db::{edge_repo, project_repo, task_repo};
use crate::error::{Result, TgError};
use crate::id::{EdgeId, ProjectId, TaskId};
use crate::types::{DependencyEdge, EdgeScope, NewDependency, Task};

const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    /// Attempts at the full add-dependency sequence while the write lock is contended
    pub max_write_attempts: u32,
    pub evaluation: EvaluationOptions,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            evaluation: EvaluationOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOutcome {
    pub edge_id: EdgeId,
    /// False when the edge was already gone
    pub removed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectProgress {
    pub total: usize,
    pub completed: usize,
    pub ready: usize,
    pub blocked: usize,
}

/// Blocked task together with the reasons it cannot proceed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedTask {
    pub task: Task,
    pub status: BlockingStatus,
}

pub struct DependencyService<'a> {
    conn: &'a Connection,
    settings: ServiceSettings,
}

impl<'a> DependencyService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_settings(conn, ServiceSettings::default())
    }

    pub fn with_settings(conn: &'a Connection, settings: ServiceSettings) -> Self {
        Self { conn, settings }
    }

    /// Add `candidate` as a dependency edge.
    ///
    /// Validation order: self-reference, endpoint lookup, same project,
    /// duplicate pair, cycle; then persist. Everything runs in one
    /// `BEGIN IMMEDIATE` transaction so no other writer can change the
    /// project's edge set between the cycle check and the insert. When the
    /// write lock cannot be taken the whole sequence is retried on fresh data.
    pub fn add_dependency(&self, candidate: &NewDependency) -> Result<DependencyEdge> {
        // Cheap and data-independent, so rejected before touching storage
        if candidate.task_id == candidate.depends_on_task_id {
            return Err(TgError::SelfReference(candidate.task_id.clone()));
        }

        let max_attempts = self.settings.max_write_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_add_dependency(candidate) {
                Err(err) if err.is_busy() => {
                    if attempt >= max_attempts {
                        tracing::warn!(
                            task = %candidate.task_id,
                            attempts = attempt,
                            "giving up on contended dependency insert"
                        );
                        return Err(TgError::Conflict { attempts: attempt });
                    }
                    tracing::warn!(
                        task = %candidate.task_id,
                        attempt,
                        "dependency insert hit a locked database, revalidating"
                    );
                    std::thread::sleep(Duration::from_millis(10 * u64::from(attempt)));
                }
                other => return other,
            }
        }
    }

    fn try_add_dependency(&self, candidate: &NewDependency) -> Result<DependencyEdge> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let task = task_repo::get_task(&tx, &candidate.task_id)?
            .ok_or_else(|| TgError::TaskNotFound(candidate.task_id.clone()))?;
        let predecessor = task_repo::get_task(&tx, &candidate.depends_on_task_id)?
            .ok_or_else(|| TgError::TaskNotFound(candidate.depends_on_task_id.clone()))?;

        if task.project_id != predecessor.project_id {
            return Err(TgError::CrossProject {
                task_id: task.id,
                task_project: task.project_id,
                depends_on_task_id: predecessor.id,
                depends_on_project: predecessor.project_id,
            });
        }

        if let Some(existing) = edge_repo::find_edge(&tx, &task.id, &predecessor.id)? {
            return Err(TgError::DuplicateEdge {
                task_id: task.id,
                depends_on_task_id: predecessor.id,
                existing: existing.id,
            });
        }

        let project_edges =
            edge_repo::list_edges(&tx, &EdgeScope::Project(task.project_id.clone()))?;
        if let Err(err) = cycle_guard::can_add_edge(&project_edges, candidate) {
            return Err(self.describe_cycle(&tx, err)?);
        }

        let edge_id = edge_repo::insert_edge(
            &tx,
            &task.project_id,
            &task.id,
            &predecessor.id,
            candidate.dependency_type,
            candidate.lag_days,
        )?;
        let edge = edge_repo::get_edge(&tx, &edge_id)?
            .ok_or_else(|| TgError::EdgeNotFound(edge_id.clone()))?;
        tx.commit()?;

        tracing::info!(
            edge = %edge.id,
            task = %edge.task_id,
            depends_on = %edge.depends_on_task_id,
            kind = %edge.dependency_type,
            lag_days = edge.lag_days,
            "dependency added"
        );
        Ok(edge)
    }

    /// Replace ids in a cycle message with task titles for display.
    fn describe_cycle(&self, conn: &Connection, err: TgError) -> Result<TgError> {
        let TgError::CycleDetected { path, message } = err else {
            return Ok(err);
        };
        let tasks = task_repo::get_tasks(conn, path.iter())?;
        let names: Vec<String> = path
            .iter()
            .map(|id| {
                tasks
                    .get(id)
                    .map(|t| format!("{} ({})", t.title, id))
                    .unwrap_or_else(|| id.to_string())
            })
            .collect();
        let message = if names.is_empty() {
            message
        } else {
            format!("Dependency would create a cycle: {}", names.join(" -> "))
        };
        Ok(TgError::CycleDetected { message, path })
    }

    /// Remove an edge. Missing edges are a no-op.
    pub fn remove_dependency(&self, edge_id: &EdgeId) -> Result<RemoveOutcome> {
        let removed = edge_repo::delete_edge(self.conn, edge_id)?;
        if removed {
            tracing::info!(edge = %edge_id, "dependency removed");
        } else {
            tracing::debug!(edge = %edge_id, "dependency already absent");
        }
        Ok(RemoveOutcome {
            edge_id: edge_id.clone(),
            removed,
        })
    }

    pub fn list_edges(&self, scope: &EdgeScope) -> Result<Vec<DependencyEdge>> {
        self.read(|conn| {
            match scope {
                EdgeScope::Project(id) if !project_repo::project_exists(conn, id)? => {
                    return Err(TgError::ProjectNotFound(id.clone()));
                }
                EdgeScope::Task(id) if !task_repo::task_exists(conn, id)? => {
                    return Err(TgError::TaskNotFound(id.clone()));
                }
                _ => {}
            }
            edge_repo::list_edges(conn, scope)
        })
    }

    /// Run a multi-query read against a single snapshot of the database.
    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn get_dependency_view(&self, task_id: &TaskId) -> Result<DependencyView> {
        view::build_view(self.conn, task_id, self.settings.evaluation)
    }

    pub fn blocking_status(&self, task_id: &TaskId) -> Result<BlockingStatus> {
        self.read(|conn| {
            let task = task_repo::get_task(conn, task_id)?
                .ok_or_else(|| TgError::TaskNotFound(task_id.clone()))?;
            let edges = edge_repo::list_edges(conn, &EdgeScope::Task(task_id.clone()))?;
            let predecessors =
                task_repo::get_tasks(conn, edges.iter().map(|e| &e.depends_on_task_id))?;
            Ok(evaluator::evaluate_blocking(
                &task,
                &edges,
                &predecessors,
                self.settings.evaluation,
            ))
        })
    }

    /// Tasks that may be added as predecessors of `task_id`: same project,
    /// not the task itself, not already a predecessor, and not closing a cycle.
    pub fn predecessor_candidates(&self, task_id: &TaskId) -> Result<Vec<Task>> {
        self.read(|conn| {
            let task = task_repo::get_task(conn, task_id)?
                .ok_or_else(|| TgError::TaskNotFound(task_id.clone()))?;
            let edges = edge_repo::list_edges(conn, &EdgeScope::Project(task.project_id.clone()))?;
            let graph = DependencyGraph::from_edges(&edges);

            let existing: HashSet<&TaskId> =
                graph.predecessors_of(task_id).iter().copied().collect();

            let candidates = task_repo::list_tasks_by_project(conn, &task.project_id)?
                .into_iter()
                .filter(|t| &t.id != task_id)
                .filter(|t| !existing.contains(&t.id))
                .filter(|t| graph.cycle_through(task_id, &t.id).is_none())
                .collect();
            Ok(candidates)
        })
    }

    /// Evaluate every task of a project against one load of its edges.
    pub fn evaluate_project(&self, project_id: &ProjectId) -> Result<Vec<(Task, BlockingStatus)>> {
        let (tasks, edges) = self.read(|conn| {
            if !project_repo::project_exists(conn, project_id)? {
                return Err(TgError::ProjectNotFound(project_id.clone()));
            }
            let tasks = task_repo::list_tasks_by_project(conn, project_id)?;
            let edges = edge_repo::list_edges(conn, &EdgeScope::Project(project_id.clone()))?;
            Ok((tasks, edges))
        })?;

        let mut by_successor: HashMap<&TaskId, Vec<DependencyEdge>> = HashMap::new();
        for edge in &edges {
            by_successor
                .entry(&edge.task_id)
                .or_default()
                .push(edge.clone());
        }
        let snapshots: HashMap<TaskId, Task> =
            tasks.iter().map(|t| (t.id.clone(), t.clone())).collect();

        let evaluated = tasks
            .into_iter()
            .map(|task| {
                let task_edges = by_successor
                    .get(&task.id)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                let status = evaluator::evaluate_blocking(
                    &task,
                    task_edges,
                    &snapshots,
                    self.settings.evaluation,
                );
                (task, status)
            })
            .collect();
        Ok(evaluated)
    }

    /// Unfinished tasks of a project that are currently blocked
    pub fn blocked_tasks(&self, project_id: &ProjectId) -> Result<Vec<BlockedTask>> {
        Ok(self
            .evaluate_project(project_id)?
            .into_iter()
            .filter(|(task, status)| !task.status.is_completed() && status.is_blocking)
            .map(|(task, status)| BlockedTask { task, status })
            .collect())
    }

    pub fn project_progress(&self, project_id: &ProjectId) -> Result<ProjectProgress> {
        let mut progress = ProjectProgress::default();
        for (task, status) in self.evaluate_project(project_id)? {
            progress.total += 1;
            if task.status.is_completed() {
                progress.completed += 1;
            } else if status.is_blocking {
                progress.blocked += 1;
            } else {
                progress.ready += 1;
            }
        }
        Ok(progress)
    }
}
