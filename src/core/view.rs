use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::core::evaluator::{self, EvaluationOptions};
use crate::db::{edge_repo, task_repo};
use crate::error::{Result, TgError};
use crate::id::{EdgeId, ProjectId, TaskId};
use crate::types::{DependencyType, EdgeScope, TaskStatus};

/// Denormalized read model of one task's dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyView {
    pub task_id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub status: TaskStatus,
    pub is_blocking: bool,
    pub earliest_start: Option<NaiveDate>,
    pub earliest_finish: Option<NaiveDate>,
    pub predecessors: Vec<PredecessorView>,
    #[serde(default)]
    pub successors: Vec<SuccessorView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredecessorView {
    pub edge_id: EdgeId,
    pub task_id: TaskId,
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub status_label: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub progress: Option<u8>,
    pub dependency_type: DependencyType,
    pub lag_days: i32,
    pub satisfied: bool,
    #[serde(default)]
    pub missing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub earliest_start: Option<NaiveDate>,
    pub earliest_finish: Option<NaiveDate>,
}

/// A task that depends on the viewed one
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessorView {
    pub edge_id: EdgeId,
    pub task_id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub dependency_type: DependencyType,
    pub lag_days: i32,
}

/// Build the view from current rows. Never cached: every call re-reads
/// edges and task snapshots and re-runs the evaluator.
///
/// All reads share one deferred transaction, so edges and task snapshots
/// come from the same committed state even while other connections write.
pub fn build_view(
    conn: &Connection,
    task_id: &TaskId,
    options: EvaluationOptions,
) -> Result<DependencyView> {
    let tx = conn.unchecked_transaction()?;
    let view = build_view_in(&tx, task_id, options)?;
    tx.commit()?;
    Ok(view)
}

fn build_view_in(
    conn: &Connection,
    task_id: &TaskId,
    options: EvaluationOptions,
) -> Result<DependencyView> {
    let task =
        task_repo::get_task(conn, task_id)?.ok_or_else(|| TgError::TaskNotFound(task_id.clone()))?;

    let edges = edge_repo::list_edges(conn, &EdgeScope::Task(task_id.clone()))?;
    let predecessors = task_repo::get_tasks(conn, edges.iter().map(|e| &e.depends_on_task_id))?;
    let status = evaluator::evaluate_blocking(&task, &edges, &predecessors, options);

    let predecessor_views = status
        .details
        .iter()
        .map(|detail| {
            let snapshot = predecessors.get(&detail.depends_on_task_id);
            PredecessorView {
                edge_id: detail.edge_id.clone(),
                task_id: detail.depends_on_task_id.clone(),
                title: detail.predecessor_title.clone(),
                status: detail.predecessor_status,
                status_label: detail.predecessor_status.map(|s| s.label().to_string()),
                due_date: snapshot.and_then(|t| t.due_date),
                progress: snapshot.map(|t| t.progress),
                dependency_type: detail.dependency_type,
                lag_days: detail.lag_days,
                satisfied: detail.satisfied,
                missing: detail.missing,
                reason: detail.reason.clone(),
                earliest_start: detail.earliest_start,
                earliest_finish: detail.earliest_finish,
            }
        })
        .collect();

    let successor_edges = edge_repo::list_successor_edges(conn, task_id)?;
    let successor_tasks =
        task_repo::get_tasks(conn, successor_edges.iter().map(|e| &e.task_id))?;
    let successors = successor_edges
        .iter()
        .filter_map(|edge| {
            let succ = successor_tasks.get(&edge.task_id)?;
            Some(SuccessorView {
                edge_id: edge.id.clone(),
                task_id: succ.id.clone(),
                title: succ.title.clone(),
                status: succ.status,
                dependency_type: edge.dependency_type,
                lag_days: edge.lag_days,
            })
        })
        .collect();

    tracing::debug!(
        task = %task_id,
        predecessors = status.details.len(),
        is_blocking = status.is_blocking,
        "built dependency view"
    );

    Ok(DependencyView {
        task_id: task.id,
        project_id: task.project_id,
        title: task.title,
        status: task.status,
        is_blocking: status.is_blocking,
        earliest_start: status.earliest_start(),
        earliest_finish: status.earliest_finish(),
        predecessors: predecessor_views,
        successors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{project_repo, schema};
    use crate::types::CreateTaskInput;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        schema::init_schema(&conn).unwrap();
        conn
    }

    fn task(conn: &Connection, project: &ProjectId, title: &str) -> TaskId {
        task_repo::create_task(
            conn,
            project,
            &CreateTaskInput {
                title: title.to_string(),
                progress: Some(40),
                ..Default::default()
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn view_joins_predecessor_attributes() {
        let conn = setup_db();
        let project = project_repo::create_project(&conn, "P").unwrap().id;
        let a = task(&conn, &project, "Write docs");
        let b = task(&conn, &project, "Freeze API");
        edge_repo::insert_edge(&conn, &project, &a, &b, DependencyType::FinishToStart, 1).unwrap();

        let view = build_view(&conn, &a, EvaluationOptions::default()).unwrap();
        assert!(view.is_blocking);
        assert_eq!(view.predecessors.len(), 1);
        let pred = &view.predecessors[0];
        assert_eq!(pred.task_id, b);
        assert_eq!(pred.title.as_deref(), Some("Freeze API"));
        assert_eq!(pred.status_label.as_deref(), Some("Pending"));
        assert_eq!(pred.progress, Some(40));
        assert_eq!(pred.lag_days, 1);
        assert!(!pred.satisfied);

        let b_view = build_view(&conn, &b, EvaluationOptions::default()).unwrap();
        assert!(!b_view.is_blocking);
        assert_eq!(b_view.successors.len(), 1);
        assert_eq!(b_view.successors[0].task_id, a);
    }

    #[test]
    fn view_reflects_status_change_without_invalidation() {
        let conn = setup_db();
        let project = project_repo::create_project(&conn, "P").unwrap().id;
        let a = task(&conn, &project, "A");
        let b = task(&conn, &project, "B");
        edge_repo::insert_edge(&conn, &project, &a, &b, DependencyType::StartToStart, 0).unwrap();

        assert!(build_view(&conn, &a, EvaluationOptions::default()).unwrap().is_blocking);
        task_repo::set_status(&conn, &b, TaskStatus::InProgress).unwrap();
        assert!(!build_view(&conn, &a, EvaluationOptions::default()).unwrap().is_blocking);
    }

    #[test]
    fn view_for_missing_task_errors() {
        let conn = setup_db();
        let result = build_view(&conn, &TaskId::new(), EvaluationOptions::default());
        assert!(matches!(result, Err(TgError::TaskNotFound(_))));
    }
}
