//! Blocking evaluation for a successor task against its predecessor edges.
//!
//! Satisfaction is decided from predecessor status. Lag only participates in
//! date arithmetic: the finish-to-start date check (when both dates are
//! known) and the informational earliest start/finish values.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::id::{EdgeId, TaskId};
use crate::types::{DependencyEdge, DependencyType, Task, TaskStatus};

/// How an edge whose predecessor row no longer exists is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingPolicy {
    /// Keep the successor usable
    #[default]
    Satisfied,
    Blocking,
}

impl FromStr for DanglingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "satisfied" => Ok(DanglingPolicy::Satisfied),
            "blocking" => Ok(DanglingPolicy::Blocking),
            other => Err(format!(
                "unknown dangling policy '{other}' (expected satisfied or blocking)"
            )),
        }
    }
}

impl fmt::Display for DanglingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DanglingPolicy::Satisfied => f.write_str("satisfied"),
            DanglingPolicy::Blocking => f.write_str("blocking"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationOptions {
    pub dangling: DanglingPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeEvaluation {
    pub edge_id: EdgeId,
    pub depends_on_task_id: TaskId,
    pub predecessor_title: Option<String>,
    pub predecessor_status: Option<TaskStatus>,
    pub dependency_type: DependencyType,
    pub lag_days: i32,
    pub satisfied: bool,
    /// Predecessor row was not found
    pub missing: bool,
    /// Why the edge is unsatisfied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub earliest_start: Option<NaiveDate>,
    pub earliest_finish: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingStatus {
    pub task_id: TaskId,
    pub is_blocking: bool,
    pub details: Vec<EdgeEvaluation>,
}

impl BlockingStatus {
    pub fn unsatisfied(&self) -> impl Iterator<Item = &EdgeEvaluation> {
        self.details.iter().filter(|d| !d.satisfied)
    }

    /// Latest start implied by any edge
    pub fn earliest_start(&self) -> Option<NaiveDate> {
        self.details.iter().filter_map(|d| d.earliest_start).max()
    }

    /// Latest finish implied by any edge
    pub fn earliest_finish(&self) -> Option<NaiveDate> {
        self.details.iter().filter_map(|d| d.earliest_finish).max()
    }
}

struct Verdict {
    satisfied: bool,
    reason: Option<String>,
}

impl Verdict {
    fn satisfied() -> Self {
        Self {
            satisfied: true,
            reason: None,
        }
    }

    fn blocked(reason: String) -> Self {
        Self {
            satisfied: false,
            reason: Some(reason),
        }
    }
}

fn shift(date: Option<NaiveDate>, lag_days: i32) -> Option<NaiveDate> {
    date?.checked_add_signed(Duration::days(i64::from(lag_days)))
}

fn lag_suffix(lag_days: i32) -> String {
    match lag_days {
        0 => String::new(),
        lag if lag > 0 => format!(" + {lag}d"),
        lag => format!(" - {}d", lag.unsigned_abs()),
    }
}

fn finish_to_start(successor: &Task, predecessor: &Task, lag_days: i32) -> Verdict {
    if !predecessor.status.is_completed() {
        return Verdict::blocked(format!("{} is not yet completed", predecessor.title));
    }
    let earliest = shift(predecessor.completion_reference_date(), lag_days);
    match (successor.start_date, earliest) {
        (Some(start), Some(earliest)) if start < earliest => Verdict::blocked(format!(
            "starts {start}, before {} finished{} ({earliest})",
            predecessor.title,
            lag_suffix(lag_days)
        )),
        _ => Verdict::satisfied(),
    }
}

fn start_to_start(predecessor: &Task) -> Verdict {
    if predecessor.status.has_started() {
        Verdict::satisfied()
    } else {
        Verdict::blocked(format!("{} has not started", predecessor.title))
    }
}

fn finish_to_finish(predecessor: &Task) -> Verdict {
    if predecessor.status.is_completed() {
        Verdict::satisfied()
    } else {
        Verdict::blocked(format!("{} is not yet completed", predecessor.title))
    }
}

fn start_to_finish(predecessor: &Task) -> Verdict {
    start_to_start(predecessor)
}

/// Evaluate one edge. `predecessor` is `None` when the row is gone.
pub fn evaluate_edge(
    successor: &Task,
    edge: &DependencyEdge,
    predecessor: Option<&Task>,
    options: EvaluationOptions,
) -> EdgeEvaluation {
    let Some(predecessor) = predecessor else {
        tracing::warn!(
            task = %successor.id,
            edge = %edge.id,
            missing = %edge.depends_on_task_id,
            policy = %options.dangling,
            "dependency points at a task that no longer exists"
        );
        let satisfied = options.dangling == DanglingPolicy::Satisfied;
        return EdgeEvaluation {
            edge_id: edge.id.clone(),
            depends_on_task_id: edge.depends_on_task_id.clone(),
            predecessor_title: None,
            predecessor_status: None,
            dependency_type: edge.dependency_type,
            lag_days: edge.lag_days,
            satisfied,
            missing: true,
            reason: (!satisfied)
                .then(|| format!("predecessor {} no longer exists", edge.depends_on_task_id)),
            earliest_start: None,
            earliest_finish: None,
        };
    };

    let lag = edge.lag_days;
    let verdict = match edge.dependency_type {
        DependencyType::FinishToStart => finish_to_start(successor, predecessor, lag),
        DependencyType::StartToStart => start_to_start(predecessor),
        DependencyType::FinishToFinish => finish_to_finish(predecessor),
        DependencyType::StartToFinish => start_to_finish(predecessor),
    };

    let (earliest_start, earliest_finish) = match edge.dependency_type {
        DependencyType::FinishToStart => (shift(predecessor.completion_reference_date(), lag), None),
        DependencyType::StartToStart => (shift(predecessor.start_date, lag), None),
        DependencyType::FinishToFinish => (None, shift(predecessor.completion_reference_date(), lag)),
        DependencyType::StartToFinish => (None, shift(predecessor.start_date, lag)),
    };

    EdgeEvaluation {
        edge_id: edge.id.clone(),
        depends_on_task_id: predecessor.id.clone(),
        predecessor_title: Some(predecessor.title.clone()),
        predecessor_status: Some(predecessor.status),
        dependency_type: edge.dependency_type,
        lag_days: lag,
        satisfied: verdict.satisfied,
        missing: false,
        reason: verdict.reason,
        earliest_start,
        earliest_finish,
    }
}

/// Blocking status of `successor`: blocked iff any of its edges is
/// unsatisfied. Edges whose successor is a different task are ignored.
pub fn evaluate_blocking(
    successor: &Task,
    predecessor_edges: &[DependencyEdge],
    predecessor_tasks: &HashMap<TaskId, Task>,
    options: EvaluationOptions,
) -> BlockingStatus {
    let details: Vec<EdgeEvaluation> = predecessor_edges
        .iter()
        .filter(|edge| edge.task_id == successor.id)
        .map(|edge| {
            evaluate_edge(
                successor,
                edge,
                predecessor_tasks.get(&edge.depends_on_task_id),
                options,
            )
        })
        .collect();

    BlockingStatus {
        task_id: successor.id.clone(),
        is_blocking: details.iter().any(|d| !d.satisfied),
        details,
    }
}
