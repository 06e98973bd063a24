//! Acyclicity check for candidate dependency edges.
//!
//! The graph is built from a freshly loaded edge set for every operation;
//! nothing here holds state between calls.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, TgError};
use crate::id::TaskId;
use crate::types::{DependencyEdge, NewDependency};

/// "Depends on" adjacency of one project: successor -> predecessors.
#[derive(Debug, Default)]
pub struct DependencyGraph<'a> {
    predecessors: HashMap<&'a TaskId, Vec<&'a TaskId>>,
}

impl<'a> DependencyGraph<'a> {
    pub fn from_edges(edges: &'a [DependencyEdge]) -> Self {
        let mut predecessors: HashMap<&TaskId, Vec<&TaskId>> = HashMap::new();
        for edge in edges {
            predecessors
                .entry(&edge.task_id)
                .or_default()
                .push(&edge.depends_on_task_id);
        }
        Self { predecessors }
    }

    pub fn predecessors_of(&self, task_id: &TaskId) -> &[&'a TaskId] {
        self.predecessors
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Chain of "depends on" hops from `from` to `to`, both inclusive.
    /// Iterative DFS; each task is expanded at most once.
    pub fn dependency_path(&self, from: &TaskId, to: &TaskId) -> Option<Vec<TaskId>> {
        if from == to {
            return Some(vec![from.clone()]);
        }

        let mut came_from: HashMap<&TaskId, &TaskId> = HashMap::new();
        let mut visited: HashSet<&TaskId> = HashSet::new();
        let mut stack: Vec<&TaskId> = vec![from];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for &next in self.predecessors_of(current) {
                if visited.contains(next) {
                    continue;
                }
                came_from.entry(next).or_insert(current);
                if next == to {
                    return Some(unwind(&came_from, from, next));
                }
                stack.push(next);
            }
        }

        None
    }

    /// Cycle that `task_id -> depends_on_task_id` would close, as
    /// `[task, predecessor, ..., task]`.
    pub fn cycle_through(&self, task_id: &TaskId, depends_on_task_id: &TaskId) -> Option<Vec<TaskId>> {
        let mut path = self.dependency_path(depends_on_task_id, task_id)?;
        path.insert(0, task_id.clone());
        Some(path)
    }
}

fn unwind<'g>(
    came_from: &HashMap<&'g TaskId, &'g TaskId>,
    from: &TaskId,
    to: &'g TaskId,
) -> Vec<TaskId> {
    let mut path = vec![to.clone()];
    let mut current = to;
    while current != from {
        match came_from.get(current) {
            Some(&prev) => {
                path.push(prev.clone());
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

pub fn format_path(path: &[TaskId]) -> String {
    path.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Reject `candidate` if it would make the project's edge set cyclic.
pub fn can_add_edge(project_edges: &[DependencyEdge], candidate: &NewDependency) -> Result<()> {
    let graph = DependencyGraph::from_edges(project_edges);
    match graph.cycle_through(&candidate.task_id, &candidate.depends_on_task_id) {
        Some(path) => {
            tracing::debug!(
                task = %candidate.task_id,
                depends_on = %candidate.depends_on_task_id,
                hops = path.len() - 1,
                "candidate dependency closes a cycle"
            );
            Err(TgError::CycleDetected {
                message: format!(
                    "Dependency would create a cycle: {}",
                    format_path(&path)
                ),
                path,
            })
        }
        None => Ok(()),
    }
}
