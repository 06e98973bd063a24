use clap::{Args, Subcommand};
use rusqlite::Connection;

use crate::commands::{parse_dependency_type, parse_edge_id, parse_project_id, parse_task_id};
use crate::core::{
    BlockedTask, DependencyService, DependencyView, RemoveOutcome, ServiceSettings,
};
use crate::error::Result;
use crate::id::{EdgeId, ProjectId, TaskId};
use crate::types::{DependencyEdge, DependencyType, EdgeScope, NewDependency, Task};

#[derive(Subcommand, Clone)]
pub enum DepCommand {
    /// Make a task depend on another task of the same project
    Add(AddArgs),
    /// Remove a dependency edge (no-op when already gone)
    Remove {
        #[arg(value_parser = parse_edge_id)]
        edge: EdgeId,
    },
    /// List edges of a project or the predecessor edges of a task
    List(ListArgs),
    /// Predecessors, successors and blocking status of a task
    View {
        #[arg(value_parser = parse_task_id)]
        task: TaskId,
    },
    /// Tasks that can still be added as predecessors of a task
    Candidates {
        #[arg(value_parser = parse_task_id)]
        task: TaskId,
    },
    /// Unfinished tasks currently blocked by a predecessor
    Blocked {
        #[arg(long, value_parser = parse_project_id)]
        project: ProjectId,
    },
}

#[derive(Args, Clone)]
pub struct AddArgs {
    /// Successor task
    #[arg(value_parser = parse_task_id)]
    pub task: TaskId,

    /// Predecessor task
    #[arg(long = "on", value_parser = parse_task_id)]
    pub depends_on: TaskId,

    /// finish_to_start (FS), start_to_start (SS), finish_to_finish (FF), start_to_finish (SF)
    #[arg(long = "type", value_parser = parse_dependency_type, default_value = "finish_to_start")]
    pub dependency_type: DependencyType,

    /// Offset in days; negative values are leads
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub lag: i32,
}

#[derive(Args, Clone)]
#[command(group = clap::ArgGroup::new("scope").required(true).multiple(false))]
pub struct ListArgs {
    #[arg(long, value_parser = parse_project_id, group = "scope")]
    pub project: Option<ProjectId>,

    #[arg(long, value_parser = parse_task_id, group = "scope")]
    pub task: Option<TaskId>,
}

impl ListArgs {
    fn scope(self) -> Option<EdgeScope> {
        match (self.project, self.task) {
            (Some(project), _) => Some(EdgeScope::Project(project)),
            (None, Some(task)) => Some(EdgeScope::Task(task)),
            (None, None) => None,
        }
    }
}

pub enum DepResult {
    Added(DependencyEdge),
    Removed(RemoveOutcome),
    Edges(Vec<DependencyEdge>),
    View(Box<DependencyView>),
    Candidates(Vec<Task>),
    Blocked(Vec<BlockedTask>),
}

pub fn handle(conn: &Connection, settings: ServiceSettings, cmd: DepCommand) -> Result<DepResult> {
    let svc = DependencyService::with_settings(conn, settings);

    match cmd {
        DepCommand::Add(args) => {
            let candidate = NewDependency::new(args.task, args.depends_on)
                .with_type(args.dependency_type)
                .with_lag(args.lag);
            Ok(DepResult::Added(svc.add_dependency(&candidate)?))
        }
        DepCommand::Remove { edge } => Ok(DepResult::Removed(svc.remove_dependency(&edge)?)),
        DepCommand::List(args) => match args.scope() {
            Some(scope) => Ok(DepResult::Edges(svc.list_edges(&scope)?)),
            // clap's required group makes this unreachable from the CLI
            None => Ok(DepResult::Edges(Vec::new())),
        },
        DepCommand::View { task } => Ok(DepResult::View(Box::new(svc.get_dependency_view(&task)?))),
        DepCommand::Candidates { task } => {
            Ok(DepResult::Candidates(svc.predecessor_candidates(&task)?))
        }
        DepCommand::Blocked { project } => Ok(DepResult::Blocked(svc.blocked_tasks(&project)?)),
    }
}
