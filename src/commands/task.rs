use chrono::NaiveDate;
use clap::{Args, Subcommand};
use rusqlite::Connection;

use crate::commands::{parse_date, parse_project_id, parse_status, parse_task_id};
use crate::db::{project_repo, task_repo};
use crate::error::{Result, TgError};
use crate::id::{ProjectId, TaskId};
use crate::types::{CreateTaskInput, Task, TaskStatus, UpdateTaskInput};

#[derive(Subcommand, Clone)]
pub enum TaskCommand {
    Create(CreateArgs),
    Get {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    List {
        #[arg(long, value_parser = parse_project_id)]
        project: ProjectId,
    },
    /// Update title, status, progress or dates
    Set(SetArgs),
    /// Delete a task; its dependency edges are removed with it
    Delete {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
}

#[derive(Args, Clone)]
pub struct CreateArgs {
    #[arg(long, value_parser = parse_project_id)]
    pub project: ProjectId,

    #[arg(short = 't', long)]
    pub title: String,

    /// pending, in_progress, review, completed
    #[arg(long, value_parser = parse_status)]
    pub status: Option<TaskStatus>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub progress: Option<u8>,

    /// Due date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub due: Option<NaiveDate>,

    /// Start date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub start: Option<NaiveDate>,
}

#[derive(Args, Clone)]
pub struct SetArgs {
    #[arg(value_parser = parse_task_id)]
    pub id: TaskId,

    #[arg(short = 't', long)]
    pub title: Option<String>,

    #[arg(long, value_parser = parse_status)]
    pub status: Option<TaskStatus>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub progress: Option<u8>,

    #[arg(long, value_parser = parse_date)]
    pub due: Option<NaiveDate>,

    #[arg(long, value_parser = parse_date)]
    pub start: Option<NaiveDate>,

    /// Remove the due date
    #[arg(long, conflicts_with = "due")]
    pub clear_due: bool,

    /// Remove the start date
    #[arg(long, conflicts_with = "start")]
    pub clear_start: bool,
}

/// `--clear-*` wins over an absent value; clap rejects both together.
fn date_change(value: Option<NaiveDate>, clear: bool) -> Option<Option<NaiveDate>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

pub enum TaskResult {
    One(Task),
    Many(Vec<Task>),
    Deleted,
}

pub fn handle(conn: &Connection, cmd: TaskCommand) -> Result<TaskResult> {
    match cmd {
        TaskCommand::Create(args) => {
            if !project_repo::project_exists(conn, &args.project)? {
                return Err(TgError::ProjectNotFound(args.project));
            }
            let input = CreateTaskInput {
                title: args.title,
                status: args.status,
                progress: args.progress,
                due_date: args.due,
                start_date: args.start,
            };
            Ok(TaskResult::One(task_repo::create_task(conn, &args.project, &input)?))
        }

        TaskCommand::Get { id } => {
            let task = task_repo::get_task(conn, &id)?.ok_or(TgError::TaskNotFound(id))?;
            Ok(TaskResult::One(task))
        }

        TaskCommand::List { project } => {
            if !project_repo::project_exists(conn, &project)? {
                return Err(TgError::ProjectNotFound(project));
            }
            Ok(TaskResult::Many(task_repo::list_tasks_by_project(conn, &project)?))
        }

        TaskCommand::Set(args) => {
            let input = UpdateTaskInput {
                title: args.title,
                status: args.status,
                progress: args.progress,
                due_date: date_change(args.due, args.clear_due),
                start_date: date_change(args.start, args.clear_start),
            };
            Ok(TaskResult::One(task_repo::update_task(conn, &args.id, &input)?))
        }

        TaskCommand::Delete { id } => {
            if !task_repo::delete_task(conn, &id)? {
                return Err(TgError::TaskNotFound(id));
            }
            tracing::info!(task = %id, "task deleted");
            Ok(TaskResult::Deleted)
        }
    }
}
