use clap::Subcommand;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::commands::parse_project_id;
use crate::core::{DependencyService, ProjectProgress, ServiceSettings};
use crate::db::project_repo;
use crate::error::{Result, TgError};
use crate::id::ProjectId;
use crate::types::Project;

#[derive(Subcommand, Clone)]
pub enum ProjectCommand {
    /// Create a project
    Create {
        name: String,
    },
    /// List all projects
    List,
    Get {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,
    },
    /// Completed / blocked / ready counts
    Status {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    pub project: Project,
    #[serde(flatten)]
    pub progress: ProjectProgress,
}

pub enum ProjectResult {
    One(Project),
    Many(Vec<Project>),
    Status(ProjectStatus),
}

pub fn handle(conn: &Connection, settings: ServiceSettings, cmd: ProjectCommand) -> Result<ProjectResult> {
    match cmd {
        ProjectCommand::Create { name } => {
            if name.trim().is_empty() {
                return Err(TgError::EmptyTitle);
            }
            Ok(ProjectResult::One(project_repo::create_project(conn, name.trim())?))
        }
        ProjectCommand::List => Ok(ProjectResult::Many(project_repo::list_projects(conn)?)),
        ProjectCommand::Get { id } => Ok(ProjectResult::One(get_project(conn, &id)?)),
        ProjectCommand::Status { id } => {
            let project = get_project(conn, &id)?;
            let progress = DependencyService::with_settings(conn, settings).project_progress(&id)?;
            Ok(ProjectResult::Status(ProjectStatus { project, progress }))
        }
    }
}

fn get_project(conn: &Connection, id: &ProjectId) -> Result<Project> {
    project_repo::get_project(conn, id)?.ok_or_else(|| TgError::ProjectNotFound(id.clone()))
}
