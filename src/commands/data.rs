use clap::Subcommand;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::commands::parse_project_id;
use crate::core::{DependencyService, ServiceSettings};
use crate::db::{edge_repo, project_repo, task_repo};
use crate::error::{Result, TgError};
use crate::id::{ProjectId, TaskId};
use crate::types::{DependencyType, EdgeScope, NewDependency, Project, Task};

const EXPORT_VERSION: &str = "1.0.0";

#[derive(Subcommand, Clone)]
pub enum DataCommand {
    /// Export a project's tasks and dependencies to a JSON file
    Export {
        #[arg(long, value_parser = parse_project_id)]
        project: ProjectId,

        /// Output file path (default: taskgraph-export.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a project from a JSON export
    Import {
        /// Input file path
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDependency {
    pub task_id: TaskId,
    pub depends_on_task_id: TaskId,
    pub dependency_type: DependencyType,
    #[serde(default)]
    pub lag_days: i32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub version: String,
    pub exported_at: String,
    pub project: Project,
    pub tasks: Vec<Task>,
    pub dependencies: Vec<ExportDependency>,
}

/// Dependency from an import file that failed validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedDependency {
    pub task_id: TaskId,
    pub depends_on_task_id: TaskId,
    pub reason: String,
}

pub enum DataResult {
    Exported {
        path: String,
        tasks: usize,
        dependencies: usize,
    },
    Imported {
        project: ProjectId,
        tasks: usize,
        dependencies: usize,
        rejected: Vec<RejectedDependency>,
    },
}

pub fn handle(conn: &Connection, settings: ServiceSettings, cmd: DataCommand) -> Result<DataResult> {
    match cmd {
        DataCommand::Export { project, output } => export_data(conn, &project, output),
        DataCommand::Import { file } => import_data(conn, settings, &file),
    }
}

pub(crate) fn export_data(
    conn: &Connection,
    project_id: &ProjectId,
    output: Option<PathBuf>,
) -> Result<DataResult> {
    let output_path = output.unwrap_or_else(|| PathBuf::from("taskgraph-export.json"));

    let project = project_repo::get_project(conn, project_id)?
        .ok_or_else(|| TgError::ProjectNotFound(project_id.clone()))?;
    let tasks = task_repo::list_tasks_by_project(conn, project_id)?;
    let dependencies: Vec<ExportDependency> =
        edge_repo::list_edges(conn, &EdgeScope::Project(project_id.clone()))?
            .into_iter()
            .map(|edge| ExportDependency {
                task_id: edge.task_id,
                depends_on_task_id: edge.depends_on_task_id,
                dependency_type: edge.dependency_type,
                lag_days: edge.lag_days,
            })
            .collect();

    let export = ExportData {
        version: EXPORT_VERSION.to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        project,
        tasks,
        dependencies,
    };

    let json = serde_json::to_string_pretty(&export)?;
    fs::write(&output_path, json)?;

    Ok(DataResult::Exported {
        path: output_path.display().to_string(),
        tasks: export.tasks.len(),
        dependencies: export.dependencies.len(),
    })
}

/// Tasks are written atomically under a savepoint. Dependencies are then
/// replayed one by one through `add_dependency`, so each is validated
/// exactly like an interactive add; rejected ones are reported, not fatal.
pub(crate) fn import_data(
    conn: &Connection,
    settings: ServiceSettings,
    file: &Path,
) -> Result<DataResult> {
    let json = fs::read_to_string(file)?;
    let import: ExportData = serde_json::from_str(&json)?;

    conn.execute("SAVEPOINT import_data", [])?;

    let result = (|| -> Result<usize> {
        if !project_repo::project_exists(conn, &import.project.id)? {
            project_repo::create_project_with_id(conn, &import.project.id, &import.project.name)?;
        }

        let mut imported = 0;
        for task in &import.tasks {
            if task.project_id != import.project.id {
                tracing::warn!(task = %task.id, "skipping task from another project");
                continue;
            }
            if task_repo::task_exists(conn, &task.id)? {
                tracing::debug!(task = %task.id, "task already present, keeping stored copy");
                continue;
            }
            task_repo::insert_task(conn, task)?;
            imported += 1;
        }
        Ok(imported)
    })();

    let tasks = match result {
        Ok(count) => {
            conn.execute("RELEASE import_data", [])?;
            count
        }
        Err(e) => {
            let _ = conn.execute("ROLLBACK TO import_data", []);
            let _ = conn.execute("RELEASE import_data", []);
            return Err(e);
        }
    };

    let svc = DependencyService::with_settings(conn, settings);
    let mut dependencies = 0;
    let mut rejected = Vec::new();
    for dep in &import.dependencies {
        let candidate = NewDependency::new(dep.task_id.clone(), dep.depends_on_task_id.clone())
            .with_type(dep.dependency_type)
            .with_lag(dep.lag_days);
        match svc.add_dependency(&candidate) {
            Ok(_) => dependencies += 1,
            Err(err) if err.is_validation() || matches!(err, TgError::TaskNotFound(_)) => {
                tracing::warn!(
                    task = %dep.task_id,
                    depends_on = %dep.depends_on_task_id,
                    "rejected imported dependency: {err}"
                );
                rejected.push(RejectedDependency {
                    task_id: dep.task_id.clone(),
                    depends_on_task_id: dep.depends_on_task_id.clone(),
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    Ok(DataResult::Imported {
        project: import.project.id,
        tasks,
        dependencies,
        rejected,
    })
}
