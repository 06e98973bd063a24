use thiserror::Error;

use crate::id::{EdgeId, ProjectId, TaskId};

#[derive(Error, Debug)]
pub enum TgError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Dependency not found: {0}")]
    EdgeNotFound(EdgeId),

    #[error("A task cannot depend on itself: {0}")]
    SelfReference(TaskId),

    #[error(
        "Cannot link tasks from different projects: {task_id} ({task_project}) -> {depends_on_task_id} ({depends_on_project})"
    )]
    CrossProject {
        task_id: TaskId,
        task_project: ProjectId,
        depends_on_task_id: TaskId,
        depends_on_project: ProjectId,
    },

    #[error("{task_id} already depends on {depends_on_task_id} ({existing})")]
    DuplicateEdge {
        task_id: TaskId,
        depends_on_task_id: TaskId,
        existing: EdgeId,
    },

    /// Path runs along "depends on" hops and starts and ends at the successor
    #[error("{message}")]
    CycleDetected { message: String, path: Vec<TaskId> },

    /// Write lock could not be taken after retrying the whole validation
    #[error("Concurrent dependency changes kept conflicting after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error("Invalid progress: {0} (must be 0-100)")]
    InvalidProgress(u8),

    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TgError {
    /// SQLite lock contention (another writer holds the database)
    pub fn is_busy(&self) -> bool {
        match self {
            TgError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Rejections the caller can fix by changing the request
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TgError::SelfReference(_)
                | TgError::CrossProject { .. }
                | TgError::DuplicateEdge { .. }
                | TgError::CycleDetected { .. }
                | TgError::InvalidProgress(_)
                | TgError::EmptyTitle
        )
    }
}

pub type Result<T> = std::result::Result<T, TgError>;
