use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::id::{EdgeId, ProjectId, TaskId};

/// Workflow status owned by the task-management side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Review,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Completed => "completed",
        }
    }

    /// Display label used by the UI read model
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In progress",
            TaskStatus::Review => "In review",
            TaskStatus::Completed => "Completed",
        }
    }

    /// Work has begun (in_progress, review or completed)
    pub fn has_started(self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }

    pub fn is_completed(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!(
                "unknown status '{other}' (expected pending, in_progress, review, completed)"
            )),
        }
    }
}

/// Temporal relationship between a predecessor and its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    #[default]
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyType {
    pub const ALL: [DependencyType; 4] = [
        DependencyType::FinishToStart,
        DependencyType::StartToStart,
        DependencyType::FinishToFinish,
        DependencyType::StartToFinish,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "finish_to_start",
            DependencyType::StartToStart => "start_to_start",
            DependencyType::FinishToFinish => "finish_to_finish",
            DependencyType::StartToFinish => "start_to_finish",
        }
    }

    /// Conventional two-letter abbreviation (FS, SS, FF, SF)
    pub fn abbrev(self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "FS",
            DependencyType::StartToStart => "SS",
            DependencyType::FinishToFinish => "FF",
            DependencyType::StartToFinish => "SF",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "finish_to_start" | "fs" => Ok(DependencyType::FinishToStart),
            "start_to_start" | "ss" => Ok(DependencyType::StartToStart),
            "finish_to_finish" | "ff" => Ok(DependencyType::FinishToFinish),
            "start_to_finish" | "sf" => Ok(DependencyType::StartToFinish),
            other => Err(format!(
                "unknown dependency type '{other}' (expected finish_to_start, start_to_start, finish_to_finish, start_to_finish)"
            )),
        }
    }
}

macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

text_enum_sql!(TaskStatus);
text_enum_sql!(DependencyType);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of a task as supplied by the task collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub status: TaskStatus,
    /// Percent complete, 0..=100
    pub progress: u8,
    pub due_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Date a predecessor's finish is measured from: actual completion when
    /// known, else the planned due date.
    pub fn completion_reference_date(&self) -> Option<NaiveDate> {
        self.completed_at
            .map(|at| at.date_naive())
            .or(self.due_date)
    }
}

/// Persisted precedence edge: `task_id` depends on `depends_on_task_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub id: EdgeId,
    pub project_id: ProjectId,
    /// Successor
    pub task_id: TaskId,
    /// Predecessor
    pub depends_on_task_id: TaskId,
    pub dependency_type: DependencyType,
    pub lag_days: i32,
    pub created_at: DateTime<Utc>,
}

/// Candidate edge as requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDependency {
    pub task_id: TaskId,
    pub depends_on_task_id: TaskId,
    pub dependency_type: DependencyType,
    pub lag_days: i32,
}

impl NewDependency {
    pub fn new(task_id: TaskId, depends_on_task_id: TaskId) -> Self {
        Self {
            task_id,
            depends_on_task_id,
            dependency_type: DependencyType::default(),
            lag_days: 0,
        }
    }

    pub fn with_type(mut self, dependency_type: DependencyType) -> Self {
        self.dependency_type = dependency_type;
        self
    }

    pub fn with_lag(mut self, lag_days: i32) -> Self {
        self.lag_days = lag_days;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeScope {
    /// Every edge of a project
    Project(ProjectId),
    /// Predecessor edges of one task
    Task(TaskId),
}

#[derive(Debug, Clone, Default)]
pub struct CreateTaskInput {
    pub title: String,
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub due_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    /// `Some(None)` clears the stored date
    pub due_date: Option<Option<NaiveDate>>,
    pub start_date: Option<Option<NaiveDate>>,
}
