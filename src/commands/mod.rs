pub mod data;
pub mod dep;
pub mod project;
pub mod task;

pub use data::{DataCommand, DataResult};
pub use dep::{DepCommand, DepResult};
pub use project::{ProjectCommand, ProjectResult};
pub use task::{TaskCommand, TaskResult};

use chrono::NaiveDate;

use crate::id::{EdgeId, ProjectId, TaskId};
use crate::types::{DependencyType, TaskStatus};

/// Parse TaskId from CLI string (requires prefix)
pub(crate) fn parse_task_id(s: &str) -> std::result::Result<TaskId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

pub(crate) fn parse_project_id(s: &str) -> std::result::Result<ProjectId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

pub(crate) fn parse_edge_id(s: &str) -> std::result::Result<EdgeId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

pub(crate) fn parse_status(s: &str) -> std::result::Result<TaskStatus, String> {
    s.parse().map_err(|e| format!("{e}"))
}

pub(crate) fn parse_dependency_type(s: &str) -> std::result::Result<DependencyType, String> {
    s.parse().map_err(|e| format!("{e}"))
}

/// `YYYY-MM-DD`
pub(crate) fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{s}' (expected YYYY-MM-DD): {e}"))
}
