pub mod edge_repo;
pub mod project_repo;
pub mod schema;
pub mod task_repo;

use chrono::{DateTime, NaiveDate, Utc};

pub use schema::open_db;

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Dates are stored as `YYYY-MM-DD`; unparseable values read back as unset.
pub(crate) fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

pub(crate) fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}
