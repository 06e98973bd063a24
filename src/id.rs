//! Prefixed ULID newtypes for type-safe entity IDs.
//!
//! - `ProjectId`: `prj_01ARZ3NDEKTSV4RRFFQ69G5FAV`
//! - `TaskId`: `task_01ARZ3NDEKTSV4RRFFQ69G5FAV`
//! - `EdgeId`: `dep_01ARZ3NDEKTSV4RRFFQ69G5FAV`

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdParseError {
    #[error("Invalid ULID format: {0}")]
    InvalidUlid(String),
    #[error("Missing prefix: expected '{expected}', got '{actual}'")]
    MissingPrefix {
        expected: &'static str,
        actual: String,
    },
}

fn validate_ulid(s: &str) -> Result<(), IdParseError> {
    ulid::Ulid::from_string(s)
        .map(|_| ())
        .map_err(|_| IdParseError::InvalidUlid(s.to_string()))
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a fresh id
            pub fn new() -> Self {
                Self(format!("{}{}", Self::PREFIX, ulid::Ulid::new()))
            }

            pub fn ulid_part(&self) -> &str {
                self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let ulid = s
                    .strip_prefix(Self::PREFIX)
                    .ok_or_else(|| IdParseError::MissingPrefix {
                        expected: Self::PREFIX,
                        actual: s.to_string(),
                    })?;
                validate_ulid(ulid)?;
                Ok(Self(s.to_string()))
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                // Stored with prefix
                Ok(ToSqlOutput::from(self.0.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                Ok(Self(value.as_str()?.to_string()))
            }
        }
    };
}

prefixed_id!(
    /// Project (tenant-level grouping of tasks). Edges never cross projects.
    ProjectId,
    "prj_"
);

prefixed_id!(TaskId, "task_");

prefixed_id!(
    /// Dependency edge id
    EdgeId,
    "dep_"
);
