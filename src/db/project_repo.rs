use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{now, parse_timestamp};
use crate::error::{Result, TgError};
use crate::id::ProjectId;
use crate::types::Project;

fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: parse_timestamp(row.get("created_at")?).unwrap_or_else(now),
    })
}

pub fn create_project(conn: &Connection, name: &str) -> Result<Project> {
    create_project_with_id(conn, &ProjectId::new(), name)
}

/// Insert with a caller-chosen id (used by data import)
pub fn create_project_with_id(conn: &Connection, id: &ProjectId, name: &str) -> Result<Project> {
    conn.execute(
        "INSERT INTO projects (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![id, name, now().to_rfc3339()],
    )?;
    get_project(conn, id)?.ok_or_else(|| TgError::ProjectNotFound(id.clone()))
}

pub fn get_project(conn: &Connection, id: &ProjectId) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT * FROM projects WHERE id = ?1",
            params![id],
            row_to_project,
        )
        .optional()?;
    Ok(project)
}

pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare("SELECT * FROM projects ORDER BY created_at ASC, id ASC")?;
    let projects = stmt
        .query_map([], row_to_project)?
        .collect::<rusqlite::Result<Vec<Project>>>()?;
    Ok(projects)
}

pub fn project_exists(conn: &Connection, id: &ProjectId) -> Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM projects WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
