//! Minimal task store standing in for the task-management collaborator.
//!
//! The dependency engine only reads from here (`get_task`, `get_tasks`,
//! `list_tasks_by_project`); the write functions exist so the CLI and tests
//! can drive status changes.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{format_date, now, parse_date, parse_timestamp};
use crate::error::{Result, TgError};
use crate::id::{ProjectId, TaskId};
use crate::types::{CreateTaskInput, Task, TaskStatus, UpdateTaskInput};

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        title: row.get("title")?,
        status: row.get("status")?,
        progress: row.get("progress")?,
        due_date: parse_date(row.get("due_date")?),
        start_date: parse_date(row.get("start_date")?),
        completed_at: parse_timestamp(row.get("completed_at")?),
        created_at: parse_timestamp(row.get("created_at")?).unwrap_or_else(now),
        updated_at: parse_timestamp(row.get("updated_at")?).unwrap_or_else(now),
    })
}

fn validate_fields(title: Option<&str>, progress: Option<u8>) -> Result<()> {
    if title.is_some_and(|t| t.trim().is_empty()) {
        return Err(TgError::EmptyTitle);
    }
    if let Some(progress) = progress {
        if progress > 100 {
            return Err(TgError::InvalidProgress(progress));
        }
    }
    Ok(())
}

pub fn create_task(conn: &Connection, project_id: &ProjectId, input: &CreateTaskInput) -> Result<Task> {
    validate_fields(Some(&input.title), input.progress)?;

    let id = TaskId::new();
    let now_str = now().to_rfc3339();
    let status = input.status.unwrap_or_default();
    let completed_at = status.is_completed().then(|| now_str.clone());

    conn.execute(
        r#"
        INSERT INTO tasks (id, project_id, title, status, progress, due_date, start_date,
                           completed_at, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
        "#,
        params![
            &id,
            project_id,
            input.title.trim(),
            status,
            input.progress.unwrap_or(0),
            format_date(input.due_date),
            format_date(input.start_date),
            completed_at,
            now_str,
        ],
    )?;

    get_task(conn, &id)?.ok_or(TgError::TaskNotFound(id))
}

/// Insert a full snapshot, keeping its id and timestamps (data import)
pub fn insert_task(conn: &Connection, task: &Task) -> Result<()> {
    validate_fields(Some(&task.title), Some(task.progress))?;
    conn.execute(
        r#"
        INSERT INTO tasks (id, project_id, title, status, progress, due_date, start_date,
                           completed_at, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            &task.id,
            &task.project_id,
            task.title,
            task.status,
            task.progress,
            format_date(task.due_date),
            format_date(task.start_date),
            task.completed_at.map(|at| at.to_rfc3339()),
            task.created_at.to_rfc3339(),
            task.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_task(conn: &Connection, id: &TaskId) -> Result<Option<Task>> {
    let task = conn
        .query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
        .optional()?;
    Ok(task)
}

/// Batch lookup. Ids with no row are simply absent from the map.
pub fn get_tasks<'a, I>(conn: &Connection, ids: I) -> Result<HashMap<TaskId, Task>>
where
    I: IntoIterator<Item = &'a TaskId>,
{
    let mut stmt = conn.prepare_cached("SELECT * FROM tasks WHERE id = ?1")?;
    let mut found = HashMap::new();
    for id in ids {
        if found.contains_key(id) {
            continue;
        }
        if let Some(task) = stmt.query_row(params![id], row_to_task).optional()? {
            found.insert(id.clone(), task);
        }
    }
    Ok(found)
}

pub fn list_tasks_by_project(conn: &Connection, project_id: &ProjectId) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM tasks WHERE project_id = ?1 ORDER BY created_at ASC, id ASC",
    )?;
    let tasks = stmt
        .query_map(params![project_id], row_to_task)?
        .collect::<rusqlite::Result<Vec<Task>>>()?;
    Ok(tasks)
}

pub fn update_task(conn: &Connection, id: &TaskId, input: &UpdateTaskInput) -> Result<Task> {
    validate_fields(input.title.as_deref(), input.progress)?;

    let current = get_task(conn, id)?.ok_or_else(|| TgError::TaskNotFound(id.clone()))?;
    let now_str = now().to_rfc3339();

    let mut updates = vec!["updated_at = ?1".to_string()];
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now_str.clone())];
    let mut param_idx = 2;

    if let Some(ref title) = input.title {
        updates.push(format!("title = ?{}", param_idx));
        params_vec.push(Box::new(title.trim().to_string()));
        param_idx += 1;
    }

    if let Some(status) = input.status {
        updates.push(format!("status = ?{}", param_idx));
        params_vec.push(Box::new(status));
        param_idx += 1;

        // completed_at tracks the latest transition into completed
        match (current.status.is_completed(), status.is_completed()) {
            (false, true) => {
                updates.push(format!("completed_at = ?{}", param_idx));
                params_vec.push(Box::new(now_str));
                param_idx += 1;
            }
            (true, false) => updates.push("completed_at = NULL".to_string()),
            _ => {}
        }
    }

    if let Some(progress) = input.progress {
        updates.push(format!("progress = ?{}", param_idx));
        params_vec.push(Box::new(progress));
        param_idx += 1;
    }

    if let Some(due) = input.due_date {
        updates.push(format!("due_date = ?{}", param_idx));
        params_vec.push(Box::new(format_date(due)));
        param_idx += 1;
    }

    if let Some(start) = input.start_date {
        updates.push(format!("start_date = ?{}", param_idx));
        params_vec.push(Box::new(format_date(start)));
        param_idx += 1;
    }

    params_vec.push(Box::new(id.clone()));

    let sql = format!(
        "UPDATE tasks SET {} WHERE id = ?{}",
        updates.join(", "),
        param_idx
    );

    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    conn.execute(&sql, params_refs.as_slice())?;

    get_task(conn, id)?.ok_or_else(|| TgError::TaskNotFound(id.clone()))
}

pub fn set_status(conn: &Connection, id: &TaskId, status: TaskStatus) -> Result<Task> {
    update_task(
        conn,
        id,
        &UpdateTaskInput {
            status: Some(status),
            ..Default::default()
        },
    )
}

/// Delete a task. Dependency edges touching it cascade via foreign keys.
pub fn delete_task(conn: &Connection, id: &TaskId) -> Result<bool> {
    let count = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn task_exists(conn: &Connection, id: &TaskId) -> Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
