use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{now, parse_timestamp};
use crate::error::Result;
use crate::id::{EdgeId, ProjectId, TaskId};
use crate::types::{DependencyEdge, DependencyType, EdgeScope};

fn row_to_edge(row: &Row) -> rusqlite::Result<DependencyEdge> {
    Ok(DependencyEdge {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        task_id: row.get("task_id")?,
        depends_on_task_id: row.get("depends_on_task_id")?,
        dependency_type: row.get("dependency_type")?,
        lag_days: row.get("lag_days")?,
        created_at: parse_timestamp(row.get("created_at")?).unwrap_or_else(now),
    })
}

/// Persist an already-validated edge.
pub fn insert_edge(
    conn: &Connection,
    project_id: &ProjectId,
    task_id: &TaskId,
    depends_on_task_id: &TaskId,
    dependency_type: DependencyType,
    lag_days: i32,
) -> Result<EdgeId> {
    let id = EdgeId::new();
    conn.execute(
        r#"
        INSERT INTO task_dependencies
            (id, project_id, task_id, depends_on_task_id, dependency_type, lag_days, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            &id,
            project_id,
            task_id,
            depends_on_task_id,
            dependency_type,
            lag_days,
            now().to_rfc3339(),
        ],
    )?;
    Ok(id)
}

/// Returns whether a row was deleted
pub fn delete_edge(conn: &Connection, id: &EdgeId) -> Result<bool> {
    let count = conn.execute("DELETE FROM task_dependencies WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn get_edge(conn: &Connection, id: &EdgeId) -> Result<Option<DependencyEdge>> {
    let edge = conn
        .query_row(
            "SELECT * FROM task_dependencies WHERE id = ?1",
            params![id],
            row_to_edge,
        )
        .optional()?;
    Ok(edge)
}

/// Edge for the ordered pair, if one exists
pub fn find_edge(
    conn: &Connection,
    task_id: &TaskId,
    depends_on_task_id: &TaskId,
) -> Result<Option<DependencyEdge>> {
    let edge = conn
        .query_row(
            "SELECT * FROM task_dependencies WHERE task_id = ?1 AND depends_on_task_id = ?2",
            params![task_id, depends_on_task_id],
            row_to_edge,
        )
        .optional()?;
    Ok(edge)
}

pub fn list_edges(conn: &Connection, scope: &EdgeScope) -> Result<Vec<DependencyEdge>> {
    let (sql, key): (&str, &dyn rusqlite::ToSql) = match scope {
        EdgeScope::Project(project_id) => (
            "SELECT * FROM task_dependencies WHERE project_id = ?1 ORDER BY created_at ASC, id ASC",
            project_id,
        ),
        EdgeScope::Task(task_id) => (
            "SELECT * FROM task_dependencies WHERE task_id = ?1 ORDER BY created_at ASC, id ASC",
            task_id,
        ),
    };
    let mut stmt = conn.prepare(sql)?;
    let edges = stmt
        .query_map(params![key], row_to_edge)?
        .collect::<rusqlite::Result<Vec<DependencyEdge>>>()?;
    Ok(edges)
}

/// Edges whose predecessor is `task_id` (the tasks it blocks)
pub fn list_successor_edges(conn: &Connection, task_id: &TaskId) -> Result<Vec<DependencyEdge>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM task_dependencies WHERE depends_on_task_id = ?1 ORDER BY created_at ASC, id ASC",
    )?;
    let edges = stmt
        .query_map(params![task_id], row_to_edge)?
        .collect::<rusqlite::Result<Vec<DependencyEdge>>>()?;
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{project_repo, schema, task_repo};
    use crate::types::CreateTaskInput;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        schema::init_schema(&conn).unwrap();
        conn
    }

    fn task(conn: &Connection, project: &ProjectId, title: &str) -> TaskId {
        task_repo::create_task(
            conn,
            project,
            &CreateTaskInput {
                title: title.to_string(),
                ..Default::default()
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn insert_and_list_by_scope() {
        let conn = setup_db();
        let project = project_repo::create_project(&conn, "P").unwrap().id;
        let a = task(&conn, &project, "A");
        let b = task(&conn, &project, "B");
        let c = task(&conn, &project, "C");

        let ab = insert_edge(&conn, &project, &a, &b, DependencyType::FinishToStart, 2).unwrap();
        insert_edge(&conn, &project, &b, &c, DependencyType::StartToStart, 0).unwrap();

        assert_eq!(list_edges(&conn, &EdgeScope::Project(project.clone())).unwrap().len(), 2);

        let of_a = list_edges(&conn, &EdgeScope::Task(a.clone())).unwrap();
        assert_eq!(of_a.len(), 1);
        assert_eq!(of_a[0].id, ab);
        assert_eq!(of_a[0].lag_days, 2);
        assert_eq!(of_a[0].dependency_type, DependencyType::FinishToStart);

        let blocks = list_successor_edges(&conn, &b).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].task_id, a);
    }

    #[test]
    fn storage_rejects_duplicate_pair() {
        let conn = setup_db();
        let project = project_repo::create_project(&conn, "P").unwrap().id;
        let a = task(&conn, &project, "A");
        let b = task(&conn, &project, "B");

        insert_edge(&conn, &project, &a, &b, DependencyType::FinishToStart, 0).unwrap();
        let dup = insert_edge(&conn, &project, &a, &b, DependencyType::FinishToFinish, 3);
        assert!(dup.is_err());
    }

    #[test]
    fn storage_rejects_self_loop() {
        let conn = setup_db();
        let project = project_repo::create_project(&conn, "P").unwrap().id;
        let a = task(&conn, &project, "A");
        assert!(insert_edge(&conn, &project, &a, &a, DependencyType::FinishToStart, 0).is_err());
    }

    #[test]
    fn deleting_task_cascades_edges() {
        let conn = setup_db();
        let project = project_repo::create_project(&conn, "P").unwrap().id;
        let a = task(&conn, &project, "A");
        let b = task(&conn, &project, "B");
        let edge = insert_edge(&conn, &project, &a, &b, DependencyType::FinishToStart, 0).unwrap();

        task_repo::delete_task(&conn, &b).unwrap();
        assert!(get_edge(&conn, &edge).unwrap().is_none());
    }

    #[test]
    fn delete_edge_twice() {
        let conn = setup_db();
        let project = project_repo::create_project(&conn, "P").unwrap().id;
        let a = task(&conn, &project, "A");
        let b = task(&conn, &project, "B");
        let edge = insert_edge(&conn, &project, &a, &b, DependencyType::FinishToStart, 0).unwrap();

        assert!(delete_edge(&conn, &edge).unwrap());
        assert!(!delete_edge(&conn, &edge).unwrap());
        assert!(find_edge(&conn, &a, &b).unwrap().is_none());
    }
}
