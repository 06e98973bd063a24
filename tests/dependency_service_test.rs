//! Tests for DependencyService through the public library API.
//!
//! Tests cover:
//! - Validation order and error kinds (self, cross-project, duplicate, cycle)
//! - Blocking scenarios per dependency type
//! - Idempotent removal
//! - View consistency after task status changes
//! - Dangling predecessor policy
//! - Acyclicity over random edge sequences

use chrono::NaiveDate;
use proptest::prelude::*;
use rusqlite::Connection;
use taskgraph::core::{DanglingPolicy, DependencyService, EvaluationOptions, ServiceSettings};
use taskgraph::db::{edge_repo, project_repo, schema, task_repo};
use taskgraph::error::TgError;
use taskgraph::id::{EdgeId, ProjectId, TaskId};
use taskgraph::types::{
    CreateTaskInput, DependencyType, EdgeScope, NewDependency, TaskStatus, UpdateTaskInput,
};

fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    schema::init_schema(&conn).unwrap();
    conn
}

fn project(conn: &Connection) -> ProjectId {
    project_repo::create_project(conn, "Website relaunch").unwrap().id
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

fn dep(task: &TaskId, on: &TaskId, kind: DependencyType) -> NewDependency {
    NewDependency::new(task.clone(), on.clone()).with_type(kind)
}

/// Blocking flag from the view, checked against the bare status query.
fn blocking(service: &DependencyService, task: &TaskId) -> bool {
    let view = service.get_dependency_view(task).unwrap();
    let status = service.blocking_status(task).unwrap();
    assert_eq!(view.is_blocking, status.is_blocking);
    view.is_blocking
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ==================== Validation ====================

#[test]
fn test_self_reference_rejected() {
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");

    for kind in DependencyType::ALL {
        let err = service.add_dependency(&dep(&a, &a, kind)).unwrap_err();
        assert!(matches!(err, TgError::SelfReference(ref id) if *id == a));
    }
    assert!(service
        .list_edges(&EdgeScope::Project(p))
        .unwrap()
        .is_empty());
}

#[test]
fn test_self_reference_rejected_for_unknown_task() {
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let ghost = TaskId::new();
    let err = service
        .add_dependency(&NewDependency::new(ghost.clone(), ghost))
        .unwrap_err();
    assert!(matches!(err, TgError::SelfReference(_)));
}

#[test]
fn test_cross_project_rejected() {
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p1 = project(&conn);
    let p2 = project_repo::create_project(&conn, "Other").unwrap().id;
    let a = task(&conn, &p1, "A");
    let b = task(&conn, &p2, "B");

    let err = service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToStart))
        .unwrap_err();
    match err {
        TgError::CrossProject {
            task_project,
            depends_on_project,
            ..
        } => {
            assert_eq!(task_project, p1);
            assert_eq!(depends_on_project, p2);
        }
        other => panic!("expected CrossProject, got {other:?}"),
    }
}

#[test]
fn test_duplicate_rejected_regardless_of_type_and_lag() {
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");

    let first = service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToStart))
        .unwrap();
    let err = service
        .add_dependency(&dep(&a, &b, DependencyType::StartToFinish).with_lag(4))
        .unwrap_err();
    match err {
        TgError::DuplicateEdge { existing, .. } => assert_eq!(existing, first.id),
        other => panic!("expected DuplicateEdge, got {other:?}"),
    }
}

#[test]
fn test_missing_endpoint_is_task_not_found() {
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let ghost = TaskId::new();

    let err = service
        .add_dependency(&dep(&a, &ghost, DependencyType::FinishToStart))
        .unwrap_err();
    assert!(matches!(err, TgError::TaskNotFound(ref id) if *id == ghost));
}

#[test]
fn test_direct_cycle_rejected() {
    // Scenario 5
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");

    service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToStart))
        .unwrap();
    let err = service
        .add_dependency(&dep(&b, &a, DependencyType::StartToStart))
        .unwrap_err();
    assert!(matches!(err, TgError::CycleDetected { .. }));
}

#[test]
fn test_three_cycle_rejected_with_path() {
    // Scenario 6
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");
    let c = task(&conn, &p, "C");

    service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToStart))
        .unwrap();
    service
        .add_dependency(&dep(&b, &c, DependencyType::FinishToStart))
        .unwrap();
    let err = service
        .add_dependency(&dep(&c, &a, DependencyType::FinishToStart))
        .unwrap_err();
    match err {
        TgError::CycleDetected { path, .. } => {
            assert_eq!(path, vec![c.clone(), a.clone(), b.clone(), c.clone()]);
        }
        other => panic!("expected CycleDetected, got {other:?}"),
    }
    assert_eq!(
        service.list_edges(&EdgeScope::Project(p)).unwrap().len(),
        2
    );
}

// ==================== Removal ====================

#[test]
fn test_remove_twice_is_idempotent() {
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");
    let edge = service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToStart))
        .unwrap();

    assert!(service.remove_dependency(&edge.id).unwrap().removed);
    assert!(!service.remove_dependency(&edge.id).unwrap().removed);
    assert!(!service.remove_dependency(&EdgeId::new()).unwrap().removed);
}

#[test]
fn test_removal_reopens_reverse_edge() {
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");
    let edge = service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToStart))
        .unwrap();

    service.remove_dependency(&edge.id).unwrap();
    assert!(service
        .add_dependency(&dep(&b, &a, DependencyType::FinishToStart))
        .is_ok());
}

// ==================== Blocking scenarios ====================

#[test]
fn test_finish_to_start_blocks_until_completed() {
    // Scenarios 1 and 2
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");
    service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToStart))
        .unwrap();

    task_repo::set_status(&conn, &b, TaskStatus::InProgress).unwrap();
    assert!(blocking(&service, &a));

    task_repo::set_status(&conn, &b, TaskStatus::Completed).unwrap();
    assert!(!blocking(&service, &a));
}

#[test]
fn test_start_to_start_unblocks_once_started() {
    // Scenario 3
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");
    service
        .add_dependency(&dep(&a, &b, DependencyType::StartToStart))
        .unwrap();

    assert!(blocking(&service, &a));
    task_repo::set_status(&conn, &b, TaskStatus::InProgress).unwrap();
    assert!(!blocking(&service, &a));
}

#[test]
fn test_any_unsatisfied_edge_blocks() {
    // Scenario 4
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");
    let c = task(&conn, &p, "C");
    service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToStart))
        .unwrap();
    service
        .add_dependency(&dep(&a, &c, DependencyType::FinishToStart))
        .unwrap();
    task_repo::set_status(&conn, &b, TaskStatus::Completed).unwrap();

    let view = service.get_dependency_view(&a).unwrap();
    assert!(view.is_blocking);
    let satisfied: Vec<bool> = view.predecessors.iter().map(|p| p.satisfied).collect();
    assert_eq!(satisfied.iter().filter(|s| **s).count(), 1);
    assert_eq!(satisfied.len(), 2);

    let unsatisfied = view.predecessors.iter().find(|p| !p.satisfied).unwrap();
    assert_eq!(unsatisfied.task_id, c);
    assert_eq!(unsatisfied.reason.as_deref(), Some("C is not yet completed"));
}

#[test]
fn test_blocking_status_agrees_with_view() {
    // Scenarios 1 to 4, checked edge by edge
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");
    let c = task(&conn, &p, "C");
    let d = task(&conn, &p, "D");
    service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToStart))
        .unwrap();
    service
        .add_dependency(&dep(&a, &c, DependencyType::FinishToStart))
        .unwrap();
    service
        .add_dependency(&dep(&d, &b, DependencyType::StartToStart))
        .unwrap();

    let agree = |task: &TaskId| {
        let view = service.get_dependency_view(task).unwrap();
        let status = service.blocking_status(task).unwrap();
        assert_eq!(status.task_id, *task);
        assert_eq!(status.is_blocking, view.is_blocking);
        assert_eq!(status.details.len(), view.predecessors.len());
        for pred in &view.predecessors {
            let detail = status
                .details
                .iter()
                .find(|e| e.edge_id == pred.edge_id)
                .unwrap();
            assert_eq!(detail.depends_on_task_id, pred.task_id);
            assert_eq!(detail.satisfied, pred.satisfied);
            assert_eq!(detail.reason, pred.reason);
        }
        status
    };

    // B not started: A blocked on both, D blocked on SS
    assert!(agree(&a).is_blocking);
    assert!(agree(&d).is_blocking);

    // B in progress: FS still blocks A, SS releases D
    task_repo::set_status(&conn, &b, TaskStatus::InProgress).unwrap();
    assert!(agree(&a).is_blocking);
    assert!(!agree(&d).is_blocking);

    // B completed, C pending: one unsatisfied edge keeps A blocked
    task_repo::set_status(&conn, &b, TaskStatus::Completed).unwrap();
    let status = agree(&a);
    assert!(status.is_blocking);
    let unsatisfied: Vec<_> = status.unsatisfied().collect();
    assert_eq!(unsatisfied.len(), 1);
    assert_eq!(unsatisfied[0].depends_on_task_id, c);

    task_repo::set_status(&conn, &c, TaskStatus::Completed).unwrap();
    assert!(!agree(&a).is_blocking);
}

#[test]
fn test_finish_to_start_lag_pushes_earliest_start() {
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");
    task_repo::update_task(
        &conn,
        &b,
        &UpdateTaskInput {
            due_date: Some(Some(date(2025, 3, 10))),
            ..Default::default()
        },
    )
    .unwrap();
    task_repo::update_task(
        &conn,
        &a,
        &UpdateTaskInput {
            start_date: Some(Some(date(2025, 3, 11))),
            ..Default::default()
        },
    )
    .unwrap();
    service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToStart).with_lag(3))
        .unwrap();

    let view = service.get_dependency_view(&a).unwrap();
    assert_eq!(view.predecessors[0].due_date, Some(date(2025, 3, 10)));

    // Completion stamps today, so the reference date becomes today's date
    task_repo::set_status(&conn, &b, TaskStatus::Completed).unwrap();
    let completed = task_repo::get_task(&conn, &b).unwrap().unwrap();
    let reference = completed.completion_reference_date().unwrap();
    let view = service.get_dependency_view(&a).unwrap();
    assert_eq!(
        view.earliest_start,
        reference.checked_add_signed(chrono::Duration::days(3))
    );
    // Planned start is in the past relative to the completion reference
    assert!(view.is_blocking);

    // Without a planned start only the status decides
    task_repo::update_task(
        &conn,
        &a,
        &UpdateTaskInput {
            start_date: Some(None),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(!blocking(&service, &a));
}

// ==================== View consistency ====================

#[test]
fn test_view_tracks_status_without_invalidation() {
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");
    service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToFinish))
        .unwrap();

    for (status, expect_blocking) in [
        (TaskStatus::Review, true),
        (TaskStatus::Completed, false),
        (TaskStatus::InProgress, true),
    ] {
        task_repo::set_status(&conn, &b, status).unwrap();
        let view = service.get_dependency_view(&a).unwrap();
        assert_eq!(view.is_blocking, expect_blocking, "{status}");
        assert_eq!(view.predecessors[0].status, Some(status));
    }
}

#[test]
fn test_view_after_edge_removal() {
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");
    let edge = service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToStart))
        .unwrap();
    assert!(blocking(&service, &a));

    service.remove_dependency(&edge.id).unwrap();
    let view = service.get_dependency_view(&a).unwrap();
    assert!(!view.is_blocking);
    assert!(view.predecessors.is_empty());
}

// ==================== Dangling predecessors ====================

fn dangling_setup(conn: &Connection) -> (TaskId, TaskId) {
    let p = project(conn);
    let a = task(conn, &p, "A");
    let b = task(conn, &p, "B");
    // Store the edge without the foreign keys enforced, then drop the predecessor
    conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    edge_repo::insert_edge(conn, &p, &a, &b, DependencyType::FinishToStart, 0).unwrap();
    task_repo::delete_task(conn, &b).unwrap();
    (a, b)
}

#[test]
fn test_dangling_predecessor_is_satisfied_by_default() {
    let conn = setup_db();
    let (a, b) = dangling_setup(&conn);
    let service = DependencyService::new(&conn);

    let view = service.get_dependency_view(&a).unwrap();
    assert!(!view.is_blocking);
    assert_eq!(view.predecessors.len(), 1);
    assert!(view.predecessors[0].missing);
    assert_eq!(view.predecessors[0].task_id, b);
}

#[test]
fn test_dangling_predecessor_blocks_under_strict_policy() {
    let conn = setup_db();
    let (a, _) = dangling_setup(&conn);
    let service = DependencyService::with_settings(
        &conn,
        ServiceSettings {
            evaluation: EvaluationOptions {
                dangling: DanglingPolicy::Blocking,
            },
            ..ServiceSettings::default()
        },
    );
    assert!(blocking(&service, &a));
}

#[test]
fn test_task_delete_cascades_edges() {
    let conn = setup_db();
    let service = DependencyService::new(&conn);
    let p = project(&conn);
    let a = task(&conn, &p, "A");
    let b = task(&conn, &p, "B");
    service
        .add_dependency(&dep(&a, &b, DependencyType::FinishToStart))
        .unwrap();

    task_repo::delete_task(&conn, &b).unwrap();
    assert!(service
        .list_edges(&EdgeScope::Task(a.clone()))
        .unwrap()
        .is_empty());
    assert!(!blocking(&service, &a));
}

// ==================== Acyclicity property ====================

fn reachable(edges: &[(usize, usize)], from: usize, to: usize) -> bool {
    let mut stack = vec![from];
    let mut seen = vec![false; 8];
    while let Some(n) = stack.pop() {
        if n == to {
            return true;
        }
        if std::mem::replace(&mut seen[n], true) {
            continue;
        }
        stack.extend(edges.iter().filter(|(t, _)| *t == n).map(|(_, on)| *on));
    }
    false
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn service_never_accepts_a_cycle(
        attempts in proptest::collection::vec((0usize..6, 0usize..6), 1..25)
    ) {
        let conn = setup_db();
        let service = DependencyService::new(&conn);
        let p = project(&conn);
        let ids: Vec<TaskId> = (0..6).map(|i| task(&conn, &p, &format!("T{i}"))).collect();
        let mut accepted: Vec<(usize, usize)> = Vec::new();

        for (t, on) in attempts {
            let result = service.add_dependency(&dep(&ids[t], &ids[on], DependencyType::FinishToStart));
            match result {
                Ok(_) => {
                    prop_assert!(t != on);
                    prop_assert!(!reachable(&accepted, on, t));
                    accepted.push((t, on));
                }
                Err(TgError::SelfReference(_)) => prop_assert_eq!(t, on),
                Err(TgError::DuplicateEdge { .. }) => prop_assert!(accepted.contains(&(t, on))),
                Err(TgError::CycleDetected { .. }) => prop_assert!(reachable(&accepted, on, t)),
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }

        let stored = service.list_edges(&EdgeScope::Project(p)).unwrap();
        prop_assert_eq!(stored.len(), accepted.len());
    }
}
