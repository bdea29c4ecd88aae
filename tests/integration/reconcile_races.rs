//! Interleavings of optimistic mutations and snapshot polls.
//!
//! Each test parks one side of the race in the in-process service so the
//! other side runs in between, then checks the cache never shows a stale
//! server value over newer local intent.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use taskboard::service::memory::InMemoryTaskService;
use taskboard::service::{ServiceError, ServiceOp};
use taskboard::tasks::{MutationCoordinator, Origin, PollingReconciler, ReconciliationContext};
use taskboard_proto::task::{
    AssigneeId, NewTask, Task, TaskId, TaskPatch, TaskPriority, TaskStatus,
};

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

struct Fixture {
    ctx: Arc<ReconciliationContext>,
    service: Arc<InMemoryTaskService>,
    coordinator: Arc<MutationCoordinator<InMemoryTaskService>>,
    reconciler: Arc<PollingReconciler<InMemoryTaskService>>,
}

fn make_task(id: &str, status: TaskStatus) -> Task {
    let ts = Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0).unwrap();
    Task {
        id: TaskId::new(id),
        title: format!("Task {id}"),
        description: None,
        status,
        priority: TaskPriority::Medium,
        due_date: None,
        assignee_id: None,
        deal_id: None,
        created_at: ts,
        updated_at: ts,
    }
}

async fn loaded(tasks: Vec<Task>) -> Fixture {
    let ctx = Arc::new(ReconciliationContext::new());
    let service = Arc::new(InMemoryTaskService::with_tasks(tasks));
    let coordinator = Arc::new(MutationCoordinator::new(
        Arc::clone(&ctx),
        Arc::clone(&service),
    ));
    let reconciler = Arc::new(PollingReconciler::new(
        Arc::clone(&ctx),
        Arc::clone(&service),
    ));
    reconciler.reconcile_once().await.unwrap();
    ctx.mark_loaded();
    Fixture {
        ctx,
        service,
        coordinator,
        reconciler,
    }
}

fn status_of(fx: &Fixture, id: &str) -> TaskStatus {
    fx.ctx.cache().task(&TaskId::new(id)).unwrap().status
}

// ===========================================================================
// Poll while a mutation is in flight
// ===========================================================================

#[tokio::test]
async fn poll_during_move_does_not_revert() {
    let fx = loaded(vec![make_task("a", TaskStatus::Todo)]).await;

    fx.service.pause(ServiceOp::MoveTask);
    let coordinator = Arc::clone(&fx.coordinator);
    let pending = tokio::spawn(async move {
        coordinator
            .move_status(&TaskId::new("a"), TaskStatus::InProgress, 0)
            .await
    });
    fx.service.wait_parked(1).await;

    // The server has not applied the move yet; its snapshot still says todo.
    let report = fx.reconciler.reconcile_once().await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(status_of(&fx, "a"), TaskStatus::InProgress);

    fx.service.resume(ServiceOp::MoveTask);
    pending.await.unwrap().unwrap();
    assert_eq!(status_of(&fx, "a"), TaskStatus::InProgress);
    assert_eq!(
        fx.ctx.cache().entry(&TaskId::new("a")).unwrap().origin,
        Origin::Confirmed
    );
}

#[tokio::test]
async fn poll_fetched_before_move_settled_is_fenced() {
    let fx = loaded(vec![make_task("a", TaskStatus::Todo)]).await;

    // The poll reads the server before the move, but lands after it.
    fx.service.pause(ServiceOp::ListTasks);
    let reconciler = Arc::clone(&fx.reconciler);
    let poll = tokio::spawn(async move { reconciler.reconcile_once().await });
    fx.service.wait_parked(1).await;

    fx.coordinator
        .move_status(&TaskId::new("a"), TaskStatus::Done, 0)
        .await
        .unwrap();
    assert_eq!(status_of(&fx, "a"), TaskStatus::Done);

    fx.service.resume(ServiceOp::ListTasks);
    let report = poll.await.unwrap().unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(status_of(&fx, "a"), TaskStatus::Done);

    // The next poll is fresh and agrees.
    let report = fx.reconciler.reconcile_once().await.unwrap();
    assert!(!report.changed());
    assert_eq!(fx.ctx.in_flight_count(), 0);
}

#[tokio::test]
async fn poll_during_delete_does_not_resurrect() {
    let fx = loaded(vec![
        make_task("a", TaskStatus::Todo),
        make_task("b", TaskStatus::Todo),
    ])
    .await;

    fx.service.pause(ServiceOp::DeleteTask);
    let coordinator = Arc::clone(&fx.coordinator);
    let pending = tokio::spawn(async move { coordinator.delete(&TaskId::new("a")).await });
    fx.service.wait_parked(1).await;
    assert!(!fx.ctx.cache().contains(&TaskId::new("a")));

    fx.reconciler.reconcile_once().await.unwrap();
    assert!(!fx.ctx.cache().contains(&TaskId::new("a")));

    fx.service.resume(ServiceOp::DeleteTask);
    pending.await.unwrap().unwrap();
    fx.reconciler.reconcile_once().await.unwrap();
    assert_eq!(fx.ctx.cache().ids(), vec![TaskId::new("b")]);
}

#[tokio::test]
async fn remote_edits_to_other_fields_wait_for_the_mutation() {
    let fx = loaded(vec![make_task("a", TaskStatus::Todo)]).await;

    fx.service.pause(ServiceOp::MoveTask);
    let coordinator = Arc::clone(&fx.coordinator);
    let pending = tokio::spawn(async move {
        coordinator
            .move_status(&TaskId::new("a"), TaskStatus::Done, 0)
            .await
    });
    fx.service.wait_parked(1).await;

    let remote = TaskPatch {
        title: Some("Renamed elsewhere".to_string()),
        ..TaskPatch::default()
    };
    fx.service.remote_edit(&TaskId::new("a"), &remote).unwrap();
    fx.reconciler.reconcile_once().await.unwrap();
    assert_eq!(status_of(&fx, "a"), TaskStatus::Done);

    fx.service.resume(ServiceOp::MoveTask);
    let confirmed = pending.await.unwrap().unwrap();
    assert_eq!(confirmed.title, "Renamed elsewhere");
    let cached = fx.ctx.cache().task(&TaskId::new("a")).unwrap();
    assert_eq!(cached.title, "Renamed elsewhere");
    assert_eq!(cached.status, TaskStatus::Done);
}

// ===========================================================================
// Overlapping mutations
// ===========================================================================

#[tokio::test]
async fn stacked_moves_end_on_the_last_intent() {
    let fx = loaded(vec![make_task("a", TaskStatus::Todo)]).await;

    fx.service.pause(ServiceOp::MoveTask);
    let first = tokio::spawn({
        let coordinator = Arc::clone(&fx.coordinator);
        async move {
            coordinator
                .move_status(&TaskId::new("a"), TaskStatus::InProgress, 0)
                .await
        }
    });
    fx.service.wait_parked(1).await;
    let second = tokio::spawn({
        let coordinator = Arc::clone(&fx.coordinator);
        async move {
            coordinator
                .move_status(&TaskId::new("a"), TaskStatus::Done, 0)
                .await
        }
    });
    fx.service.wait_parked(2).await;
    assert_eq!(status_of(&fx, "a"), TaskStatus::Done);

    fx.reconciler.reconcile_once().await.unwrap();
    assert_eq!(status_of(&fx, "a"), TaskStatus::Done);

    fx.service.resume(ServiceOp::MoveTask);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(fx.ctx.in_flight_count(), 0);
    let server_status = fx.service.tasks()[0].status;
    assert_eq!(status_of(&fx, "a"), server_status);
}

#[tokio::test]
async fn failed_move_under_pending_assign_keeps_the_assign() {
    let fx = loaded(vec![make_task("a", TaskStatus::Todo)]).await;

    fx.service.pause(ServiceOp::MoveTask);
    fx.service.fail_next(ServiceOp::MoveTask, ServiceError::Timeout);
    let moving = tokio::spawn({
        let coordinator = Arc::clone(&fx.coordinator);
        async move {
            coordinator
                .move_status(&TaskId::new("a"), TaskStatus::Done, 0)
                .await
        }
    });
    fx.service.wait_parked(1).await;

    fx.service.pause(ServiceOp::AssignTask);
    let assigning = tokio::spawn({
        let coordinator = Arc::clone(&fx.coordinator);
        async move {
            coordinator
                .assign(&TaskId::new("a"), Some(AssigneeId::new("u-1")))
                .await
        }
    });
    fx.service.wait_parked(2).await;

    fx.service.resume(ServiceOp::MoveTask);
    assert!(moving.await.unwrap().unwrap_err().was_rolled_back());
    let cached = fx.ctx.cache().task(&TaskId::new("a")).unwrap();
    assert_eq!(cached.status, TaskStatus::Todo);
    assert_eq!(cached.assignee_id, Some(AssigneeId::new("u-1")));

    fx.service.resume(ServiceOp::AssignTask);
    assigning.await.unwrap().unwrap();
    let entry = fx.ctx.cache().entry(&TaskId::new("a")).unwrap();
    assert_eq!(entry.origin, Origin::Confirmed);
    assert_eq!(entry.task.status, TaskStatus::Todo);
}

// ===========================================================================
// Creates
// ===========================================================================

#[tokio::test]
async fn snapshot_racing_a_create_does_not_duplicate() {
    let fx = loaded(vec![]).await;

    fx.service.pause(ServiceOp::CreateTask);
    let creating = tokio::spawn({
        let coordinator = Arc::clone(&fx.coordinator);
        async move { coordinator.create(NewTask::titled("Quarterly review")).await }
    });
    fx.service.wait_parked(1).await;
    assert_eq!(fx.ctx.cache().len(), 1);

    // A snapshot already containing the server's copy of the new task.
    let mut echoed = make_task("task-1", TaskStatus::Todo);
    echoed.title = "Quarterly review".to_string();
    let fence = fx.ctx.sequence();
    fx.reconciler.apply_snapshot(&[echoed], fence);
    assert_eq!(fx.ctx.cache().len(), 1);

    fx.service.resume(ServiceOp::CreateTask);
    let created = creating.await.unwrap().unwrap();
    assert_eq!(created.id, TaskId::new("task-1"));
    assert_eq!(fx.ctx.cache().ids(), vec![created.id]);
}

#[tokio::test]
async fn identical_snapshots_are_idempotent() {
    let fx = loaded(vec![
        make_task("a", TaskStatus::Todo),
        make_task("b", TaskStatus::Done),
    ])
    .await;
    fx.service.remote_insert(make_task("c", TaskStatus::InProgress));
    let snapshot = fx.service.tasks();

    let fence = fx.ctx.sequence();
    fx.reconciler.apply_snapshot(&snapshot, fence);
    let once = fx.ctx.cache().entries();
    let revision = fx.ctx.cache().revision();

    let report = fx.reconciler.apply_snapshot(&snapshot, fence);
    assert!(!report.changed());
    assert_eq!(fx.ctx.cache().entries(), once);
    assert_eq!(fx.ctx.cache().revision(), revision);
}
