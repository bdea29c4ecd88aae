//! End-to-end board scenarios against the in-process task service.
//!
//! Drives a [`Board`] the way a UI would: drags, assignments, filter
//! changes, and background polling, with the network held open or failed
//! on demand.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};

use taskboard::board::{Board, BoardSettings};
use taskboard::controls::DropEvent;
use taskboard::persist::{FILTERS_KEY, FilterStore, InMemoryFilterStore};
use taskboard::schedule::TokioScheduler;
use taskboard::service::memory::InMemoryTaskService;
use taskboard::service::{ServiceError, ServiceOp};
use taskboard::tasks::{MutationError, Origin};
use taskboard_proto::filters::{Selector, SortDirection, SortKey, TaskFiltersState};
use taskboard_proto::task::{
    AssigneeId, NewTask, Task, TaskId, TaskPatch, TaskPriority, TaskStatus,
};

type TestBoard = Board<InMemoryTaskService, InMemoryFilterStore>;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Creates a task with fixed timestamps; `minute` orders creation.
fn make_task(
    id: &str,
    title: &str,
    status: TaskStatus,
    priority: TaskPriority,
    minute: u32,
) -> Task {
    let ts = Utc.with_ymd_and_hms(2025, 10, 1, 9, minute, 0).unwrap();
    Task {
        id: TaskId::new(id),
        title: title.to_string(),
        description: None,
        status,
        priority,
        due_date: None,
        assignee_id: None,
        deal_id: None,
        created_at: ts,
        updated_at: ts,
    }
}

/// The three-task board: `todo`/high, `in_progress`/medium, `done`/urgent.
fn seed() -> Vec<Task> {
    let mut second = make_task(
        "task-2",
        "Send proposal",
        TaskStatus::InProgress,
        TaskPriority::Medium,
        1,
    );
    second.assignee_id = Some(AssigneeId::new("u-ada"));
    vec![
        make_task(
            "task-1",
            "Call the customer",
            TaskStatus::Todo,
            TaskPriority::High,
            0,
        ),
        second,
        make_task(
            "task-3",
            "Close the deal",
            TaskStatus::Done,
            TaskPriority::Urgent,
            2,
        ),
    ]
}

async fn loaded_board(tasks: Vec<Task>) -> (Arc<TestBoard>, Arc<InMemoryTaskService>) {
    let service = Arc::new(InMemoryTaskService::with_tasks(tasks));
    let board = Arc::new(Board::new(
        Arc::clone(&service),
        InMemoryFilterStore::new(),
        BoardSettings::default(),
    ));
    board.load().await.unwrap();
    (board, service)
}

fn column_ids(board: &TestBoard, status: TaskStatus) -> Vec<String> {
    board
        .columns()
        .column(status)
        .iter()
        .map(|task| task.id.to_string())
        .collect()
}

// ===========================================================================
// Drag then failed assign
// ===========================================================================

#[tokio::test]
async fn drag_then_failed_assign() {
    let (board, service) = loaded_board(seed()).await;
    let task1 = TaskId::new("task-1");
    let task2 = TaskId::new("task-2");
    assert_eq!(column_ids(&board, TaskStatus::Todo), vec!["task-1"]);

    // Drag task 1 to done while the server holds the request open.
    service.pause(ServiceOp::MoveTask);
    let drag = board.drag_controller();
    let pending = tokio::spawn(async move {
        drag.on_drop(DropEvent {
            task_id: TaskId::new("task-1"),
            source: TaskStatus::Todo,
            destination: TaskStatus::Done,
            index: 0,
        })
        .await
    });
    service.wait_parked(1).await;

    assert!(column_ids(&board, TaskStatus::Todo).is_empty());
    assert!(column_ids(&board, TaskStatus::Done).contains(&"task-1".to_string()));
    assert!(board.context().cache().entry(&task1).unwrap().origin.is_optimistic());

    service.resume(ServiceOp::MoveTask);
    let moved = pending.await.unwrap().unwrap().unwrap();
    assert_eq!(moved.status, TaskStatus::Done);

    let entry = board.context().cache().entry(&task1).unwrap();
    assert_eq!(entry.origin, Origin::Confirmed);
    assert_eq!(entry.task, moved);
    assert_eq!(column_ids(&board, TaskStatus::Done).len(), 2);

    // Assign task 2 to someone else; the server refuses.
    let before = board.context().cache().entry(&task2).unwrap();
    service.pause(ServiceOp::AssignTask);
    service.fail_next(
        ServiceOp::AssignTask,
        ServiceError::Transport("connection reset".to_string()),
    );
    let coordinator = Arc::clone(board.coordinator());
    let pending = tokio::spawn(async move {
        coordinator
            .assign(&TaskId::new("task-2"), Some(AssigneeId::new("u-bob")))
            .await
    });
    service.wait_parked(1).await;
    assert_eq!(
        board.context().cache().task(&task2).unwrap().assignee_id,
        Some(AssigneeId::new("u-bob"))
    );

    service.resume(ServiceOp::AssignTask);
    let err = pending.await.unwrap().unwrap_err();
    assert!(err.was_rolled_back());
    assert_eq!(board.context().cache().entry(&task2).unwrap(), before);
    let server_copy = service
        .tasks()
        .into_iter()
        .find(|task| task.id == task2)
        .unwrap();
    assert_eq!(server_copy.assignee_id, Some(AssigneeId::new("u-ada")));
}

#[tokio::test]
async fn rejected_move_restores_task_exactly() {
    let (board, service) = loaded_board(seed()).await;
    let task1 = TaskId::new("task-1");
    let before = board.context().cache().entry(&task1).unwrap();

    service.fail_next(
        ServiceOp::MoveTask,
        ServiceError::Status {
            status: 500,
            body: "boom".to_string(),
        },
    );
    let err = board
        .coordinator()
        .move_status(&task1, TaskStatus::InProgress, 0)
        .await
        .unwrap_err();

    match err {
        MutationError::RolledBack { task_id, .. } => assert_eq!(task_id, task1),
        other => panic!("expected a rollback, got {other:?}"),
    }
    assert_eq!(board.context().cache().entry(&task1).unwrap(), before);
    assert_eq!(column_ids(&board, TaskStatus::Todo), vec!["task-1"]);
    assert_eq!(board.context().in_flight_count(), 0);
}

#[tokio::test]
async fn failed_create_and_delete_leave_board_as_it_was() {
    let (board, service) = loaded_board(seed()).await;
    let ids_before = board.context().cache().ids();

    service.fail_next(ServiceOp::CreateTask, ServiceError::Timeout);
    let err = board
        .coordinator()
        .create(NewTask::titled("Draft contract"))
        .await
        .unwrap_err();
    assert!(err.was_rolled_back());
    assert_eq!(board.context().cache().ids(), ids_before);

    service.fail_next(ServiceOp::DeleteTask, ServiceError::Timeout);
    let err = board
        .coordinator()
        .delete(&TaskId::new("task-2"))
        .await
        .unwrap_err();
    assert!(err.was_rolled_back());
    assert_eq!(board.context().cache().ids(), ids_before);
}

#[tokio::test]
async fn create_update_delete_round_trip() {
    let (board, service) = loaded_board(seed()).await;

    let created = board
        .coordinator()
        .create(NewTask {
            status: TaskStatus::InProgress,
            ..NewTask::titled("Draft contract")
        })
        .await
        .unwrap();
    assert!(!created.id.is_temporary());
    assert!(column_ids(&board, TaskStatus::InProgress).contains(&created.id.to_string()));

    let patch = TaskPatch {
        priority: Some(TaskPriority::Urgent),
        due_date: Some(NaiveDate::from_ymd_opt(2025, 10, 20)),
        ..TaskPatch::default()
    };
    let updated = board.coordinator().update(&created.id, patch).await.unwrap();
    assert_eq!(updated.priority, TaskPriority::Urgent);
    assert_eq!(board.context().cache().task(&created.id).unwrap(), updated);

    board.coordinator().delete(&created.id).await.unwrap();
    assert!(!board.context().cache().contains(&created.id));
    assert!(service.tasks().iter().all(|task| task.id != created.id));
}

// ===========================================================================
// Columns and filters
// ===========================================================================

#[tokio::test]
async fn every_task_lands_in_exactly_one_column() {
    let (board, _service) = loaded_board(seed()).await;
    board
        .coordinator()
        .move_status(&TaskId::new("task-3"), TaskStatus::Todo, 0)
        .await
        .unwrap();

    let columns = board.columns();
    let cached = board.context().cache().ids();
    assert_eq!(columns.len(), cached.len());
    for id in cached {
        let hits = columns
            .iter()
            .filter(|(_, tasks)| tasks.iter().any(|task| task.id == id))
            .count();
        assert_eq!(hits, 1, "{id} should be in exactly one column");
    }
    for (status, tasks) in columns.iter() {
        assert!(tasks.iter().all(|task| task.status == status));
    }
}

#[tokio::test]
async fn filters_narrow_columns_and_persist_after_load() {
    let (board, _service) = loaded_board(seed()).await;
    board
        .coordinator()
        .move_status(&TaskId::new("task-3"), TaskStatus::Todo, 0)
        .await
        .unwrap();

    let filters = TaskFiltersState {
        priority: Selector::Only(TaskPriority::Urgent),
        sort_by: SortKey::Priority,
        sort_direction: SortDirection::Desc,
        ..TaskFiltersState::default()
    };
    board.set_filters(filters.clone()).unwrap();

    assert_eq!(column_ids(&board, TaskStatus::Todo), vec!["task-3"]);
    assert!(board.columns().in_progress.is_empty());
    assert_eq!(board.persistence().load(), filters);
    assert!(
        board
            .persistence()
            .store()
            .get(FILTERS_KEY)
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn subscribers_see_every_optimistic_write() {
    let (board, service) = loaded_board(seed()).await;
    let mut revisions = board.subscribe();
    revisions.borrow_and_update();

    service.pause(ServiceOp::MoveTask);
    let coordinator = Arc::clone(board.coordinator());
    let pending = tokio::spawn(async move {
        coordinator
            .move_status(&TaskId::new("task-1"), TaskStatus::InProgress, 0)
            .await
    });
    service.wait_parked(1).await;
    assert!(revisions.has_changed().unwrap());
    revisions.borrow_and_update();

    service.resume(ServiceOp::MoveTask);
    pending.await.unwrap().unwrap();
    assert!(revisions.has_changed().unwrap());
}

// ===========================================================================
// Polling lifecycle
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn polling_picks_up_remote_changes_until_teardown() {
    let (board, service) = loaded_board(seed()).await;
    board.start_polling(&TokioScheduler);
    assert!(board.context().is_polling());

    service
        .remote_edit(
            &TaskId::new("task-1"),
            &TaskPatch::status(TaskStatus::InProgress),
        )
        .unwrap();
    tokio::time::sleep(BoardSettings::default().poll_interval + Duration::from_secs(1)).await;
    assert_eq!(
        board
            .context()
            .cache()
            .task(&TaskId::new("task-1"))
            .unwrap()
            .status,
        TaskStatus::InProgress
    );

    board.teardown();
    assert!(!board.context().is_polling());
    assert!(service.remote_delete(&TaskId::new("task-3")));
    tokio::time::sleep(BoardSettings::default().poll_interval * 2).await;
    assert!(board.context().cache().contains(&TaskId::new("task-3")));
}

#[tokio::test(start_paused = true)]
async fn zero_poll_interval_still_polls() {
    let service = Arc::new(InMemoryTaskService::with_tasks(seed()));
    let board = Board::new(
        Arc::clone(&service),
        InMemoryFilterStore::new(),
        BoardSettings {
            poll_interval: Duration::ZERO,
            ..BoardSettings::default()
        },
    );
    board.load().await.unwrap();
    board.start_polling(&TokioScheduler);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(board.context().is_polling());
    assert!(service.calls(ServiceOp::ListTasks) > 1);
    board.teardown();
}
