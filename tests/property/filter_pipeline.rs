//! Property tests for column derivation and snapshot merging.
//!
//! Uses proptest to verify:
//! 1. With no status restriction every task lands in exactly one column,
//!    the one matching its status.
//! 2. Merging the same snapshot twice leaves the cache as merging it once.
//! 3. Flipping the sort direction flips every primary-key comparison, while
//!    undated tasks stay last and title tie-breaks stay put.

#![allow(clippy::unwrap_used)]

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use taskboard::tasks::{Origin, TaskCache, compare_tasks, derive_columns, merge_snapshot};
use taskboard_proto::filters::{Selector, SortDirection, SortKey, TaskFiltersState};
use taskboard_proto::task::{AssigneeId, Task, TaskId, TaskPriority, TaskStatus};

// --- Strategies ---

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Todo),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Done),
    ]
}

fn arb_priority() -> impl Strategy<Value = TaskPriority> {
    prop_oneof![
        Just(TaskPriority::Low),
        Just(TaskPriority::Medium),
        Just(TaskPriority::High),
        Just(TaskPriority::Urgent),
    ]
}

fn arb_due_date() -> impl Strategy<Value = Option<NaiveDate>> {
    prop::option::of((0u64..120).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap() + chrono::Days::new(offset)
    }))
}

fn arb_created_at() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..100_000).prop_map(|secs| {
        Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    })
}

fn arb_assignee() -> impl Strategy<Value = Option<AssigneeId>> {
    prop::option::of(prop_oneof![Just("u-ada"), Just("u-bob")].prop_map(AssigneeId::new))
}

/// Strategy for a task whose id is filled in later.
fn arb_task() -> impl Strategy<Value = Task> {
    (
        "[a-zA-Z ]{1,12}",
        arb_status(),
        arb_priority(),
        arb_due_date(),
        arb_assignee(),
        arb_created_at(),
    )
        .prop_map(|(title, status, priority, due_date, assignee_id, created_at)| Task {
            id: TaskId::new(""),
            title,
            description: None,
            status,
            priority,
            due_date,
            assignee_id,
            deal_id: None,
            created_at,
            updated_at: created_at,
        })
}

/// Tasks with distinct ids drawn from a small pool, so two boards overlap.
fn arb_board() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::btree_map(0u8..24, arb_task(), 0..16).prop_map(|tasks: BTreeMap<u8, Task>| {
        tasks
            .into_iter()
            .map(|(n, mut task)| {
                task.id = TaskId::new(format!("t-{n}"));
                task
            })
            .collect()
    })
}

fn arb_sort_key() -> impl Strategy<Value = SortKey> {
    prop_oneof![
        Just(SortKey::DueDate),
        Just(SortKey::Priority),
        Just(SortKey::CreatedAt),
    ]
}

fn arb_direction() -> impl Strategy<Value = SortDirection> {
    prop_oneof![Just(SortDirection::Asc), Just(SortDirection::Desc)]
}

/// Filters that never restrict by status.
fn arb_unrestricted_filters() -> impl Strategy<Value = TaskFiltersState> {
    (arb_sort_key(), arb_direction()).prop_map(|(sort_by, sort_direction)| TaskFiltersState {
        status: Selector::All,
        sort_by,
        sort_direction,
        ..TaskFiltersState::default()
    })
}

// --- Property tests ---

proptest! {
    #[test]
    fn every_task_lands_in_its_own_column(
        tasks in arb_board(),
        filters in arb_unrestricted_filters(),
    ) {
        let columns = derive_columns(&tasks, &filters);
        prop_assert_eq!(columns.len(), tasks.len());
        for task in &tasks {
            let hits: Vec<TaskStatus> = columns
                .iter()
                .filter(|(_, column)| column.iter().any(|t| t.id == task.id))
                .map(|(status, _)| status)
                .collect();
            prop_assert_eq!(hits, vec![task.status]);
        }
    }

    #[test]
    fn columns_are_sorted_by_the_active_key(
        tasks in arb_board(),
        filters in arb_unrestricted_filters(),
    ) {
        let columns = derive_columns(&tasks, &filters);
        for (_, column) in columns.iter() {
            for pair in column.windows(2) {
                prop_assert_ne!(
                    compare_tasks(&pair[0], &pair[1], filters.sort_by, filters.sort_direction),
                    Ordering::Greater
                );
            }
        }
    }

    #[test]
    fn merging_a_snapshot_twice_equals_merging_once(
        cached in arb_board(),
        snapshot in arb_board(),
    ) {
        let cache = TaskCache::new();
        for task in cached {
            cache.upsert(task, Origin::Confirmed);
        }
        let nothing_protected = |_: &TaskId| false;

        merge_snapshot(&cache, &snapshot, &nothing_protected);
        let once = cache.entries();
        let report = merge_snapshot(&cache, &snapshot, &nothing_protected);

        prop_assert!(!report.changed());
        prop_assert_eq!(cache.entries(), once);
        prop_assert_eq!(cache.len(), snapshot.len());
    }

    #[test]
    fn flipping_direction_flips_primary_order(
        a in arb_task(),
        b in arb_task(),
        sort_by in arb_sort_key(),
    ) {
        let asc = compare_tasks(&a, &b, sort_by, SortDirection::Asc);
        let desc = compare_tasks(&a, &b, sort_by, SortDirection::Desc);

        let primary_tied = match sort_by {
            SortKey::Priority => a.priority == b.priority,
            SortKey::CreatedAt => a.created_at == b.created_at,
            SortKey::DueDate => a.due_date == b.due_date,
        };
        let one_undated = sort_by == SortKey::DueDate
            && a.due_date.is_some() != b.due_date.is_some();

        if primary_tied || one_undated {
            // Title tie-breaks and undated-last ignore the direction.
            prop_assert_eq!(asc, desc);
        } else {
            prop_assert_eq!(asc, desc.reverse());
        }
    }

    #[test]
    fn undated_tasks_sort_last_in_both_directions(
        dated in arb_task(),
        undated in arb_task(),
        direction in arb_direction(),
    ) {
        let mut dated = dated;
        let mut undated = undated;
        dated.due_date.get_or_insert(NaiveDate::from_ymd_opt(2025, 10, 10).unwrap());
        undated.due_date = None;

        prop_assert_eq!(
            compare_tasks(&dated, &undated, SortKey::DueDate, direction),
            Ordering::Less
        );
    }
}
