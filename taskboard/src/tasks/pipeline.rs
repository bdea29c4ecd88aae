//! Filter/sort derivation of the three board columns.
//!
//! Pure functions over a cache snapshot and a [`TaskFiltersState`]; cheap
//! enough (`O(n log n)`) to rerun on every cache write and every filter
//! keystroke.

use std::cmp::Ordering;

use taskboard_proto::filters::{SortDirection, SortKey, TaskFiltersState};
use taskboard_proto::task::{Task, TaskStatus};

/// The rendered board: one filtered, sorted list per status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardColumns {
    /// `todo` column.
    pub todo: Vec<Task>,
    /// `in_progress` column.
    pub in_progress: Vec<Task>,
    /// `done` column.
    pub done: Vec<Task>,
}

impl BoardColumns {
    /// Tasks in the column for `status`.
    #[must_use]
    pub fn column(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::Todo => &self.todo,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Done => &self.done,
        }
    }

    fn column_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        match status {
            TaskStatus::Todo => &mut self.todo,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Done => &mut self.done,
        }
    }

    /// Total number of visible tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.done.len()
    }

    /// Returns `true` if no task is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Columns paired with their status, in board order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskStatus, &[Task])> {
        TaskStatus::ALL
            .into_iter()
            .map(move |status| (status, self.column(status)))
    }
}

/// Returns `true` if `task` passes every filter in `filters`.
///
/// A task without a due date fails any due-date bound. Bounds are inclusive.
#[must_use]
pub fn matches_filters(task: &Task, filters: &TaskFiltersState) -> bool {
    if !filters.assignee.matches_opt(task.assignee_id.as_ref())
        || !filters.status.matches(&task.status)
        || !filters.priority.matches(&task.priority)
    {
        return false;
    }
    if !filters.has_due_date_bounds() {
        return true;
    }
    let Some(due) = task.due_date else {
        return false;
    };
    filters.due_date_before.is_none_or(|before| due <= before)
        && filters.due_date_after.is_none_or(|after| due >= after)
}

/// Orders two tasks by `sort_by` in `direction`.
///
/// Missing due dates sort last in both directions. Ties break by
/// case-sensitive title comparison, which the direction does not flip.
#[must_use]
pub fn compare_tasks(a: &Task, b: &Task, sort_by: SortKey, direction: SortDirection) -> Ordering {
    let directed = |ordering: Ordering| match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    };
    let primary = match sort_by {
        SortKey::DueDate => match (a.due_date, b.due_date) {
            (Some(a_due), Some(b_due)) => directed(a_due.cmp(&b_due)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKey::Priority => directed(a.priority.rank().cmp(&b.priority.rank())),
        SortKey::CreatedAt => directed(a.created_at.cmp(&b.created_at)),
    };
    primary.then_with(|| a.title.cmp(&b.title))
}

/// Filters and sorts `tasks` into the three board columns.
#[must_use]
pub fn derive_columns(tasks: &[Task], filters: &TaskFiltersState) -> BoardColumns {
    let mut columns = BoardColumns::default();
    for task in tasks.iter().filter(|task| matches_filters(task, filters)) {
        columns.column_mut(task.status).push(task.clone());
    }
    for status in TaskStatus::ALL {
        columns
            .column_mut(status)
            .sort_by(|a, b| compare_tasks(a, b, filters.sort_by, filters.sort_direction));
    }
    columns
}
