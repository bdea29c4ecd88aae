//! Local task state for the board.
//!
//! The [`TaskCache`] is the single source of truth the UI renders from.
//! Only the [`MutationCoordinator`] (optimistic writes) and the
//! [`PollingReconciler`] (server snapshots) write to it; both go through
//! the shared [`ReconciliationContext`]. Columns are derived from the cache
//! by the pure functions in [`pipeline`].

pub mod cache;
pub mod context;
pub mod coordinator;
pub mod merge;
pub mod pipeline;
pub mod reconciler;

pub use cache::{CacheEntry, Origin, TaskCache};
pub use context::ReconciliationContext;
pub use coordinator::{MutationCoordinator, MutationError};
pub use merge::{MergePolicy, MergeReport, merge_snapshot};
pub use pipeline::{BoardColumns, compare_tasks, derive_columns, matches_filters};
pub use reconciler::{DEFAULT_POLL_INTERVAL, PollingReconciler};

use taskboard_proto::task::{TaskId, TitleError};
use thiserror::Error;
use uuid::Uuid;

/// Identifies one optimistic mutation from request to resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationId(Uuid);

impl MutationId {
    /// Creates a new time-ordered mutation identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The user intent behind a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// New task.
    Create,
    /// Partial field edit.
    Update,
    /// Drag-drop to another column.
    Move,
    /// Assignee change.
    Assign,
    /// Removal.
    Delete,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Move => write!(f, "move"),
            Self::Assign => write!(f, "assign"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Reasons a mutation is refused before anything is applied locally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// Title failed validation.
    #[error(transparent)]
    InvalidTitle(#[from] TitleError),
    /// Task with the given ID is not on the board.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// Task exists only locally; its create call has not resolved yet.
    #[error("task {0} is still being created")]
    CreatePending(TaskId),
    /// The patch does not touch any attribute.
    #[error("update for task {0} changes nothing")]
    EmptyPatch(TaskId),
}
