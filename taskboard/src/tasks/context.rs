//! Shared reconciliation state.
//!
//! [`ReconciliationContext`] owns everything the coordinator and the
//! reconciler must agree on: the cache, the per-task queue of in-flight
//! mutations, the local write sequence used to fence stale poll results,
//! the "initial load complete" flag and the poll subscription.
//!
//! Writers take the in-flight lock for the whole read-modify-write of a
//! cache entry, so an optimistic apply, a confirm, a rollback and a
//! snapshot merge never interleave.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};

use taskboard_proto::task::{Task, TaskField, TaskId, TaskPatch};

use crate::schedule::Subscription;

use super::cache::TaskCache;
use super::merge::MergePolicy;
use super::{MutationId, MutationKind};

/// What a pending mutation does to its task, kept for replay.
#[derive(Debug, Clone)]
pub(crate) enum Intent {
    /// Task was added locally under a temporary id.
    Create,
    /// Fields were patched.
    Patch(TaskPatch),
    /// Task was removed from the given display position.
    Delete {
        /// Former position in the cache order.
        index: usize,
    },
}

/// A mutation between `optimistic-applied` and `confirmed`/`rolled-back`.
#[derive(Debug, Clone)]
pub(crate) struct PendingMutation {
    pub id: MutationId,
    pub kind: MutationKind,
    /// Task state right before this mutation applied; for creates, the
    /// optimistic draft.
    pub snapshot: Option<Task>,
    pub intent: Intent,
}

impl PendingMutation {
    /// Attributes a patch touched. Creates and deletes report none.
    pub fn fields(&self) -> Vec<TaskField> {
        match &self.intent {
            Intent::Patch(patch) => patch.fields(),
            Intent::Create | Intent::Delete { .. } => Vec::new(),
        }
    }

    pub const fn is_delete(&self) -> bool {
        matches!(self.intent, Intent::Delete { .. })
    }

    /// Moves this mutation's rollback point onto `source` for `fields`.
    pub fn rebase(&mut self, source: &Task, fields: &[TaskField]) {
        if let Some(snapshot) = &mut self.snapshot {
            snapshot.restore_fields(source, fields);
        }
    }
}

/// Per-task queues of in-flight mutations, in issue order.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    pending: HashMap<TaskId, Vec<PendingMutation>>,
    /// Sequence number of the last local completion per task.
    completed_at: HashMap<TaskId, u64>,
    sequence: u64,
}

impl InFlight {
    pub fn push(&mut self, task_id: &TaskId, mutation: PendingMutation) {
        self.sequence += 1;
        self.pending
            .entry(task_id.clone())
            .or_default()
            .push(mutation);
    }

    /// Removes a mutation, returning its index in the task's queue.
    pub fn take(
        &mut self,
        task_id: &TaskId,
        mutation_id: MutationId,
    ) -> Option<(usize, PendingMutation)> {
        let queue = self.pending.get_mut(task_id)?;
        let index = queue.iter().position(|m| m.id == mutation_id)?;
        let mutation = queue.remove(index);
        if queue.is_empty() {
            self.pending.remove(task_id);
        }
        Some((index, mutation))
    }

    /// Rebases every mutation issued after position `index` onto `source`.
    pub fn rebase_after(
        &mut self,
        task_id: &TaskId,
        index: usize,
        source: &Task,
        fields: &[TaskField],
    ) {
        if let Some(queue) = self.pending.get_mut(task_id) {
            for later in queue.iter_mut().skip(index) {
                later.rebase(source, fields);
            }
        }
    }

    /// Patches still pending for `task_id`, in issue order.
    pub fn pending_patches(&self, task_id: &TaskId) -> Vec<TaskPatch> {
        self.pending
            .get(task_id)
            .map(|queue| {
                queue
                    .iter()
                    .filter_map(|m| match &m.intent {
                        Intent::Patch(patch) => Some(patch.clone()),
                        Intent::Create | Intent::Delete { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_pending_delete(&self, task_id: &TaskId) -> bool {
        self.pending
            .get(task_id)
            .is_some_and(|queue| queue.iter().any(PendingMutation::is_delete))
    }

    /// Most recently issued mutation still pending for `task_id`.
    pub fn latest(&self, task_id: &TaskId) -> Option<MutationId> {
        self.pending.get(task_id)?.last().map(|m| m.id)
    }

    pub fn is_pending(&self, task_id: &TaskId) -> bool {
        self.pending.contains_key(task_id)
    }

    /// Titles of creates that have not resolved yet.
    pub fn pending_create_titles(&self) -> Vec<String> {
        self.pending
            .values()
            .flatten()
            .filter(|m| matches!(m.intent, Intent::Create))
            .filter_map(|m| m.snapshot.as_ref().map(|t| t.title.clone()))
            .collect()
    }

    /// Records that a mutation on `task_id` resolved.
    pub fn record_completion(&mut self, task_id: &TaskId) {
        self.sequence += 1;
        self.completed_at.insert(task_id.clone(), self.sequence);
    }

    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Forgets completions a snapshot fetched after `fence` already reflects.
    pub fn prune(&mut self, fence: u64) {
        self.completed_at.retain(|_, seq| *seq > fence);
    }

    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Merge policy for a snapshot whose fetch started at `fence`.
    pub fn policy(&self, fence: u64) -> FencedPolicy<'_> {
        FencedPolicy {
            in_flight: self,
            fence,
            pending_titles: self.pending_create_titles(),
        }
    }
}

/// Protects tasks that are mid-mutation or were written locally after the
/// snapshot's fetch started.
pub(crate) struct FencedPolicy<'a> {
    in_flight: &'a InFlight,
    fence: u64,
    pending_titles: Vec<String>,
}

impl MergePolicy for FencedPolicy<'_> {
    fn is_protected(&self, id: &TaskId) -> bool {
        self.in_flight.is_pending(id)
            || self
                .in_flight
                .completed_at
                .get(id)
                .is_some_and(|seq| *seq > self.fence)
    }

    fn defers_insert(&self, task: &Task) -> bool {
        self.pending_titles.iter().any(|title| *title == task.title)
    }
}

/// Explicit owner of the board's reconciliation state.
///
/// Created once per board view and passed to the coordinator and the
/// reconciler; [`teardown`](Self::teardown) stops polling.
pub struct ReconciliationContext {
    cache: TaskCache,
    in_flight: Mutex<InFlight>,
    loaded: AtomicBool,
    poll: Mutex<Option<Subscription>>,
}

impl Default for ReconciliationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationContext {
    /// Creates a context with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: TaskCache::new(),
            in_flight: Mutex::new(InFlight::default()),
            loaded: AtomicBool::new(false),
            poll: Mutex::new(None),
        }
    }

    /// The task cache.
    #[must_use]
    pub const fn cache(&self) -> &TaskCache {
        &self.cache
    }

    pub(crate) fn in_flight(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight.lock()
    }

    /// Returns `true` if `task_id` has a mutation in flight.
    #[must_use]
    pub fn is_in_flight(&self, task_id: &TaskId) -> bool {
        self.in_flight.lock().is_pending(task_id)
    }

    /// Number of mutations in flight across all tasks.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Local write sequence; increases on every optimistic apply and resolution.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.in_flight.lock().sequence()
    }

    /// Returns `true` once the first full load succeeded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Records that the first full load succeeded.
    pub fn mark_loaded(&self) {
        self.loaded.store(true, Ordering::Release);
    }

    /// Stores the poll subscription, disposing any previous one.
    pub fn attach_poll(&self, subscription: Subscription) {
        if let Some(mut previous) = self.poll.lock().replace(subscription) {
            previous.dispose();
        }
    }

    /// Returns `true` while a poll subscription is attached and running.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poll.lock().as_ref().is_some_and(Subscription::is_active)
    }

    /// Stops polling. In-flight mutations still resolve normally.
    pub fn teardown(&self) {
        if let Some(mut poll) = self.poll.lock().take() {
            poll.dispose();
            tracing::debug!("poll subscription disposed");
        }
    }
}
