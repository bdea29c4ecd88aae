//! In-memory task cache.
//!
//! Writes are synchronous and visible to the next read; there is no
//! batching. Every write that changes something bumps a revision published
//! on a [`tokio::sync::watch`] channel so renderers know to re-derive the
//! columns.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::watch;

use taskboard_proto::task::{Task, TaskId};

use super::MutationId;

/// Reconciliation marker of a cached task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Last known server-accepted state.
    Confirmed,
    /// Locally predicted state produced by the given mutation.
    Optimistic(MutationId),
}

impl Origin {
    /// Returns `true` for [`Origin::Optimistic`].
    #[must_use]
    pub const fn is_optimistic(&self) -> bool {
        matches!(self, Self::Optimistic(_))
    }
}

/// A cached task together with its reconciliation marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The task as the UI should show it.
    pub task: Task,
    /// Where the current value came from.
    pub origin: Origin,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<TaskId, CacheEntry>,
    /// Display order of ids. Same key set as `entries`.
    order: Vec<TaskId>,
}

impl CacheState {
    fn position(&self, id: &TaskId) -> Option<usize> {
        self.order.iter().position(|candidate| candidate == id)
    }

    fn remove(&mut self, id: &TaskId) -> Option<(usize, CacheEntry)> {
        let entry = self.entries.remove(id)?;
        let index = self.position(id).unwrap_or(self.order.len());
        if index < self.order.len() {
            self.order.remove(index);
        }
        Some((index, entry))
    }
}

/// Ordered collection of cached tasks keyed by id.
///
/// Invariant: no id ever has two live entries.
pub struct TaskCache {
    state: RwLock<CacheState>,
    revision: watch::Sender<u64>,
}

impl Default for TaskCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskCache {
    /// Creates an empty cache at revision 0.
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: RwLock::new(CacheState::default()),
            revision,
        }
    }

    /// All cached tasks in display order.
    #[must_use]
    pub fn get(&self) -> Vec<Task> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id))
            .map(|entry| entry.task.clone())
            .collect()
    }

    /// All cache entries, markers included, in display order.
    #[must_use]
    pub fn entries(&self) -> Vec<CacheEntry> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id))
            .cloned()
            .collect()
    }

    /// The entry for `id`, if cached.
    #[must_use]
    pub fn entry(&self, id: &TaskId) -> Option<CacheEntry> {
        self.state.read().entries.get(id).cloned()
    }

    /// The task for `id`, if cached.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.state.read().entries.get(id).map(|entry| entry.task.clone())
    }

    /// Returns `true` if `id` is cached.
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.state.read().entries.contains_key(id)
    }

    /// Ids of all cached tasks in display order.
    #[must_use]
    pub fn ids(&self) -> Vec<TaskId> {
        self.state.read().order.clone()
    }

    /// Number of cached tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current revision; bumped on every effective write.
    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Subscribes to revision changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Inserts or replaces the entry for `task.id`.
    ///
    /// New tasks are appended; existing ones keep their position. Writing an
    /// identical entry is a no-op and does not bump the revision.
    pub fn upsert(&self, task: Task, origin: Origin) {
        let changed = {
            let mut state = self.state.write();
            let entry = CacheEntry { task, origin };
            match state.entries.get_mut(&entry.task.id) {
                Some(existing) if *existing == entry => false,
                Some(existing) => {
                    *existing = entry;
                    true
                }
                None => {
                    state.order.push(entry.task.id.clone());
                    state.entries.insert(entry.task.id.clone(), entry);
                    true
                }
            }
        };
        if changed {
            self.bump();
        }
    }

    /// Inserts an entry at `index` (clamped to the end). Replaces any
    /// existing entry with the same id.
    pub fn insert_at(&self, index: usize, task: Task, origin: Origin) {
        {
            let mut state = self.state.write();
            state.remove(&task.id);
            let index = index.min(state.order.len());
            state.order.insert(index, task.id.clone());
            state.entries.insert(task.id.clone(), CacheEntry { task, origin });
        }
        self.bump();
    }

    /// Swaps the entry `old_id` for `task`, keeping its position.
    ///
    /// Used when a create resolves and the server id replaces the temporary
    /// one. If `task.id` is already cached (a poll saw the new task first),
    /// that entry is overwritten and `old_id` is dropped.
    pub fn replace(&self, old_id: &TaskId, task: Task, origin: Origin) {
        {
            let mut state = self.state.write();
            let entry = CacheEntry { task, origin };
            let new_id = entry.task.id.clone();
            if state.entries.contains_key(&new_id) && new_id != *old_id {
                state.remove(old_id);
                state.entries.insert(new_id, entry);
            } else if let Some(index) = state.position(old_id) {
                state.entries.remove(old_id);
                state.order[index] = new_id.clone();
                state.entries.insert(new_id, entry);
            } else {
                state.order.push(new_id.clone());
                state.entries.insert(new_id, entry);
            }
        }
        self.bump();
    }

    /// Removes `id`, returning its former position and entry.
    pub fn remove(&self, id: &TaskId) -> Option<(usize, CacheEntry)> {
        let removed = self.state.write().remove(id);
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// Marks the entry for `id` as server-confirmed without changing the task.
    ///
    /// For view layers that acknowledge an entry they already hold. The
    /// mutation path confirms through [`upsert`](Self::upsert), since the
    /// server's copy replaces the task there.
    ///
    /// Returns `false` if `id` is not cached.
    pub fn mark_confirmed(&self, id: &TaskId) -> bool {
        let changed = {
            let mut state = self.state.write();
            match state.entries.get_mut(id) {
                Some(entry) if entry.origin.is_optimistic() => {
                    entry.origin = Origin::Confirmed;
                    Some(true)
                }
                Some(_) => Some(false),
                None => None,
            }
        };
        match changed {
            Some(true) => {
                self.bump();
                true
            }
            Some(false) => true,
            None => false,
        }
    }

    /// Restores the entry for `id` to `previous` and marks it confirmed.
    ///
    /// Returns `false` if `id` is not cached; a rolled-back task that is no
    /// longer on the board stays gone.
    pub fn mark_rolled_back(&self, id: &TaskId, previous: Task) -> bool {
        {
            let mut state = self.state.write();
            let Some(entry) = state.entries.get_mut(id) else {
                return false;
            };
            entry.task = previous;
            entry.origin = Origin::Confirmed;
        }
        self.bump();
        true
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}
