//! Snapshot merge for polling reconciliation.
//!
//! Server wins for every task without local work in flight; tasks the
//! [`MergePolicy`] protects are left exactly as they are for this cycle:
//!
//! 1. Unknown id: insert as confirmed.
//! 2. Known, unprotected: replace with the server copy.
//! 3. Known, protected: skip; the in-flight mutation's own resolution is
//!    the only authority for that task.
//! 4. Cached but absent from the snapshot: remove unless protected.
//!
//! Merging the same snapshot twice leaves the cache as merging it once.

use std::collections::HashSet;

use taskboard_proto::task::{Task, TaskId};

use super::cache::{Origin, TaskCache};

/// Decides which tasks a snapshot may not touch.
pub trait MergePolicy {
    /// Returns `true` if the cached entry for `id` must be left alone.
    fn is_protected(&self, id: &TaskId) -> bool;

    /// Returns `true` if inserting the unknown server task `task` should
    /// wait for a later cycle.
    fn defers_insert(&self, _task: &Task) -> bool {
        false
    }
}

impl<F: Fn(&TaskId) -> bool> MergePolicy for F {
    fn is_protected(&self, id: &TaskId) -> bool {
        self(id)
    }
}

/// What a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Server tasks that were not cached.
    pub inserted: usize,
    /// Cached tasks overwritten with a different server copy.
    pub replaced: usize,
    /// Cached tasks already equal to the server copy.
    pub unchanged: usize,
    /// Cached tasks removed because the server no longer has them.
    pub removed: usize,
    /// Tasks left alone because of in-flight local work.
    pub skipped: usize,
}

impl MergeReport {
    /// Returns `true` if the merge wrote anything.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.inserted + self.replaced + self.removed > 0
    }
}

/// Merges a full server snapshot into the cache.
pub fn merge_snapshot<P: MergePolicy + ?Sized>(
    cache: &TaskCache,
    snapshot: &[Task],
    policy: &P,
) -> MergeReport {
    let mut report = MergeReport::default();
    let mut seen: HashSet<&TaskId> = HashSet::with_capacity(snapshot.len());

    for server_task in snapshot {
        if !seen.insert(&server_task.id) {
            continue;
        }
        if policy.is_protected(&server_task.id) {
            report.skipped += 1;
            continue;
        }
        match cache.entry(&server_task.id) {
            None if policy.defers_insert(server_task) => report.skipped += 1,
            None => {
                cache.upsert(server_task.clone(), Origin::Confirmed);
                report.inserted += 1;
            }
            Some(entry) if entry.task == *server_task && entry.origin == Origin::Confirmed => {
                report.unchanged += 1;
            }
            Some(_) => {
                cache.upsert(server_task.clone(), Origin::Confirmed);
                report.replaced += 1;
            }
        }
    }

    for id in cache.ids() {
        if seen.contains(&id) {
            continue;
        }
        if policy.is_protected(&id) {
            report.skipped += 1;
        } else if cache.remove(&id).is_some() {
            report.removed += 1;
        }
    }

    report
}
