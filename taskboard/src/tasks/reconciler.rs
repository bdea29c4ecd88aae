//! Periodic snapshot polling.
//!
//! Each cycle records the context's write sequence, fetches the full board
//! and merges it with [`merge_snapshot`]. Tasks with a mutation in flight, or
//! with a local completion newer than the recorded sequence, are left alone;
//! the snapshot may predate that completion.

use std::sync::Arc;
use std::time::Duration;

use taskboard_proto::task::{Task, TaskId};

use crate::schedule::{Scheduler, Subscription};
use crate::service::{ServiceError, TaskService};

use super::cache::Origin;
use super::context::ReconciliationContext;
use super::merge::{MergePolicy, MergeReport, merge_snapshot};

/// Poll interval the board uses unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(45);

/// Merges server snapshots into the cache.
pub struct PollingReconciler<S> {
    ctx: Arc<ReconciliationContext>,
    service: Arc<S>,
    interval: Duration,
    /// Serializes cycles so two snapshots never merge out of order.
    cycle: tokio::sync::Mutex<()>,
}

impl<S: TaskService + 'static> PollingReconciler<S> {
    /// Creates a reconciler polling every [`DEFAULT_POLL_INTERVAL`].
    #[must_use]
    pub fn new(ctx: Arc<ReconciliationContext>, service: Arc<S>) -> Self {
        Self {
            ctx,
            service,
            interval: DEFAULT_POLL_INTERVAL,
            cycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Overrides the poll interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The poll interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Fetches the board once and merges it.
    ///
    /// # Errors
    ///
    /// Returns the service error if the fetch failed; the cache is untouched.
    pub async fn reconcile_once(&self) -> Result<MergeReport, ServiceError> {
        let _cycle = self.cycle.lock().await;
        let fence = self.ctx.sequence();
        let snapshot = self.service.list_tasks().await?;
        Ok(self.apply_snapshot(&snapshot.items, fence))
    }

    /// Merges `tasks`, fetched when the write sequence was at `fence`.
    pub fn apply_snapshot(&self, tasks: &[Task], fence: u64) -> MergeReport {
        let mut in_flight = self.ctx.in_flight();
        let report = merge_snapshot(self.ctx.cache(), tasks, &in_flight.policy(fence));
        in_flight.prune(fence);
        tracing::debug!(
            inserted = report.inserted,
            replaced = report.replaced,
            removed = report.removed,
            skipped = report.skipped,
            "snapshot merged"
        );
        report
    }

    /// Reloads one task, as the detail view does.
    ///
    /// A task the server no longer has is removed locally. Either write is
    /// skipped while the task has local work in flight. Returns the server
    /// copy, or `None` if the server does not have the task.
    ///
    /// # Errors
    ///
    /// Any service error other than not-found.
    pub async fn refresh_one(&self, task_id: &TaskId) -> Result<Option<Task>, ServiceError> {
        let fence = self.ctx.sequence();
        let result = self.service.get_task(task_id).await;

        let in_flight = self.ctx.in_flight();
        let protected = in_flight.policy(fence).is_protected(task_id);
        match result {
            Ok(task) => {
                if !protected {
                    self.ctx.cache().upsert(task.clone(), Origin::Confirmed);
                }
                Ok(Some(task))
            }
            Err(ServiceError::NotFound(_)) => {
                if !protected {
                    self.ctx.cache().remove(task_id);
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Starts polling on `scheduler`. The first cycle runs one interval
    /// from now.
    pub fn start(self: &Arc<Self>, scheduler: &impl Scheduler) -> Subscription {
        let reconciler = Arc::clone(self);
        tracing::info!(interval_secs = self.interval.as_secs(), "polling started");
        scheduler.start(self.interval, move || {
            let reconciler = Arc::clone(&reconciler);
            async move { reconciler.poll().await }
        })
    }

    async fn poll(&self) {
        match self.reconcile_once().await {
            Ok(report) => {
                tracing::trace!(changed = report.changed(), "poll cycle complete");
            }
            Err(e) => {
                tracing::warn!(error = %e, "poll failed, skipping cycle");
            }
        }
    }
}
