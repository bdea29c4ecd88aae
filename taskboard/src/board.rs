//! The board facade.
//!
//! [`Board`] wires one [`ReconciliationContext`] to a coordinator, a
//! reconciler, the gesture controllers and filter persistence. A renderer
//! only needs [`Board::subscribe`] and [`Board::columns`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;

use taskboard_proto::filters::TaskFiltersState;
use taskboard_proto::task::{Assignee, MAX_TASK_TITLE_LENGTH};

use crate::config::BoardConfig;
use crate::controls::DragController;
use crate::persist::{FilterPersistence, FilterStore, StoreError};
use crate::schedule::Scheduler;
use crate::service::{ServiceError, TaskService};
use crate::tasks::{
    BoardColumns, DEFAULT_POLL_INTERVAL, MergeReport, MutationCoordinator, PollingReconciler,
    ReconciliationContext, derive_columns,
};

/// Tunables of a [`Board`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardSettings {
    /// Interval between snapshot polls.
    pub poll_interval: Duration,
    /// Maximum task title length in characters.
    pub max_task_title_len: usize,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_task_title_len: MAX_TASK_TITLE_LENGTH,
        }
    }
}

impl From<&BoardConfig> for BoardSettings {
    fn from(config: &BoardConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            max_task_title_len: config.max_task_title_len,
        }
    }
}

/// One board view: cache, mutations, polling and filters.
pub struct Board<S, St> {
    ctx: Arc<ReconciliationContext>,
    service: Arc<S>,
    coordinator: Arc<MutationCoordinator<S>>,
    reconciler: Arc<PollingReconciler<S>>,
    persistence: FilterPersistence<St>,
    filters: RwLock<TaskFiltersState>,
    assignees: RwLock<Vec<Assignee>>,
}

impl<S, St> Board<S, St>
where
    S: TaskService + 'static,
    St: FilterStore,
{
    /// Creates a board and reads the stored filters.
    ///
    /// Nothing is fetched until [`load`](Self::load).
    pub fn new(service: Arc<S>, store: St, settings: BoardSettings) -> Self {
        let ctx = Arc::new(ReconciliationContext::new());
        let coordinator = Arc::new(
            MutationCoordinator::new(Arc::clone(&ctx), Arc::clone(&service))
                .with_max_title_len(settings.max_task_title_len),
        );
        let reconciler = Arc::new(
            PollingReconciler::new(Arc::clone(&ctx), Arc::clone(&service))
                .with_interval(settings.poll_interval),
        );
        let persistence = FilterPersistence::new(store);
        let filters = persistence.load();
        Self {
            ctx,
            service,
            coordinator,
            reconciler,
            persistence,
            filters: RwLock::new(filters),
            assignees: RwLock::new(Vec::new()),
        }
    }

    /// The shared reconciliation context.
    pub const fn context(&self) -> &Arc<ReconciliationContext> {
        &self.ctx
    }

    /// Issues mutations against this board.
    pub const fn coordinator(&self) -> &Arc<MutationCoordinator<S>> {
        &self.coordinator
    }

    /// Merges snapshots into this board.
    pub const fn reconciler(&self) -> &Arc<PollingReconciler<S>> {
        &self.reconciler
    }

    /// A drag controller bound to this board.
    pub fn drag_controller(&self) -> DragController<S> {
        DragController::new(Arc::clone(&self.coordinator))
    }

    /// Fetches tasks and assignees and marks the board loaded.
    ///
    /// A failed assignee fetch is logged and leaves the previous list.
    ///
    /// # Errors
    ///
    /// The task fetch failed; the board stays unloaded.
    pub async fn load(&self) -> Result<MergeReport, ServiceError> {
        let (tasks, assignees) = tokio::join!(
            self.reconciler.reconcile_once(),
            self.service.list_assignees()
        );
        match assignees {
            Ok(assignees) => *self.assignees.write() = assignees,
            Err(e) => tracing::warn!(error = %e, "assignee fetch failed"),
        }
        let report = tasks?;
        self.ctx.mark_loaded();
        tracing::info!(tasks = self.ctx.cache().len(), "board loaded");
        Ok(report)
    }

    /// Starts background polling, replacing any running poll.
    pub fn start_polling(&self, scheduler: &impl Scheduler) {
        self.ctx.attach_poll(self.reconciler.start(scheduler));
    }

    /// Stops polling.
    pub fn teardown(&self) {
        self.ctx.teardown();
    }

    /// Current columns under the current filters.
    pub fn columns(&self) -> BoardColumns {
        derive_columns(&self.ctx.cache().get(), &self.filters.read())
    }

    /// Current filter state.
    pub fn filters(&self) -> TaskFiltersState {
        self.filters.read().clone()
    }

    /// Replaces the filter state.
    ///
    /// The change applies immediately. It is persisted only once the board
    /// has loaded, so stored filters are never clobbered by startup defaults.
    ///
    /// # Errors
    ///
    /// Persisting failed; the in-memory change still applies.
    pub fn set_filters(&self, filters: TaskFiltersState) -> Result<(), StoreError> {
        {
            let mut current = self.filters.write();
            if *current == filters {
                return Ok(());
            }
            *current = filters.clone();
        }
        if !self.ctx.is_loaded() {
            tracing::debug!("filters changed before initial load, not persisted");
            return Ok(());
        }
        self.persistence.save(&filters)
    }

    /// Receiver of the cache revision, bumped on every cache write.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.ctx.cache().subscribe()
    }

    /// Assignees from the last successful fetch.
    pub fn assignees(&self) -> Vec<Assignee> {
        self.assignees.read().clone()
    }

    /// The filter persistence layer.
    pub const fn persistence(&self) -> &FilterPersistence<St> {
        &self.persistence
    }
}
