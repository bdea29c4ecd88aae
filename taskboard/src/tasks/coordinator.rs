//! Optimistic mutations with confirm/rollback.
//!
//! Every operation runs the same state machine:
//! `requested -> optimistic-applied -> (confirmed | rolled-back)`.
//! The first two steps happen synchronously under the in-flight lock before
//! the remote call is issued, so the cache shows the intended end state
//! before any network round-trip. The lock is never held across an await.
//!
//! Mutations on the same task compose in issue order. Each one snapshots the
//! cache as it finds it, possibly still optimistic, and a rollback restores
//! only the attributes its own mutation touched.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use taskboard_proto::task::{
    AssigneeId, MAX_TASK_TITLE_LENGTH, NewTask, Task, TaskId, TaskPatch, TaskStatus,
    validate_title,
};

use crate::service::{ServiceError, TaskService};

use super::cache::Origin;
use super::context::{Intent, PendingMutation, ReconciliationContext};
use super::{MutationId, MutationKind, TaskError};

/// Errors surfaced to the caller of a mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    /// Refused before anything was applied locally.
    #[error(transparent)]
    Rejected(#[from] TaskError),

    /// The remote call failed; the optimistic change has been undone.
    #[error("{operation} of task {task_id} failed and was rolled back: {source}")]
    RolledBack {
        /// What was attempted.
        operation: MutationKind,
        /// Task the mutation targeted (the temporary id for creates).
        task_id: TaskId,
        /// Why the remote call failed.
        #[source]
        source: ServiceError,
    },
}

impl MutationError {
    /// Returns `true` if a local change was applied and then undone.
    #[must_use]
    pub const fn was_rolled_back(&self) -> bool {
        matches!(self, Self::RolledBack { .. })
    }
}

/// Applies user intents to the cache and the server.
pub struct MutationCoordinator<S> {
    ctx: Arc<ReconciliationContext>,
    service: Arc<S>,
    max_title_len: usize,
}

impl<S: TaskService> MutationCoordinator<S> {
    /// Creates a coordinator writing to `ctx` and calling `service`.
    #[must_use]
    pub const fn new(ctx: Arc<ReconciliationContext>, service: Arc<S>) -> Self {
        Self {
            ctx,
            service,
            max_title_len: MAX_TASK_TITLE_LENGTH,
        }
    }

    /// Overrides the maximum title length.
    #[must_use]
    pub const fn with_max_title_len(mut self, max_title_len: usize) -> Self {
        self.max_title_len = max_title_len;
        self
    }

    /// The shared reconciliation context.
    #[must_use]
    pub const fn context(&self) -> &Arc<ReconciliationContext> {
        &self.ctx
    }

    /// Creates a task.
    ///
    /// A draft with a temporary id is cached immediately. On success the
    /// draft is replaced, in place, by the server's task; on failure it is
    /// removed.
    ///
    /// # Errors
    ///
    /// [`MutationError::Rejected`] if the title is invalid (nothing is
    /// cached), [`MutationError::RolledBack`] if the server call failed.
    pub async fn create(&self, new_task: NewTask) -> Result<Task, MutationError> {
        validate_title(&new_task.title, self.max_title_len).map_err(TaskError::from)?;

        let mutation_id = MutationId::new();
        let draft = Task::optimistic(&new_task, Utc::now());
        let temp_id = draft.id.clone();
        {
            let mut in_flight = self.ctx.in_flight();
            in_flight.push(
                &temp_id,
                PendingMutation {
                    id: mutation_id,
                    kind: MutationKind::Create,
                    snapshot: Some(draft.clone()),
                    intent: Intent::Create,
                },
            );
            self.ctx
                .cache()
                .upsert(draft, Origin::Optimistic(mutation_id));
        }
        tracing::debug!(task_id = %temp_id, %mutation_id, "create applied optimistically");

        let result = self.service.create_task(&new_task).await;

        let mut in_flight = self.ctx.in_flight();
        in_flight.take(&temp_id, mutation_id);
        match result {
            Ok(task) => {
                in_flight.record_completion(&task.id);
                self.ctx
                    .cache()
                    .replace(&temp_id, task.clone(), Origin::Confirmed);
                tracing::debug!(task_id = %task.id, temp_id = %temp_id, %mutation_id, "create confirmed");
                Ok(task)
            }
            Err(source) => {
                in_flight.record_completion(&temp_id);
                self.ctx.cache().remove(&temp_id);
                tracing::warn!(task_id = %temp_id, %mutation_id, error = %source, "create rolled back");
                Err(MutationError::RolledBack {
                    operation: MutationKind::Create,
                    task_id: temp_id,
                    source,
                })
            }
        }
    }

    /// Applies a partial field update.
    ///
    /// # Errors
    ///
    /// [`MutationError::Rejected`] for an empty patch, an invalid title, an
    /// unknown task or a task still being created;
    /// [`MutationError::RolledBack`] if the server call failed.
    pub async fn update(&self, task_id: &TaskId, patch: TaskPatch) -> Result<Task, MutationError> {
        if patch.is_empty() {
            return Err(TaskError::EmptyPatch(task_id.clone()).into());
        }
        if let Some(title) = &patch.title {
            validate_title(title, self.max_title_len).map_err(TaskError::from)?;
        }
        let mutation_id = self.begin_patch(MutationKind::Update, task_id, patch.clone())?;
        let result = self.service.update_task(task_id, &patch).await;
        self.settle_patch(MutationKind::Update, task_id, mutation_id, result)
    }

    /// Moves a task to another column.
    ///
    /// Only the status changes locally; `position` is forwarded to the
    /// server for its own ordering.
    ///
    /// # Errors
    ///
    /// [`MutationError::Rejected`] for an unknown task or a task still being
    /// created; [`MutationError::RolledBack`] if the server call failed.
    pub async fn move_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        position: usize,
    ) -> Result<Task, MutationError> {
        let mutation_id =
            self.begin_patch(MutationKind::Move, task_id, TaskPatch::status(status))?;
        let result = self.service.move_task(task_id, status, position).await;
        self.settle_patch(MutationKind::Move, task_id, mutation_id, result)
    }

    /// Sets or clears the assignee.
    ///
    /// # Errors
    ///
    /// [`MutationError::Rejected`] for an unknown task or a task still being
    /// created; [`MutationError::RolledBack`] if the server call failed.
    pub async fn assign(
        &self,
        task_id: &TaskId,
        assignee_id: Option<AssigneeId>,
    ) -> Result<Task, MutationError> {
        let mutation_id = self.begin_patch(
            MutationKind::Assign,
            task_id,
            TaskPatch::assignee(assignee_id.clone()),
        )?;
        let result = self
            .service
            .assign_task(task_id, assignee_id.as_ref())
            .await;
        self.settle_patch(MutationKind::Assign, task_id, mutation_id, result)
    }

    /// Deletes a task.
    ///
    /// The task leaves the cache immediately. If the server call fails it is
    /// reinserted at its former position.
    ///
    /// # Errors
    ///
    /// [`MutationError::Rejected`] for an unknown task or a task still being
    /// created; [`MutationError::RolledBack`] if the server call failed.
    pub async fn delete(&self, task_id: &TaskId) -> Result<(), MutationError> {
        let mutation_id = MutationId::new();
        {
            let mut in_flight = self.ctx.in_flight();
            self.ensure_addressable(task_id)?;
            let Some((index, entry)) = self.ctx.cache().remove(task_id) else {
                return Err(TaskError::TaskNotFound(task_id.clone()).into());
            };
            in_flight.push(
                task_id,
                PendingMutation {
                    id: mutation_id,
                    kind: MutationKind::Delete,
                    snapshot: Some(entry.task),
                    intent: Intent::Delete { index },
                },
            );
        }
        tracing::debug!(%task_id, %mutation_id, "delete applied optimistically");

        let result = self.service.delete_task(task_id).await;

        let mut in_flight = self.ctx.in_flight();
        let taken = in_flight.take(task_id, mutation_id);
        in_flight.record_completion(task_id);
        match result {
            Ok(()) => {
                tracing::debug!(%task_id, %mutation_id, "delete confirmed");
                Ok(())
            }
            Err(source) => {
                if let Some((
                    _,
                    PendingMutation {
                        snapshot: Some(task),
                        intent: Intent::Delete { index },
                        ..
                    },
                )) = taken
                {
                    let origin = in_flight
                        .latest(task_id)
                        .map_or(Origin::Confirmed, Origin::Optimistic);
                    self.ctx.cache().insert_at(index, task, origin);
                }
                tracing::warn!(%task_id, %mutation_id, error = %source, "delete rolled back");
                Err(MutationError::RolledBack {
                    operation: MutationKind::Delete,
                    task_id: task_id.clone(),
                    source,
                })
            }
        }
    }

    /// Fails unless `task_id` is cached under a server-assigned id.
    fn ensure_addressable(&self, task_id: &TaskId) -> Result<(), TaskError> {
        if !self.ctx.cache().contains(task_id) {
            return Err(TaskError::TaskNotFound(task_id.clone()));
        }
        if task_id.is_temporary() {
            return Err(TaskError::CreatePending(task_id.clone()));
        }
        Ok(())
    }

    /// Snapshots the current entry, applies `patch` and registers the mutation.
    fn begin_patch(
        &self,
        kind: MutationKind,
        task_id: &TaskId,
        patch: TaskPatch,
    ) -> Result<MutationId, TaskError> {
        let mutation_id = MutationId::new();
        let mut in_flight = self.ctx.in_flight();
        self.ensure_addressable(task_id)?;
        let Some(current) = self.ctx.cache().task(task_id) else {
            return Err(TaskError::TaskNotFound(task_id.clone()));
        };

        let mut next = current.clone();
        next.apply_patch(&patch);
        in_flight.push(
            task_id,
            PendingMutation {
                id: mutation_id,
                kind,
                snapshot: Some(current),
                intent: Intent::Patch(patch),
            },
        );
        self.ctx
            .cache()
            .upsert(next, Origin::Optimistic(mutation_id));
        tracing::debug!(%task_id, %mutation_id, %kind, "mutation applied optimistically");
        Ok(mutation_id)
    }

    /// Resolves a patch mutation with the outcome of its remote call.
    fn settle_patch(
        &self,
        kind: MutationKind,
        task_id: &TaskId,
        mutation_id: MutationId,
        result: Result<Task, ServiceError>,
    ) -> Result<Task, MutationError> {
        let mut in_flight = self.ctx.in_flight();
        let Some((index, mutation)) = in_flight.take(task_id, mutation_id) else {
            return result.map_err(|source| MutationError::RolledBack {
                operation: kind,
                task_id: task_id.clone(),
                source,
            });
        };
        let fields = mutation.fields();
        in_flight.record_completion(task_id);

        match result {
            Ok(server) => {
                in_flight.rebase_after(task_id, index, &server, &fields);
                if !in_flight.has_pending_delete(task_id) && self.ctx.cache().contains(task_id) {
                    let mut base = server.clone();
                    for patch in in_flight.pending_patches(task_id) {
                        base.apply_patch(&patch);
                    }
                    let origin = in_flight
                        .latest(task_id)
                        .map_or(Origin::Confirmed, Origin::Optimistic);
                    self.ctx.cache().upsert(base, origin);
                }
                tracing::debug!(%task_id, %mutation_id, kind = %mutation.kind, "mutation confirmed");
                Ok(server)
            }
            Err(source) => {
                if let Some(snapshot) = &mutation.snapshot {
                    in_flight.rebase_after(task_id, index, snapshot, &fields);
                    if !in_flight.has_pending_delete(task_id)
                        && let Some(mut restored) = self.ctx.cache().task(task_id)
                    {
                        restored.restore_fields(snapshot, &fields);
                        for patch in in_flight.pending_patches(task_id) {
                            restored.apply_patch(&patch);
                        }
                        match in_flight.latest(task_id) {
                            Some(latest) => self
                                .ctx
                                .cache()
                                .upsert(restored, Origin::Optimistic(latest)),
                            None => {
                                self.ctx.cache().mark_rolled_back(task_id, restored);
                            }
                        }
                    }
                }
                tracing::warn!(
                    %task_id,
                    %mutation_id,
                    kind = %mutation.kind,
                    error = %source,
                    "mutation rolled back"
                );
                Err(MutationError::RolledBack {
                    operation: kind,
                    task_id: task_id.clone(),
                    source,
                })
            }
        }
    }
}
