//! Task service abstraction for the board.
//!
//! Defines the [`TaskService`] trait the coordinator and the reconciler talk
//! to. Concrete implementations:
//! - [`http::HttpTaskService`]: REST client over `reqwest`
//! - [`memory::InMemoryTaskService`]: in-process server model for tests and demos

pub mod http;
pub mod memory;

use std::fmt;
use std::future::Future;

use taskboard_proto::api::TaskListResponse;
use taskboard_proto::task::{Assignee, AssigneeId, NewTask, Task, TaskId, TaskPatch, TaskStatus};

/// Names one remote call, for logging and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceOp {
    /// `GET /tasks`
    ListTasks,
    /// `GET /tasks/assignees`
    ListAssignees,
    /// `GET /tasks/{id}`
    GetTask,
    /// `POST /tasks`
    CreateTask,
    /// `PUT /tasks/{id}`
    UpdateTask,
    /// `PUT /tasks/{id}/status`
    MoveTask,
    /// `POST /tasks/{id}/assign`
    AssignTask,
    /// `DELETE /tasks/{id}`
    DeleteTask,
}

impl fmt::Display for ServiceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListTasks => "list_tasks",
            Self::ListAssignees => "list_assignees",
            Self::GetTask => "get_task",
            Self::CreateTask => "create_task",
            Self::UpdateTask => "update_task",
            Self::MoveTask => "move_task",
            Self::AssignTask => "assign_task",
            Self::DeleteTask => "delete_task",
        };
        f.write_str(name)
    }
}

/// Errors a task service call can fail with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The server does not know the task.
    #[error("task {0} not found on server")]
    NotFound(TaskId),

    /// The server refused the change because of conflicting state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other non-success HTTP status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Async client of the REST task service.
///
/// Every method maps to exactly one request. Implementations must be
/// shareable across tasks; the coordinator issues calls concurrently.
pub trait TaskService: Send + Sync {
    /// Fetch the full board snapshot.
    fn list_tasks(&self) -> impl Future<Output = Result<TaskListResponse, ServiceError>> + Send;

    /// Fetch the assignees a task can be given to.
    fn list_assignees(&self) -> impl Future<Output = Result<Vec<Assignee>, ServiceError>> + Send;

    /// Fetch a single task.
    fn get_task(&self, id: &TaskId) -> impl Future<Output = Result<Task, ServiceError>> + Send;

    /// Create a task; the server assigns its id and timestamps.
    fn create_task(
        &self,
        new_task: &NewTask,
    ) -> impl Future<Output = Result<Task, ServiceError>> + Send;

    /// Apply a partial update.
    fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<Task, ServiceError>> + Send;

    /// Move a task to `status`, forwarding the drop position.
    fn move_task(
        &self,
        id: &TaskId,
        status: TaskStatus,
        position: usize,
    ) -> impl Future<Output = Result<Task, ServiceError>> + Send;

    /// Set or clear the assignee.
    fn assign_task(
        &self,
        id: &TaskId,
        assignee_id: Option<&AssigneeId>,
    ) -> impl Future<Output = Result<Task, ServiceError>> + Send;

    /// Delete a task.
    fn delete_task(&self, id: &TaskId) -> impl Future<Output = Result<(), ServiceError>> + Send;
}
