//! Request and response bodies of the REST task service.
//!
//! | Call                         | Body                 | Response               |
//! |------------------------------|----------------------|------------------------|
//! | `GET /tasks`                 |                      | [`TaskListResponse`]   |
//! | `GET /tasks/assignees`       |                      | [`AssigneeListResponse`] |
//! | `GET /tasks/{id}`            |                      | [`Task`]               |
//! | `POST /tasks`                | [`NewTask`]          | [`Task`]               |
//! | `PUT /tasks/{id}`            | [`TaskPatch`]        | [`Task`]               |
//! | `PUT /tasks/{id}/status`     | [`StatusMoveRequest`] | [`Task`]              |
//! | `POST /tasks/{id}/assign`    | [`AssignRequest`]    | [`Task`]               |
//! | `DELETE /tasks/{id}`         |                      | empty                  |
//!
//! [`NewTask`]: crate::task::NewTask
//! [`TaskPatch`]: crate::task::TaskPatch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Assignee, AssigneeId, Task, TaskStatus};

/// Full board snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResponse {
    /// Every task on the board.
    pub items: Vec<Task>,
    /// Number of tasks the server reports.
    pub total: usize,
    /// When the server state last changed.
    pub last_updated: DateTime<Utc>,
}

/// Assignees available for the picker and the assignee filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssigneeListResponse {
    /// Known assignees.
    pub assignees: Vec<Assignee>,
}

/// Body of a drag-drop status move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMoveRequest {
    /// Destination column.
    pub status: TaskStatus,
    /// Index within the destination column, forwarded for server-side
    /// ordering. The client derives order itself and never reads it back.
    pub position: usize,
}

/// Body of an assignment change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    /// New assignee, or `null` to unassign.
    pub assignee_id: Option<AssigneeId>,
}
