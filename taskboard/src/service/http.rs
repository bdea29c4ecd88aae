//! REST implementation of [`TaskService`].
//!
//! Paths are joined onto the configured base URL, so a base of
//! `https://crm.example.com/api/` yields `https://crm.example.com/api/tasks`.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use taskboard_proto::api::{AssignRequest, AssigneeListResponse, StatusMoveRequest, TaskListResponse};
use taskboard_proto::task::{Assignee, AssigneeId, NewTask, Task, TaskId, TaskPatch, TaskStatus};

use super::{ServiceError, ServiceOp, TaskService};

/// Longest response body kept in [`ServiceError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// [`TaskService`] over HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    client: Client,
    base_url: Url,
}

impl HttpTaskService {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Transport`] if `base_url` cannot carry a path or the
    /// HTTP client cannot be built.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ServiceError> {
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::Transport(format!(
                "base url {base_url} cannot carry a path"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    /// The base URL requests are joined onto.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::Transport(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        op: ServiceOp,
        request: RequestBuilder,
        task_id: Option<&TaskId>,
    ) -> Result<Response, ServiceError> {
        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        tracing::debug!(%op, status = status.as_u16(), "task service responded");
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        Err(match (status, task_id) {
            (StatusCode::NOT_FOUND, Some(id)) => ServiceError::NotFound(id.clone()),
            (StatusCode::CONFLICT, _) => ServiceError::Conflict(body),
            _ => ServiceError::Status {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn json<T: DeserializeOwned>(
        &self,
        op: ServiceOp,
        request: RequestBuilder,
        task_id: Option<&TaskId>,
    ) -> Result<T, ServiceError> {
        self.send(op, request, task_id)
            .await?
            .json()
            .await
            .map_err(classify)
    }
}

fn classify(error: reqwest::Error) -> ServiceError {
    if error.is_timeout() {
        ServiceError::Timeout
    } else if error.is_decode() {
        ServiceError::Decode(error.to_string())
    } else {
        ServiceError::Transport(error.to_string())
    }
}

impl TaskService for HttpTaskService {
    async fn list_tasks(&self) -> Result<TaskListResponse, ServiceError> {
        let url = self.endpoint(&["tasks"])?;
        self.json(ServiceOp::ListTasks, self.client.get(url), None)
            .await
    }

    async fn list_assignees(&self) -> Result<Vec<Assignee>, ServiceError> {
        let url = self.endpoint(&["tasks", "assignees"])?;
        let response: AssigneeListResponse = self
            .json(ServiceOp::ListAssignees, self.client.get(url), None)
            .await?;
        Ok(response.assignees)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, ServiceError> {
        let url = self.endpoint(&["tasks", id.as_str()])?;
        self.json(ServiceOp::GetTask, self.client.get(url), Some(id))
            .await
    }

    async fn create_task(&self, new_task: &NewTask) -> Result<Task, ServiceError> {
        let url = self.endpoint(&["tasks"])?;
        self.json(
            ServiceOp::CreateTask,
            self.client.post(url).json(new_task),
            None,
        )
        .await
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, ServiceError> {
        let url = self.endpoint(&["tasks", id.as_str()])?;
        self.json(
            ServiceOp::UpdateTask,
            self.client.put(url).json(patch),
            Some(id),
        )
        .await
    }

    async fn move_task(
        &self,
        id: &TaskId,
        status: TaskStatus,
        position: usize,
    ) -> Result<Task, ServiceError> {
        let url = self.endpoint(&["tasks", id.as_str(), "status"])?;
        let body = StatusMoveRequest { status, position };
        self.json(ServiceOp::MoveTask, self.client.put(url).json(&body), Some(id))
            .await
    }

    async fn assign_task(
        &self,
        id: &TaskId,
        assignee_id: Option<&AssigneeId>,
    ) -> Result<Task, ServiceError> {
        let url = self.endpoint(&["tasks", id.as_str(), "assign"])?;
        let body = AssignRequest {
            assignee_id: assignee_id.cloned(),
        };
        self.json(
            ServiceOp::AssignTask,
            self.client.post(url).json(&body),
            Some(id),
        )
        .await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), ServiceError> {
        let url = self.endpoint(&["tasks", id.as_str()])?;
        self.send(ServiceOp::DeleteTask, self.client.delete(url), Some(id))
            .await?;
        Ok(())
    }
}
