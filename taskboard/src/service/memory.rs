//! In-process task service.
//!
//! [`InMemoryTaskService`] models the REST service closely enough to drive
//! the board without a network: it assigns ids and timestamps, keeps a
//! per-status order honouring move positions, and answers 404 for unknown
//! tasks. Tests steer it with two knobs:
//!
//! - [`pause`](InMemoryTaskService::pause) parks calls of one operation until
//!   [`resume`](InMemoryTaskService::resume). Reads capture server state
//!   before parking (a parked poll returns what it saw when issued); writes
//!   park first and apply on resume.
//! - [`fail_next`](InMemoryTaskService::fail_next) queues an error for the
//!   next call of an operation, claimed when that call is issued.
//!
//! # Examples
//!
//! ```
//! use taskboard::service::TaskService;
//! use taskboard::service::memory::InMemoryTaskService;
//! use taskboard_proto::task::NewTask;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let service = InMemoryTaskService::new();
//! let task = service.create_task(&NewTask::titled("Call back")).await.unwrap();
//! assert_eq!(service.list_tasks().await.unwrap().items, vec![task]);
//! # }
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;

use taskboard_proto::api::TaskListResponse;
use taskboard_proto::task::{Assignee, AssigneeId, NewTask, Task, TaskId, TaskPatch, TaskStatus};

use super::{ServiceError, ServiceOp, TaskService};

#[derive(Debug, Default)]
struct ServerState {
    tasks: Vec<Task>,
    assignees: Vec<Assignee>,
    next_id: u64,
}

impl ServerState {
    fn find_mut(&mut self, id: &TaskId) -> Result<&mut Task, ServiceError> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == *id)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    fn position(&self, id: &TaskId) -> Result<usize, ServiceError> {
        self.tasks
            .iter()
            .position(|task| task.id == *id)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    /// Moves `id` to `status`, placing it before the `position`-th task of
    /// that column.
    fn reposition(
        &mut self,
        id: &TaskId,
        status: TaskStatus,
        position: usize,
    ) -> Result<Task, ServiceError> {
        let index = self.position(id)?;
        let mut task = self.tasks.remove(index);
        task.status = status;
        task.updated_at = Utc::now();
        let insert_at = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, other)| other.status == status)
            .nth(position)
            .map_or(self.tasks.len(), |(i, _)| i);
        self.tasks.insert(insert_at, task.clone());
        Ok(task)
    }
}

/// In-process [`TaskService`] with pause gates and failure injection.
#[derive(Debug)]
pub struct InMemoryTaskService {
    state: Mutex<ServerState>,
    paused: watch::Sender<HashSet<ServiceOp>>,
    parked: watch::Sender<usize>,
    failures: Mutex<HashMap<ServiceOp, VecDeque<ServiceError>>>,
    calls: Mutex<HashMap<ServiceOp, usize>>,
}

impl Default for InMemoryTaskService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    /// Creates a service already holding `tasks`, in that order.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let (paused, _) = watch::channel(HashSet::new());
        let (parked, _) = watch::channel(0);
        Self {
            state: Mutex::new(ServerState {
                tasks,
                ..ServerState::default()
            }),
            paused,
            parked,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the assignee list.
    #[must_use]
    pub fn with_assignees(self, assignees: Vec<Assignee>) -> Self {
        self.state.lock().assignees = assignees;
        self
    }

    /// Server-side tasks, in server order.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    /// Edits a task as another client would.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if the server does not have `id`.
    pub fn remote_edit(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, ServiceError> {
        let mut state = self.state.lock();
        let task = state.find_mut(id)?;
        task.apply_patch(patch);
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    /// Adds a task as another client would.
    pub fn remote_insert(&self, task: Task) {
        self.state.lock().tasks.push(task);
    }

    /// Deletes a task as another client would. Returns `false` if unknown.
    pub fn remote_delete(&self, id: &TaskId) -> bool {
        let mut state = self.state.lock();
        let before = state.tasks.len();
        state.tasks.retain(|task| task.id != *id);
        state.tasks.len() != before
    }

    /// Holds every subsequent call of `op` until [`resume`](Self::resume).
    pub fn pause(&self, op: ServiceOp) {
        self.paused.send_modify(|paused| {
            paused.insert(op);
        });
    }

    /// Releases calls of `op` held by [`pause`](Self::pause).
    pub fn resume(&self, op: ServiceOp) {
        self.paused.send_modify(|paused| {
            paused.remove(&op);
        });
    }

    /// Number of calls currently held by a pause.
    #[must_use]
    pub fn parked(&self) -> usize {
        *self.parked.borrow()
    }

    /// Waits until at least `count` calls are held by a pause.
    pub async fn wait_parked(&self, count: usize) {
        let mut rx = self.parked.subscribe();
        let _ = rx.wait_for(|parked| *parked >= count).await;
    }

    /// Makes the next call of `op` fail with `error`. Queued errors are
    /// claimed one per call, in order.
    pub fn fail_next(&self, op: ServiceOp, error: ServiceError) {
        self.failures.lock().entry(op).or_default().push_back(error);
    }

    /// Number of calls of `op` received so far.
    #[must_use]
    pub fn calls(&self, op: ServiceOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Counts the call and claims any injected failure for it.
    fn begin(&self, op: ServiceOp) -> Option<ServiceError> {
        *self.calls.lock().entry(op).or_default() += 1;
        self.failures
            .lock()
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
    }

    async fn gate(&self, op: ServiceOp) {
        let mut rx = self.paused.subscribe();
        let held = rx.borrow_and_update().contains(&op);
        if !held {
            return;
        }
        self.parked.send_modify(|parked| *parked += 1);
        tracing::trace!(%op, "call parked");
        let _ = rx.wait_for(|paused| !paused.contains(&op)).await;
        self.parked.send_modify(|parked| *parked -= 1);
    }

    async fn read<T, F>(&self, op: ServiceOp, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&ServerState) -> Result<T, ServiceError> + Send,
        T: Send,
    {
        let failure = self.begin(op);
        let result = f(&self.state.lock());
        self.gate(op).await;
        match failure {
            Some(error) => Err(error),
            None => result,
        }
    }

    async fn write<T, F>(&self, op: ServiceOp, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut ServerState) -> Result<T, ServiceError> + Send,
        T: Send,
    {
        let failure = self.begin(op);
        self.gate(op).await;
        if let Some(error) = failure {
            return Err(error);
        }
        f(&mut self.state.lock())
    }
}

impl TaskService for InMemoryTaskService {
    async fn list_tasks(&self) -> Result<TaskListResponse, ServiceError> {
        self.read(ServiceOp::ListTasks, |state| {
            Ok(TaskListResponse {
                items: state.tasks.clone(),
                total: state.tasks.len(),
                last_updated: Utc::now(),
            })
        })
        .await
    }

    async fn list_assignees(&self) -> Result<Vec<Assignee>, ServiceError> {
        self.read(ServiceOp::ListAssignees, |state| Ok(state.assignees.clone()))
            .await
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, ServiceError> {
        self.read(ServiceOp::GetTask, |state| {
            state
                .tasks
                .iter()
                .find(|task| task.id == *id)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(id.clone()))
        })
        .await
    }

    async fn create_task(&self, new_task: &NewTask) -> Result<Task, ServiceError> {
        self.write(ServiceOp::CreateTask, |state| {
            state.next_id += 1;
            let now = Utc::now();
            let task = Task {
                id: TaskId::new(format!("task-{}", state.next_id)),
                title: new_task.title.clone(),
                description: new_task.description.clone(),
                status: new_task.status,
                priority: new_task.priority,
                due_date: new_task.due_date,
                assignee_id: new_task.assignee_id.clone(),
                deal_id: new_task.deal_id.clone(),
                created_at: now,
                updated_at: now,
            };
            state.tasks.push(task.clone());
            Ok(task)
        })
        .await
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, ServiceError> {
        self.write(ServiceOp::UpdateTask, |state| {
            let task = state.find_mut(id)?;
            task.apply_patch(patch);
            task.updated_at = Utc::now();
            Ok(task.clone())
        })
        .await
    }

    async fn move_task(
        &self,
        id: &TaskId,
        status: TaskStatus,
        position: usize,
    ) -> Result<Task, ServiceError> {
        self.write(ServiceOp::MoveTask, |state| state.reposition(id, status, position))
            .await
    }

    async fn assign_task(
        &self,
        id: &TaskId,
        assignee_id: Option<&AssigneeId>,
    ) -> Result<Task, ServiceError> {
        self.write(ServiceOp::AssignTask, |state| {
            let task = state.find_mut(id)?;
            task.assignee_id = assignee_id.cloned();
            task.updated_at = Utc::now();
            Ok(task.clone())
        })
        .await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), ServiceError> {
        self.write(ServiceOp::DeleteTask, |state| {
            let index = state.position(id)?;
            state.tasks.remove(index);
            Ok(())
        })
        .await
    }
}
