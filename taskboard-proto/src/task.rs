//! Task model shared between the board core and the REST task service.
//!
//! A [`Task`] is owned by the server; the client only ever holds a cached
//! copy. Partial edits travel as a [`TaskPatch`], creation input as a
//! [`NewTask`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Prefix carried by client-generated ids of tasks whose create call has
/// not resolved yet.
const TEMPORARY_ID_PREFIX: &str = "temp-";

/// Opaque, server-assigned task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps a server-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a client-side placeholder id for an optimistic create.
    ///
    /// Placeholder ids are time-ordered (UUID v7) and never collide with
    /// server ids because of their `temp-` prefix.
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMPORARY_ID_PREFIX}{}", Uuid::now_v7()))
    }

    /// Returns `true` if this id was generated locally by [`TaskId::temporary`].
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_ID_PREFIX)
    }

    /// Returns the string form of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an [`Assignee`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssigneeId(String);

impl AssigneeId {
    /// Wraps an assignee identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string form of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssigneeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A person tasks can be assigned to. Referenced by tasks, never owned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
    /// Stable identifier.
    pub id: AssigneeId,
    /// Name shown on cards and in the assignee picker.
    pub name: String,
    /// Optional avatar reference (URL or asset key).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Board column a task lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    Todo,
    /// Actively being worked on.
    InProgress,
    /// Finished.
    Done,
}

impl TaskStatus {
    /// All statuses in column order.
    pub const ALL: [Self; 3] = [Self::Todo, Self::InProgress, Self::Done];
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Task urgency. Declaration order is the sort rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Rank 0.
    Low,
    /// Rank 1.
    Medium,
    /// Rank 2.
    High,
    /// Rank 3.
    Urgent,
}

impl TaskPriority {
    /// Fixed sort rank: `low < medium < high < urgent`.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

/// A task as returned by the task service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Server-assigned identifier (or a temporary one while a create is in flight).
    pub id: TaskId,
    /// Non-empty title.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Column the task belongs to.
    pub status: TaskStatus,
    /// Urgency.
    pub priority: TaskPriority,
    /// Optional due date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Optional assignee reference.
    #[serde(default)]
    pub assignee_id: Option<AssigneeId>,
    /// Optional reference to a CRM deal.
    #[serde(default)]
    pub deal_id: Option<String>,
    /// Server creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Server last-modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// An attribute of a [`Task`] that a mutation can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskField {
    /// [`Task::title`]
    Title,
    /// [`Task::description`]
    Description,
    /// [`Task::status`]
    Status,
    /// [`Task::priority`]
    Priority,
    /// [`Task::due_date`]
    DueDate,
    /// [`Task::assignee_id`]
    Assignee,
    /// [`Task::deal_id`]
    Deal,
}

impl Task {
    /// Builds the local placeholder shown while a create call is in flight.
    #[must_use]
    pub fn optimistic(new_task: &NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::temporary(),
            title: new_task.title.clone(),
            description: new_task.description.clone(),
            status: new_task.status,
            priority: new_task.priority,
            due_date: new_task.due_date,
            assignee_id: new_task.assignee_id.clone(),
            deal_id: new_task.deal_id.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges a partial patch into this task. Timestamps are left alone;
    /// only the server moves them.
    pub fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(assignee) = &patch.assignee_id {
            self.assignee_id.clone_from(assignee);
        }
        if let Some(deal) = &patch.deal_id {
            self.deal_id.clone_from(deal);
        }
    }

    /// Copies the given attributes back from `from`, leaving the others as they are.
    pub fn restore_fields(&mut self, from: &Self, fields: &[TaskField]) {
        for field in fields {
            match field {
                TaskField::Title => self.title.clone_from(&from.title),
                TaskField::Description => self.description.clone_from(&from.description),
                TaskField::Status => self.status = from.status,
                TaskField::Priority => self.priority = from.priority,
                TaskField::DueDate => self.due_date = from.due_date,
                TaskField::Assignee => self.assignee_id.clone_from(&from.assignee_id),
                TaskField::Deal => self.deal_id.clone_from(&from.deal_id),
            }
        }
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Title; must be non-empty.
    pub title: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Initial column.
    pub status: TaskStatus,
    /// Initial priority.
    pub priority: TaskPriority,
    /// Optional due date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Optional assignee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<AssigneeId>,
    /// Optional deal reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
}

impl NewTask {
    /// A `todo`/`medium` task with just a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_date: None,
            assignee_id: None,
            deal_id: None,
        }
    }
}

/// Partial update of a task.
///
/// Outer `None` leaves an attribute untouched. For nullable attributes the
/// inner `None` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description, or `Some(None)` to clear it.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
    pub description: Option<Option<String>>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// New priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    /// New due date, or `Some(None)` to clear it.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
    pub due_date: Option<Option<NaiveDate>>,
    /// New assignee, or `Some(None)` to unassign.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
    pub assignee_id: Option<Option<AssigneeId>>,
    /// New deal reference, or `Some(None)` to clear it.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
    pub deal_id: Option<Option<String>>,
}

impl TaskPatch {
    /// A patch touching only the status.
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// A patch touching only the assignee.
    #[must_use]
    pub fn assignee(assignee_id: Option<AssigneeId>) -> Self {
        Self {
            assignee_id: Some(assignee_id),
            ..Self::default()
        }
    }

    /// Attributes this patch touches.
    #[must_use]
    pub fn fields(&self) -> Vec<TaskField> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push(TaskField::Title);
        }
        if self.description.is_some() {
            fields.push(TaskField::Description);
        }
        if self.status.is_some() {
            fields.push(TaskField::Status);
        }
        if self.priority.is_some() {
            fields.push(TaskField::Priority);
        }
        if self.due_date.is_some() {
            fields.push(TaskField::DueDate);
        }
        if self.assignee_id.is_some() {
            fields.push(TaskField::Assignee);
        }
        if self.deal_id.is_some() {
            fields.push(TaskField::Deal);
        }
        fields
    }

    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// Reasons a title is rejected before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TitleError {
    /// Title is empty or whitespace only.
    #[error("task title cannot be empty")]
    Empty,
    /// Title exceeds the configured maximum length.
    #[error("task title too long (max {max} characters)")]
    TooLong {
        /// Configured maximum, in characters.
        max: usize,
    },
}

/// Checks a title against the non-empty and maximum-length rules.
///
/// # Errors
///
/// Returns [`TitleError::Empty`] for blank titles and
/// [`TitleError::TooLong`] when `title` has more than `max_len` characters.
pub fn validate_title(title: &str, max_len: usize) -> Result<(), TitleError> {
    if title.trim().is_empty() {
        return Err(TitleError::Empty);
    }
    if title.chars().count() > max_len {
        return Err(TitleError::TooLong { max: max_len });
    }
    Ok(())
}

/// Serde adapter that keeps "absent" and "explicit null" apart for
/// `Option<Option<T>>` patch attributes.
mod nullable {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
