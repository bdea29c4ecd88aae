//! Board filter configuration.
//!
//! [`TaskFiltersState`] is pure configuration: the board core reads it to
//! derive columns and hands it to an external key-value store as an opaque
//! JSON blob.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::task::{AssigneeId, TaskPriority, TaskStatus};

/// Either every value passes, or only one specific value does.
///
/// Serialized as the string `"all"` or as the concrete value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector<T> {
    /// No restriction.
    All,
    /// Only this value passes.
    Only(T),
}

impl<T> Default for Selector<T> {
    fn default() -> Self {
        Self::All
    }
}

impl<T: PartialEq> Selector<T> {
    /// Returns `true` if `value` passes this selector.
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == value,
        }
    }

    /// Like [`matches`](Self::matches) for optional attributes: a missing
    /// value only passes [`Selector::All`].
    pub fn matches_opt(&self, value: Option<&T>) -> bool {
        match (self, value) {
            (Self::All, _) => true,
            (Self::Only(wanted), Some(value)) => wanted == value,
            (Self::Only(_), None) => false,
        }
    }
}

/// The `"all"` keyword on the wire.
#[derive(Serialize, Deserialize)]
enum AllKeyword {
    #[serde(rename = "all")]
    All,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SelectorRepr<T> {
    All(AllKeyword),
    Only(T),
}

impl<T: Serialize> Serialize for Selector<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => AllKeyword::All.serialize(serializer),
            Self::Only(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Selector<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match SelectorRepr::deserialize(deserializer)? {
            SelectorRepr::All(AllKeyword::All) => Self::All,
            SelectorRepr::Only(value) => Self::Only(value),
        })
    }
}

/// Attribute the columns are sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Due date; tasks without one always sort last.
    DueDate,
    /// Priority rank.
    Priority,
    /// Creation timestamp.
    #[default]
    CreatedAt,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

/// Filter and sort settings of the board.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskFiltersState {
    /// Assignee restriction.
    pub assignee: Selector<AssigneeId>,
    /// Status restriction.
    pub status: Selector<TaskStatus>,
    /// Priority restriction.
    pub priority: Selector<TaskPriority>,
    /// Sort attribute.
    pub sort_by: SortKey,
    /// Sort direction.
    #[serde(rename = "sortOrder")]
    pub sort_direction: SortDirection,
    /// Only tasks due on or before this date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date_before: Option<NaiveDate>,
    /// Only tasks due on or after this date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date_after: Option<NaiveDate>,
}

impl TaskFiltersState {
    /// Returns `true` if any due-date bound is set.
    #[must_use]
    pub const fn has_due_date_bounds(&self) -> bool {
        self.due_date_before.is_some() || self.due_date_after.is_some()
    }
}
