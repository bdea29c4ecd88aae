//! Gesture adapters: drag-drop and keyboard shortcuts.
//!
//! Both controllers are thin. They translate a UI event into at most one
//! coordinator call or shortcut action and hold no state of their own.

use std::sync::Arc;

use tokio::sync::mpsc;

use taskboard_proto::task::{Task, TaskId, TaskStatus};

use crate::schedule::Subscription;
use crate::service::TaskService;
use crate::tasks::{MutationCoordinator, MutationError};

/// A card dropped onto a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropEvent {
    /// The dragged task.
    pub task_id: TaskId,
    /// Column the drag started in.
    pub source: TaskStatus,
    /// Column the card was dropped on.
    pub destination: TaskStatus,
    /// Index within the destination column.
    pub index: usize,
}

impl DropEvent {
    /// Returns `true` if the drop changes the task's status.
    #[must_use]
    pub fn changes_status(&self) -> bool {
        self.source != self.destination
    }
}

/// Routes drops to status moves.
pub struct DragController<S> {
    coordinator: Arc<MutationCoordinator<S>>,
}

impl<S: TaskService> DragController<S> {
    /// Creates a controller issuing moves through `coordinator`.
    #[must_use]
    pub const fn new(coordinator: Arc<MutationCoordinator<S>>) -> Self {
        Self { coordinator }
    }

    /// Handles a drop.
    ///
    /// Reordering within a column is not persisted and returns `Ok(None)`
    /// without contacting the server.
    ///
    /// # Errors
    ///
    /// Whatever the status move fails with.
    pub async fn on_drop(&self, event: DropEvent) -> Result<Option<Task>, MutationError> {
        if !event.changes_status() {
            tracing::trace!(task_id = %event.task_id, "same-column drop ignored");
            return Ok(None);
        }
        self.coordinator
            .move_status(&event.task_id, event.destination, event.index)
            .await
            .map(Some)
    }
}

/// Modifier keys held during a key press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Modifiers {
    /// Control.
    pub ctrl: bool,
    /// Alt / Option.
    pub alt: bool,
    /// Shift.
    pub shift: bool,
    /// Meta / Command.
    pub meta: bool,
}

impl Modifiers {
    /// Returns `true` if no modifier is held.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.ctrl || self.alt || self.shift || self.meta)
    }
}

/// Where keyboard focus was when a key was pressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FocusTarget {
    /// The board itself or any non-editable element.
    #[default]
    Board,
    /// A text input.
    Input,
    /// A dropdown.
    Select,
    /// A multi-line text area.
    TextArea,
}

impl FocusTarget {
    /// Returns `true` for elements that consume typed characters.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Input | Self::Select | Self::TextArea)
    }
}

/// A key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The character produced.
    pub key: char,
    /// Held modifiers.
    pub modifiers: Modifiers,
    /// Focused element.
    pub focus: FocusTarget,
}

impl KeyEvent {
    /// A bare key press on the board.
    #[must_use]
    pub fn plain(key: char) -> Self {
        Self {
            key,
            modifiers: Modifiers::default(),
            focus: FocusTarget::Board,
        }
    }
}

/// Board-level keyboard actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Open the create-task flow.
    NewTask,
}

/// Maps a key press to its shortcut, if any.
///
/// Only a bare lowercase `n` outside editable elements opens the create
/// flow.
#[must_use]
pub fn shortcut_for(event: &KeyEvent) -> Option<Shortcut> {
    if event.key == 'n' && event.modifiers.is_empty() && !event.focus.is_editable() {
        Some(Shortcut::NewTask)
    } else {
        None
    }
}

/// Delivers shortcuts from a key event stream.
pub struct ShortcutController;

impl ShortcutController {
    /// Calls `on_shortcut` for every key event on `events` that maps to a
    /// shortcut, until the returned subscription is disposed or the sender
    /// side closes.
    pub fn subscribe<F>(mut events: mpsc::Receiver<KeyEvent>, mut on_shortcut: F) -> Subscription
    where
        F: FnMut(Shortcut) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Some(shortcut) = shortcut_for(&event) {
                    tracing::debug!(?shortcut, "shortcut triggered");
                    on_shortcut(shortcut);
                }
            }
        });
        Subscription::from_handle(handle)
    }
}
