//! Shared data and wire definitions for the task board.

pub mod api;
pub mod codec;
pub mod filters;
pub mod task;
