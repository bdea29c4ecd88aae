//! `Taskboard`: optimistic task board client with polling reconciliation.

pub mod board;
pub mod config;
pub mod controls;
pub mod persist;
pub mod schedule;
pub mod service;
pub mod tasks;
