//! Chorewheel: household chore scheduling core.
//!
//! Recurring task materialization, fair rotation among group members,
//! overdue penalty sweeps, and the scheduled/completed lifecycle state
//! machine, over a SQLite store.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod rotation;
pub mod scheduler;
pub mod types;
