//! Core domain types for the chore scheduler.
//!
//! All timestamps are milliseconds since the Unix epoch; all durations are
//! millisecond spans. Both are `i64` to match the storage layer.

use serde::{Deserialize, Serialize};

/// A recurring chore definition owned by a house.
///
/// `next_scheduler_date` is the next time the scheduler should consider this
/// task for materialization. It starts at `freq_base - schedule_offset` and
/// only ever moves forward, by `freq_offset` per materialized instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTask {
    pub id: String,
    pub house_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Anchor date the recurrence is computed from.
    pub freq_base: i64,
    /// Recurrence period.
    pub freq_offset: i64,
    /// How long an instance stays open before it is overdue.
    pub time_limit: i64,
    /// How long before the occurrence an instance is materialized.
    pub schedule_offset: i64,
    pub points: i64,
    pub penalty: i64,
    pub responsible_group_id: String,
    pub next_scheduler_date: i64,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields accepted when creating a recurring task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecurringTask {
    pub house_id: String,
    pub name: String,
    pub description: Option<String>,
    pub freq_base: i64,
    pub freq_offset: i64,
    pub time_limit: i64,
    pub schedule_offset: i64,
    pub points: i64,
    pub penalty: i64,
    pub responsible_group_id: String,
}

/// An open, assigned occurrence of a recurring task.
///
/// Points and penalty are snapshotted from the task at materialization time,
/// so the eventual completed record reflects the reward that was promised
/// when the instance was created, not whatever the task says later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub task_id: String,
    pub responsible_person_id: String,
    pub start_date: i64,
    pub due_date: i64,
    pub points: i64,
    pub penalty: i64,
}

/// A closed record of a task occurrence.
///
/// `penalised` is true iff the instance was closed by the overdue sweep
/// rather than by an explicit mark-done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedTask {
    pub id: String,
    pub task_id: String,
    pub responsible_person_id: String,
    pub start_date: i64,
    pub due_date: i64,
    pub completion_date: i64,
    pub points: i64,
    pub penalty: i64,
    pub penalised: bool,
}

/// A complaint attached to a completed task. At most one per
/// (completed task, complainer) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    pub completed_task_id: String,
    pub complainer_person_id: String,
    pub complaint_date: i64,
    pub message: String,
}

/// Tenant boundary: a group of persons sharing tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct House {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub house_id: String,
    pub name: String,
    pub created_at: i64,
}

/// Subset of house members eligible for assignment to a recurring task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub house_id: String,
    pub name: String,
    pub created_at: i64,
}
