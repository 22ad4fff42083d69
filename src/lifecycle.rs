//! Synchronous task lifecycle operations invoked by the API layer.
//!
//! State machine per occurrence:
//! Scheduled → (mark_done) → Completed(penalised=false);
//! Scheduled → (overdue sweep) → Completed(penalised=true);
//! Completed → (mark_undone) → Scheduled (original dates restored);
//! Scheduled → (delegate) → Scheduled (reassigned);
//! Completed → (complain) → Completed (complaint attached).
//!
//! Preconditions are checked in a fixed order, each with its own error
//! kind: actor is a house member, then the target exists and belongs to the
//! house, then any operation-specific membership check.

use crate::clock::Clock;
use crate::db::Database;
use crate::error::{CoreError, CoreResult};
use crate::types::{CompletedTask, Complaint, ScheduledTask};
use std::sync::Arc;
use tracing::debug;

/// Lifecycle service. Constructed once at startup next to the scheduler,
/// shared with the API layer by reference.
pub struct Lifecycle {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl Lifecycle {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Close an open instance as completed on time.
    pub fn mark_done(
        &self,
        actor_id: &str,
        house_id: &str,
        scheduled_id: &str,
    ) -> CoreResult<CompletedTask> {
        self.require_house_member(actor_id, house_id)?;
        self.require_scheduled_in_house(scheduled_id, house_id)?;

        let record =
            self.db
                .close_scheduled_as_completed(scheduled_id, self.clock.now_ms(), false)?;
        debug!(completed_id = %record.id, actor = %actor_id, "instance marked done");
        Ok(record)
    }

    /// Reverse a completion, restoring the original scheduled instance.
    pub fn mark_undone(
        &self,
        actor_id: &str,
        house_id: &str,
        completed_id: &str,
    ) -> CoreResult<ScheduledTask> {
        self.require_house_member(actor_id, house_id)?;
        self.require_completed_in_house(completed_id, house_id)?;

        let instance = self.db.reopen_completed_as_scheduled(completed_id)?;
        debug!(instance_id = %instance.id, actor = %actor_id, "completion undone");
        Ok(instance)
    }

    /// Hand an open instance to another house member.
    pub fn delegate(
        &self,
        actor_id: &str,
        house_id: &str,
        scheduled_id: &str,
        new_person_id: &str,
    ) -> CoreResult<ScheduledTask> {
        self.require_house_member(actor_id, house_id)?;
        self.require_scheduled_in_house(scheduled_id, house_id)?;
        if !self
            .db
            .is_house_member(new_person_id, house_id)
            .map_err(CoreError::from)?
        {
            return Err(CoreError::precondition_failed(format!(
                "Person {} is not a member of house {}",
                new_person_id, house_id
            )));
        }

        self.db
            .reassign_scheduled_task(scheduled_id, new_person_id)?;
        let instance = self
            .db
            .get_scheduled_task(scheduled_id)
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::not_found("Scheduled task", scheduled_id))?;
        debug!(
            instance_id = %instance.id,
            from = %actor_id,
            to = %new_person_id,
            "instance delegated"
        );
        Ok(instance)
    }

    /// Attach a complaint to a completed record. Does not change lifecycle
    /// state; one complaint per (record, complainer) pair.
    pub fn complain(
        &self,
        actor_id: &str,
        house_id: &str,
        completed_id: &str,
        message: &str,
    ) -> CoreResult<Complaint> {
        self.require_house_member(actor_id, house_id)?;
        self.require_completed_in_house(completed_id, house_id)?;

        self.db
            .add_complaint(completed_id, actor_id, self.clock.now_ms(), message)
    }

    // Precondition helpers

    fn require_house_member(&self, person_id: &str, house_id: &str) -> CoreResult<()> {
        let member = self
            .db
            .is_house_member(person_id, house_id)
            .map_err(CoreError::from)?;
        if !member {
            return Err(CoreError::precondition_failed(format!(
                "Person {} is not a member of house {}",
                person_id, house_id
            )));
        }
        Ok(())
    }

    fn require_scheduled_in_house(&self, scheduled_id: &str, house_id: &str) -> CoreResult<()> {
        let instance = self
            .db
            .get_scheduled_task(scheduled_id)
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::not_found("Scheduled task", scheduled_id))?;
        self.require_task_in_house(&instance.task_id, house_id)
    }

    fn require_completed_in_house(&self, completed_id: &str, house_id: &str) -> CoreResult<()> {
        let record = self
            .db
            .get_completed_task(completed_id)
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::not_found("Completed task", completed_id))?;
        self.require_task_in_house(&record.task_id, house_id)
    }

    fn require_task_in_house(&self, task_id: &str, house_id: &str) -> CoreResult<()> {
        let task = self
            .db
            .get_recurring_task(task_id)
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::not_found("Task", task_id))?;
        if task.house_id != house_id {
            return Err(CoreError::not_found("Task in house", task_id));
        }
        Ok(())
    }
}
