//! Open scheduled instances: materialization, overdue lookup, reassignment.

use super::houses::{group_member_ids_tx, load_scores_tx};
use super::{Database, new_id};
use crate::error::{CoreError, CoreResult};
use crate::rotation;
use crate::types::{RecurringTask, ScheduledTask};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

pub(crate) fn parse_scheduled_row(row: &Row) -> rusqlite::Result<ScheduledTask> {
    Ok(ScheduledTask {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        responsible_person_id: row.get("responsible_person_id")?,
        start_date: row.get("start_date")?,
        due_date: row.get("due_date")?,
        points: row.get("points")?,
        penalty: row.get("penalty")?,
    })
}

pub(crate) fn get_scheduled_tx(
    conn: &Connection,
    instance_id: &str,
) -> Result<Option<ScheduledTask>> {
    let mut stmt = conn.prepare("SELECT * FROM scheduled_tasks WHERE id = ?1")?;
    match stmt.query_row(params![instance_id], parse_scheduled_row) {
        Ok(instance) => Ok(Some(instance)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The single-instance-in-flight check. Must run inside the same transaction
/// as the insert that depends on it.
pub(crate) fn open_instance_for_task_tx(
    conn: &Connection,
    task_id: &str,
) -> Result<Option<ScheduledTask>> {
    let mut stmt = conn.prepare("SELECT * FROM scheduled_tasks WHERE task_id = ?1 LIMIT 1")?;
    match stmt.query_row(params![task_id], parse_scheduled_row) {
        Ok(instance) => Ok(Some(instance)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    pub fn get_scheduled_task(&self, instance_id: &str) -> Result<Option<ScheduledTask>> {
        self.with_conn(|conn| get_scheduled_tx(conn, instance_id))
    }

    /// The open instance for a task, if any.
    pub fn open_instance_for_task(&self, task_id: &str) -> Result<Option<ScheduledTask>> {
        self.with_conn(|conn| open_instance_for_task_tx(conn, task_id))
    }

    /// Open instances past their due date, oldest first, bounded batch.
    pub fn overdue_scheduled_tasks(&self, now: i64, limit: usize) -> Result<Vec<ScheduledTask>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM scheduled_tasks
                 WHERE due_date < ?1
                 ORDER BY due_date ASC
                 LIMIT ?2",
            )?;
            let instances = stmt
                .query_map(params![now, limit as i64], parse_scheduled_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(instances)
        })
    }

    /// Materialize the next instance of a recurring task.
    ///
    /// One transaction covers the whole transition: the already-open check,
    /// the membership and load-score reads feeding the rotation policy, the
    /// instance insert, and the next_scheduler_date advance. Either the
    /// instance exists and the marker moved forward by one period, or
    /// nothing changed.
    ///
    /// Errors: `Conflict` if the task already has an open instance,
    /// `NoCandidates` if the responsible group is empty. In both cases
    /// next_scheduler_date is left untouched so the task is retried on the
    /// next tick.
    pub fn materialize_for_task(
        &self,
        task: &RecurringTask,
        now: i64,
    ) -> CoreResult<ScheduledTask> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if open_instance_for_task_tx(&tx, &task.id)?.is_some() {
                return Err(anyhow::Error::new(CoreError::conflict(format!(
                    "Task {} already has an open instance",
                    task.id
                ))));
            }

            let members = group_member_ids_tx(&tx, &task.responsible_group_id)?;
            let scores = load_scores_tx(&tx, &task.house_id)?;
            let assignee = rotation::select_assignee(&task.responsible_group_id, &members, &scores)
                .map_err(anyhow::Error::new)?;

            let instance = ScheduledTask {
                id: new_id(),
                task_id: task.id.clone(),
                responsible_person_id: assignee,
                start_date: now,
                due_date: now + task.time_limit,
                points: task.points,
                penalty: task.penalty,
            };

            tx.execute(
                "INSERT INTO scheduled_tasks (
                    id, task_id, responsible_person_id,
                    start_date, due_date, points, penalty
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    instance.id,
                    instance.task_id,
                    instance.responsible_person_id,
                    instance.start_date,
                    instance.due_date,
                    instance.points,
                    instance.penalty,
                ],
            )?;

            // Advance by the period, not to "now", so a late tick does not
            // compound into recurrence drift.
            tx.execute(
                "UPDATE recurring_tasks
                 SET next_scheduler_date = next_scheduler_date + freq_offset, updated_at = ?2
                 WHERE id = ?1",
                params![task.id, now],
            )?;

            tx.commit()?;
            Ok(instance)
        })
        .map_err(CoreError::from)
    }

    /// Reassign an open instance to another person.
    pub fn reassign_scheduled_task(&self, instance_id: &str, person_id: &str) -> CoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE scheduled_tasks SET responsible_person_id = ?2 WHERE id = ?1",
                params![instance_id, person_id],
            )?;
            if changed == 0 {
                return Err(anyhow::Error::new(CoreError::not_found(
                    "Scheduled task",
                    instance_id,
                )));
            }
            Ok(())
        })
        .map_err(CoreError::from)
    }
}
