//! Recurring task definition CRUD and the due-for-scheduling query.

use super::{Database, new_id};
use crate::types::{NewRecurringTask, RecurringTask};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<RecurringTask> {
    Ok(RecurringTask {
        id: row.get("id")?,
        house_id: row.get("house_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        freq_base: row.get("freq_base")?,
        freq_offset: row.get("freq_offset")?,
        time_limit: row.get("time_limit")?,
        schedule_offset: row.get("schedule_offset")?,
        points: row.get("points")?,
        penalty: row.get("penalty")?,
        responsible_group_id: row.get("responsible_group_id")?,
        next_scheduler_date: row.get("next_scheduler_date")?,
        active: row.get("active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Lookup usable inside an existing transaction.
pub(crate) fn get_task_tx(conn: &Connection, task_id: &str) -> Result<Option<RecurringTask>> {
    let mut stmt = conn.prepare("SELECT * FROM recurring_tasks WHERE id = ?1")?;
    match stmt.query_row(params![task_id], parse_task_row) {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Create a recurring task. The scheduler first considers it at
    /// `freq_base - schedule_offset`.
    pub fn create_recurring_task(&self, input: NewRecurringTask, now: i64) -> Result<RecurringTask> {
        let task = RecurringTask {
            id: new_id(),
            house_id: input.house_id,
            name: input.name,
            description: input.description,
            freq_base: input.freq_base,
            freq_offset: input.freq_offset,
            time_limit: input.time_limit,
            schedule_offset: input.schedule_offset,
            points: input.points,
            penalty: input.penalty,
            responsible_group_id: input.responsible_group_id,
            next_scheduler_date: input.freq_base - input.schedule_offset,
            active: true,
            created_at: now,
            updated_at: now,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO recurring_tasks (
                    id, house_id, name, description,
                    freq_base, freq_offset, time_limit, schedule_offset,
                    points, penalty, responsible_group_id,
                    next_scheduler_date, active, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    task.id,
                    task.house_id,
                    task.name,
                    task.description,
                    task.freq_base,
                    task.freq_offset,
                    task.time_limit,
                    task.schedule_offset,
                    task.points,
                    task.penalty,
                    task.responsible_group_id,
                    task.next_scheduler_date,
                    task.active,
                    task.created_at,
                    task.updated_at,
                ],
            )?;
            Ok(())
        })?;

        Ok(task)
    }

    pub fn get_recurring_task(&self, task_id: &str) -> Result<Option<RecurringTask>> {
        self.with_conn(|conn| get_task_tx(conn, task_id))
    }

    /// Update the editable fields of a task definition. The recurrence
    /// anchor and next_scheduler_date are deliberately not touched here;
    /// only the scheduler advances the marker.
    pub fn update_recurring_task(
        &self,
        task_id: &str,
        name: Option<&str>,
        description: Option<&str>,
        points: Option<i64>,
        penalty: Option<i64>,
        time_limit: Option<i64>,
        now: i64,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE recurring_tasks SET
                    name = COALESCE(?2, name),
                    description = COALESCE(?3, description),
                    points = COALESCE(?4, points),
                    penalty = COALESCE(?5, penalty),
                    time_limit = COALESCE(?6, time_limit),
                    updated_at = ?7
                 WHERE id = ?1",
                params![task_id, name, description, points, penalty, time_limit, now],
            )?;
            Ok(changed > 0)
        })
    }

    /// Pause or resume scheduling for a task. Inactive tasks are skipped by
    /// the due query; open instances are unaffected.
    pub fn set_task_active(&self, task_id: &str, active: bool, now: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE recurring_tasks SET active = ?2, updated_at = ?3 WHERE id = ?1",
                params![task_id, active, now],
            )?;
            Ok(changed > 0)
        })
    }

    /// Delete a task definition. Open and closed instances cascade.
    pub fn delete_recurring_task(&self, task_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM recurring_tasks WHERE id = ?1",
                params![task_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Active tasks whose next_scheduler_date has passed, oldest first,
    /// bounded so one tick cannot grow without limit.
    pub fn due_recurring_tasks(&self, now: i64, limit: usize) -> Result<Vec<RecurringTask>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM recurring_tasks
                 WHERE active = 1 AND next_scheduler_date < ?1
                 ORDER BY next_scheduler_date ASC
                 LIMIT ?2",
            )?;
            let tasks = stmt
                .query_map(params![now, limit as i64], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    pub fn list_house_tasks(&self, house_id: &str) -> Result<Vec<RecurringTask>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM recurring_tasks WHERE house_id = ?1 ORDER BY created_at ASC",
            )?;
            let tasks = stmt
                .query_map(params![house_id], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }
}
