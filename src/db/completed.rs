//! Closed task records: scheduled↔completed conversions and complaints.

use super::schedule::{get_scheduled_tx, open_instance_for_task_tx, parse_scheduled_row};
use super::{Database, new_id};
use crate::error::{CoreError, CoreResult};
use crate::types::{CompletedTask, Complaint, ScheduledTask};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

pub(crate) fn parse_completed_row(row: &Row) -> rusqlite::Result<CompletedTask> {
    Ok(CompletedTask {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        responsible_person_id: row.get("responsible_person_id")?,
        start_date: row.get("start_date")?,
        due_date: row.get("due_date")?,
        completion_date: row.get("completion_date")?,
        points: row.get("points")?,
        penalty: row.get("penalty")?,
        penalised: row.get("penalised")?,
    })
}

pub(crate) fn get_completed_tx(
    conn: &Connection,
    completed_id: &str,
) -> Result<Option<CompletedTask>> {
    let mut stmt = conn.prepare("SELECT * FROM completed_tasks WHERE id = ?1")?;
    match stmt.query_row(params![completed_id], parse_completed_row) {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    pub fn get_completed_task(&self, completed_id: &str) -> Result<Option<CompletedTask>> {
        self.with_conn(|conn| get_completed_tx(conn, completed_id))
    }

    /// Close an open instance as a completed record.
    ///
    /// Delete and insert share one transaction; points and penalty come from
    /// the instance snapshot, never re-read from the task. `penalised` marks
    /// closure by the overdue sweep rather than an explicit mark-done.
    pub fn close_scheduled_as_completed(
        &self,
        instance_id: &str,
        completion_date: i64,
        penalised: bool,
    ) -> CoreResult<CompletedTask> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let instance = get_scheduled_tx(&tx, instance_id)?.ok_or_else(|| {
                anyhow::Error::new(CoreError::not_found("Scheduled task", instance_id))
            })?;

            tx.execute(
                "DELETE FROM scheduled_tasks WHERE id = ?1",
                params![instance_id],
            )?;

            let record = CompletedTask {
                id: new_id(),
                task_id: instance.task_id,
                responsible_person_id: instance.responsible_person_id,
                start_date: instance.start_date,
                due_date: instance.due_date,
                completion_date,
                points: instance.points,
                penalty: instance.penalty,
                penalised,
            };

            tx.execute(
                "INSERT INTO completed_tasks (
                    id, task_id, responsible_person_id,
                    start_date, due_date, completion_date,
                    points, penalty, penalised
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.task_id,
                    record.responsible_person_id,
                    record.start_date,
                    record.due_date,
                    record.completion_date,
                    record.points,
                    record.penalty,
                    record.penalised,
                ],
            )?;

            tx.commit()?;
            Ok(record)
        })
        .map_err(CoreError::from)
    }

    /// Reverse a completion: delete the record and re-open a scheduled
    /// instance with the original task, assignee, and dates.
    ///
    /// Fails with `Conflict` if the task already grew another open instance
    /// in the meantime (the scheduler may have materialized the next
    /// occurrence); re-opening would break single-instance-in-flight.
    pub fn reopen_completed_as_scheduled(&self, completed_id: &str) -> CoreResult<ScheduledTask> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let record = get_completed_tx(&tx, completed_id)?.ok_or_else(|| {
                anyhow::Error::new(CoreError::not_found("Completed task", completed_id))
            })?;

            if open_instance_for_task_tx(&tx, &record.task_id)?.is_some() {
                return Err(anyhow::Error::new(CoreError::conflict(format!(
                    "Task {} already has an open instance; cannot undo completion",
                    record.task_id
                ))));
            }

            tx.execute(
                "DELETE FROM completed_tasks WHERE id = ?1",
                params![completed_id],
            )?;

            let instance = ScheduledTask {
                id: new_id(),
                task_id: record.task_id,
                responsible_person_id: record.responsible_person_id,
                start_date: record.start_date,
                due_date: record.due_date,
                points: record.points,
                penalty: record.penalty,
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

            tx.commit()?;
            Ok(instance)
        })
        .map_err(CoreError::from)
    }

    /// Attach a complaint to a completed record. A person may complain about
    /// a given record at most once.
    pub fn add_complaint(
        &self,
        completed_id: &str,
        complainer_person_id: &str,
        complaint_date: i64,
        message: &str,
    ) -> CoreResult<Complaint> {
        let complaint = Complaint {
            completed_task_id: completed_id.to_string(),
            complainer_person_id: complainer_person_id.to_string(),
            complaint_date,
            message: message.to_string(),
        };

        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO complaints (
                    completed_task_id, complainer_person_id, complaint_date, message
                ) VALUES (?1, ?2, ?3, ?4)",
                params![
                    complaint.completed_task_id,
                    complaint.complainer_person_id,
                    complaint.complaint_date,
                    complaint.message,
                ],
            );

            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(anyhow::Error::new(CoreError::conflict(format!(
                        "Person {} already complained about {}",
                        complainer_person_id, completed_id
                    ))))
                }
                Err(e) => Err(e.into()),
            }
        })
        .map_err(CoreError::from)?;

        Ok(complaint)
    }

    pub fn complaints_for_completed(&self, completed_id: &str) -> Result<Vec<Complaint>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT completed_task_id, complainer_person_id, complaint_date, message
                 FROM complaints WHERE completed_task_id = ?1
                 ORDER BY complaint_date ASC",
            )?;
            let complaints = stmt
                .query_map(params![completed_id], |row| {
                    Ok(Complaint {
                        completed_task_id: row.get(0)?,
                        complainer_person_id: row.get(1)?,
                        complaint_date: row.get(2)?,
                        message: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(complaints)
        })
    }

    /// Closed records for a house, newest first.
    pub fn list_house_history(&self, house_id: &str, limit: usize) -> Result<Vec<CompletedTask>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.* FROM completed_tasks c
                 JOIN recurring_tasks t ON t.id = c.task_id
                 WHERE t.house_id = ?1
                 ORDER BY c.completion_date DESC
                 LIMIT ?2",
            )?;
            let records = stmt
                .query_map(params![house_id, limit as i64], parse_completed_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }

    /// Open instances for a house, soonest due first.
    pub fn list_house_scheduled(&self, house_id: &str) -> Result<Vec<ScheduledTask>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.* FROM scheduled_tasks s
                 JOIN recurring_tasks t ON t.id = s.task_id
                 WHERE t.house_id = ?1
                 ORDER BY s.due_date ASC",
            )?;
            let instances = stmt
                .query_map(params![house_id], parse_scheduled_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(instances)
        })
    }
}
