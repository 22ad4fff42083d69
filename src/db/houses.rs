//! Houses, persons, groups, and the membership/fairness queries the
//! scheduler depends on. House and group CRUD proper belongs to the API
//! layer; this module carries the minimal surface the core consumes.

use super::{Database, new_id};
use crate::types::{Group, House, Person};
use anyhow::Result;
use rusqlite::{Connection, params};
use std::collections::HashMap;

/// Membership read used inside transactions.
pub(crate) fn group_member_ids_tx(conn: &Connection, group_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT person_id FROM group_members WHERE group_id = ?1 ORDER BY person_id",
    )?;
    let ids = stmt
        .query_map(params![group_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Net load score per person: points earned on time minus penalties accrued.
/// Persons with no history are absent from the map; callers treat that as 0.
pub(crate) fn load_scores_tx(
    conn: &Connection,
    house_id: &str,
) -> rusqlite::Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare(
        "SELECT c.responsible_person_id,
                SUM(CASE WHEN c.penalised THEN -c.penalty ELSE c.points END)
         FROM completed_tasks c
         JOIN recurring_tasks t ON t.id = c.task_id
         WHERE t.house_id = ?1
         GROUP BY c.responsible_person_id",
    )?;
    let scores = stmt
        .query_map(params![house_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(scores)
}

impl Database {
    pub fn create_house(&self, name: &str, now: i64) -> Result<House> {
        let house = House {
            id: new_id(),
            name: name.to_string(),
            created_at: now,
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO houses (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![house.id, house.name, house.created_at],
            )?;
            Ok(())
        })?;
        Ok(house)
    }

    pub fn create_person(&self, house_id: &str, name: &str, now: i64) -> Result<Person> {
        let person = Person {
            id: new_id(),
            house_id: house_id.to_string(),
            name: name.to_string(),
            created_at: now,
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO persons (id, house_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![person.id, person.house_id, person.name, person.created_at],
            )?;
            Ok(())
        })?;
        Ok(person)
    }

    pub fn create_group(&self, house_id: &str, name: &str, now: i64) -> Result<Group> {
        let group = Group {
            id: new_id(),
            house_id: house_id.to_string(),
            name: name.to_string(),
            created_at: now,
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO task_groups (id, house_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![group.id, group.house_id, group.name, group.created_at],
            )?;
            Ok(())
        })?;
        Ok(group)
    }

    pub fn add_group_member(&self, group_id: &str, person_id: &str, now: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO group_members (group_id, person_id, added_at)
                 VALUES (?1, ?2, ?3)",
                params![group_id, person_id, now],
            )?;
            Ok(())
        })
    }

    pub fn remove_group_member(&self, group_id: &str, person_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM group_members WHERE group_id = ?1 AND person_id = ?2",
                params![group_id, person_id],
            )?;
            Ok(())
        })
    }

    /// Person ids currently in the group, in stable (ascending id) order.
    pub fn group_member_ids(&self, group_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| Ok(group_member_ids_tx(conn, group_id)?))
    }

    /// Whether the person belongs to the house.
    pub fn is_house_member(&self, person_id: &str, house_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM persons WHERE id = ?1 AND house_id = ?2",
                params![person_id, house_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Fairness metric for one person: net points minus penalties across the
    /// house's completed records. No history means 0.
    pub fn person_load_score(&self, person_id: &str, house_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let scores = load_scores_tx(conn, house_id)?;
            Ok(scores.get(person_id).copied().unwrap_or(0))
        })
    }
}
