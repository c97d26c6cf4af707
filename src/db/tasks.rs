//! Task catalog: global templates and per-customer custom tasks.
//!
//! Each (phase, scope) partition keeps its own `sort_order` sequence. New and
//! re-parented tasks are always appended at `max + 1`.

use super::{Database, new_id, now_ms};
use crate::error::ServiceError;
use crate::types::{
    Direction, Phase, Task, TaskDefinition, TaskOwner, TaskScope, TaskUpdate, is_valid_phase,
};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let owner: String = row.get("owner")?;
    Ok(Task {
        id: row.get("id")?,
        phase: row.get("phase")?,
        phase_name: row.get("phase_name")?,
        task_name: row.get("task_name")?,
        description: row.get("description")?,
        owner: TaskOwner::parse(&owner).unwrap_or_default(),
        est_time: row.get("est_time")?,
        sort_order: row.get("sort_order")?,
        is_success_gate: row.get("is_success_gate")?,
        unlocks_report: row.get("unlocks_report")?,
        requires_upload: row.get("requires_upload")?,
        customer_id: row.get("customer_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
    match stmt.query_row(params![task_id], parse_task_row) {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn require_task(conn: &Connection, task_id: &str) -> Result<Task> {
    get_task_internal(conn, task_id)?.ok_or_else(|| ServiceError::task_not_found(task_id).into())
}

/// Next free sort order in a (phase, scope) partition.
fn next_sort_order(conn: &Connection, phase: Phase, customer_id: Option<&str>) -> Result<i32> {
    let max: Option<i32> = conn.query_row(
        "SELECT MAX(sort_order) FROM tasks WHERE phase = ?1 AND customer_id IS ?2",
        params![phase, customer_id],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

fn validate_definition(def: &TaskDefinition) -> Result<()> {
    if def.task_name.trim().is_empty() {
        return Err(ServiceError::missing_field("task_name").into());
    }
    if !is_valid_phase(def.phase) {
        return Err(ServiceError::invalid_value("phase", "phase must be between 0 and 4").into());
    }
    Ok(())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[allow(clippy::too_many_arguments)]
fn insert_task_row(
    conn: &Connection,
    id: &str,
    def: &TaskDefinition,
    phase_name: &str,
    sort_order: i32,
    customer_id: Option<&str>,
    now: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO tasks (
            id, phase, phase_name, task_name, description, owner, est_time, sort_order,
            is_success_gate, unlocks_report, requires_upload, customer_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            id,
            def.phase,
            phase_name,
            def.task_name.trim(),
            &def.description,
            def.owner.as_str(),
            &def.est_time,
            sort_order,
            def.is_success_gate,
            &def.unlocks_report,
            def.requires_upload,
            customer_id,
            now,
            now,
        ],
    )?;
    Ok(())
}

impl Database {
    /// Create a task and fan out pending progress rows.
    ///
    /// Global tasks get one row per existing customer; custom tasks get one
    /// row for their customer. Both happen in the same transaction.
    pub fn create_task(
        &self,
        def: TaskDefinition,
        scope: TaskScope,
        phase_name: &str,
    ) -> Result<Task> {
        validate_definition(&def)?;
        let def = TaskDefinition {
            description: blank_to_none(def.description),
            est_time: blank_to_none(def.est_time),
            unlocks_report: blank_to_none(def.unlocks_report),
            ..def
        };
        let id = new_id();
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let customer_ids: Vec<String> = match &scope {
                TaskScope::Global => {
                    let mut stmt = tx.prepare("SELECT id FROM customers ORDER BY created_at")?;
                    stmt.query_map([], |row| row.get(0))?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                }
                TaskScope::Customer(customer_id) => {
                    if super::customers::get_customer_internal(&tx, customer_id)?.is_none() {
                        return Err(ServiceError::customer_not_found(customer_id).into());
                    }
                    vec![customer_id.clone()]
                }
            };

            let sort_order = next_sort_order(&tx, def.phase, scope.customer_id())?;
            insert_task_row(&tx, &id, &def, phase_name, sort_order, scope.customer_id(), now)?;

            for customer_id in &customer_ids {
                super::progress::insert_progress_row(&tx, customer_id, &id, now)?;
            }

            let task = require_task(&tx, &id)?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Get a task by id.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// All tasks in catalog order (phase, then sort order).
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks
                 ORDER BY phase, customer_id IS NOT NULL, customer_id, sort_order",
            )?;
            let tasks = stmt
                .query_map([], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Update task fields in place. Phase, sort order and scope are untouched.
    pub fn update_task(&self, task_id: &str, update: TaskUpdate) -> Result<Task> {
        if update.task_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ServiceError::missing_field("task_name").into());
        }
        let now = now_ms();

        self.with_conn(|conn| {
            let mut task = require_task(conn, task_id)?;

            if let Some(name) = update.task_name {
                task.task_name = name.trim().to_string();
            }
            if let Some(description) = update.description {
                task.description = blank_to_none(description);
            }
            if let Some(owner) = update.owner {
                task.owner = owner;
            }
            if let Some(est_time) = update.est_time {
                task.est_time = blank_to_none(est_time);
            }
            if let Some(gate) = update.is_success_gate {
                task.is_success_gate = gate;
            }
            if let Some(unlocks) = update.unlocks_report {
                task.unlocks_report = blank_to_none(unlocks);
            }
            if let Some(requires_upload) = update.requires_upload {
                task.requires_upload = requires_upload;
            }
            task.updated_at = now;

            conn.execute(
                "UPDATE tasks SET task_name = ?1, description = ?2, owner = ?3, est_time = ?4,
                    is_success_gate = ?5, unlocks_report = ?6, requires_upload = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    &task.task_name,
                    &task.description,
                    task.owner.as_str(),
                    &task.est_time,
                    task.is_success_gate,
                    &task.unlocks_report,
                    task.requires_upload,
                    now,
                    task_id,
                ],
            )?;

            Ok(task)
        })
    }

    /// Delete a task and everything hanging off it, children first.
    /// Returns the number of progress rows removed.
    pub fn delete_task(&self, task_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_task(&tx, task_id)?;

            tx.execute(
                "DELETE FROM task_comments WHERE progress_id IN
                    (SELECT id FROM customer_progress WHERE task_id = ?1)",
                params![task_id],
            )?;
            let progress_rows =
                tx.execute("DELETE FROM customer_progress WHERE task_id = ?1", params![task_id])?;
            tx.execute("DELETE FROM task_files WHERE task_id = ?1", params![task_id])?;
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;

            tx.commit()?;
            Ok(progress_rows)
        })
    }

    /// Fork a global task into one customer's scope.
    ///
    /// The copy gets `suffix` appended to its name, keeps the phase, goes to
    /// the end of the customer's partition, and gets exactly one progress row.
    pub fn duplicate_for_customer(
        &self,
        task_id: &str,
        customer_id: &str,
        suffix: &str,
    ) -> Result<Task> {
        let id = new_id();
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let source = require_task(&tx, task_id)?;
            if !source.is_global() {
                return Err(ServiceError::invalid_state("Only global tasks can be duplicated")
                    .with_details(format!("task_id={}", task_id))
                    .into());
            }
            if super::customers::get_customer_internal(&tx, customer_id)?.is_none() {
                return Err(ServiceError::customer_not_found(customer_id).into());
            }

            let def = TaskDefinition {
                phase: source.phase,
                task_name: format!("{}{}", source.task_name, suffix),
                description: source.description,
                owner: source.owner,
                est_time: source.est_time,
                is_success_gate: source.is_success_gate,
                unlocks_report: source.unlocks_report,
                requires_upload: source.requires_upload,
            };
            let sort_order = next_sort_order(&tx, def.phase, Some(customer_id))?;
            insert_task_row(
                &tx,
                &id,
                &def,
                &source.phase_name,
                sort_order,
                Some(customer_id),
                now,
            )?;
            super::progress::insert_progress_row(&tx, customer_id, &id, now)?;

            let task = require_task(&tx, &id)?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Swap a task's sort order with its neighbor in the same (phase, scope).
    /// A no-op at either end of the list.
    pub fn move_in_direction(&self, task_id: &str, direction: Direction) -> Result<Task> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let task = require_task(&tx, task_id)?;

            let neighbor_sql = match direction {
                Direction::Up => {
                    "SELECT id, sort_order FROM tasks
                     WHERE phase = ?1 AND customer_id IS ?2 AND sort_order < ?3
                     ORDER BY sort_order DESC LIMIT 1"
                }
                Direction::Down => {
                    "SELECT id, sort_order FROM tasks
                     WHERE phase = ?1 AND customer_id IS ?2 AND sort_order > ?3
                     ORDER BY sort_order ASC LIMIT 1"
                }
            };
            let neighbor: Option<(String, i32)> = match tx.query_row(
                neighbor_sql,
                params![task.phase, &task.customer_id, task.sort_order],
                |row| Ok((row.get(0)?, row.get(1)?)),
            ) {
                Ok(n) => Some(n),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e.into()),
            };

            let Some((neighbor_id, neighbor_order)) = neighbor else {
                return Ok(task);
            };

            tx.execute(
                "UPDATE tasks SET sort_order = ?1, updated_at = ?2 WHERE id = ?3",
                params![neighbor_order, now, task_id],
            )?;
            tx.execute(
                "UPDATE tasks SET sort_order = ?1, updated_at = ?2 WHERE id = ?3",
                params![task.sort_order, now, &neighbor_id],
            )?;

            let moved = require_task(&tx, task_id)?;
            tx.commit()?;
            Ok(moved)
        })
    }

    /// Re-parent a task to another phase, appended at the end of that phase.
    /// Moving to the current phase is a no-op.
    pub fn move_to_phase(&self, task_id: &str, phase: Phase, phase_name: &str) -> Result<Task> {
        if !is_valid_phase(phase) {
            return Err(
                ServiceError::invalid_value("phase", "phase must be between 0 and 4").into(),
            );
        }
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let task = require_task(&tx, task_id)?;
            if task.phase == phase {
                return Ok(task);
            }

            let sort_order = next_sort_order(&tx, phase, task.customer_id.as_deref())?;
            tx.execute(
                "UPDATE tasks SET phase = ?1, phase_name = ?2, sort_order = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![phase, phase_name, sort_order, now, task_id],
            )?;

            let moved = require_task(&tx, task_id)?;
            tx.commit()?;
            Ok(moved)
        })
    }
}
