//! Reports and task template files.

use super::{Database, new_id, now_ms};
use crate::error::ServiceError;
use crate::types::{FileType, NewReport, NewTaskFile, Report, TaskFile, is_valid_phase};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

fn parse_report_row(row: &Row) -> rusqlite::Result<Report> {
    Ok(Report {
        id: row.get("id")?,
        name: row.get("name")?,
        phase: row.get("phase")?,
        description: row.get("description")?,
        key_metric: row.get("key_metric")?,
        report_url: row.get("report_url")?,
        sort_order: row.get("sort_order")?,
        unlocking_task_id: row.get("unlocking_task_id")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_task_file_row(row: &Row) -> rusqlite::Result<TaskFile> {
    let file_type: String = row.get("file_type")?;
    Ok(TaskFile {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        url: row.get("url")?,
        file_type: FileType::parse(&file_type).unwrap_or_default(),
        is_optional: row.get("is_optional")?,
        sort_order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
    })
}

fn get_task_file_internal(conn: &Connection, file_id: &str) -> Result<Option<TaskFile>> {
    let mut stmt = conn.prepare("SELECT * FROM task_files WHERE id = ?1")?;
    match stmt.query_row(params![file_id], parse_task_file_row) {
        Ok(file) => Ok(Some(file)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Create a report at the end of the report list.
    pub fn create_report(&self, input: NewReport) -> Result<Report> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::missing_field("name").into());
        }
        if !is_valid_phase(input.phase) {
            return Err(
                ServiceError::invalid_value("phase", "phase must be between 0 and 4").into(),
            );
        }
        let id = new_id();
        let now = now_ms();

        self.with_conn(|conn| {
            if let Some(task_id) = &input.unlocking_task_id {
                if super::tasks::get_task_internal(conn, task_id)?.is_none() {
                    return Err(ServiceError::task_not_found(task_id).into());
                }
            }

            let max: Option<i32> =
                conn.query_row("SELECT MAX(sort_order) FROM reports", [], |row| row.get(0))?;
            let sort_order = max.unwrap_or(0) + 1;

            conn.execute(
                "INSERT INTO reports (
                    id, name, phase, description, key_metric, report_url, sort_order,
                    unlocking_task_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    &id,
                    &name,
                    input.phase,
                    &input.description,
                    &input.key_metric,
                    &input.report_url,
                    sort_order,
                    &input.unlocking_task_id,
                    now,
                ],
            )?;

            Ok(Report {
                id,
                name,
                phase: input.phase,
                description: input.description,
                key_metric: input.key_metric,
                report_url: input.report_url,
                sort_order,
                unlocking_task_id: input.unlocking_task_id,
                created_at: now,
            })
        })
    }

    /// All reports in display order.
    pub fn list_reports(&self) -> Result<Vec<Report>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM reports ORDER BY sort_order, created_at")?;
            let reports = stmt
                .query_map([], parse_report_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(reports)
        })
    }

    /// Attach a reference document to a task definition.
    pub fn add_task_file(&self, task_id: &str, input: NewTaskFile) -> Result<TaskFile> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::missing_field("name").into());
        }
        if input.url.trim().is_empty() {
            return Err(ServiceError::missing_field("url").into());
        }
        let id = new_id();
        let now = now_ms();

        self.with_conn(|conn| {
            if super::tasks::get_task_internal(conn, task_id)?.is_none() {
                return Err(ServiceError::task_not_found(task_id).into());
            }

            let max: Option<i32> = conn.query_row(
                "SELECT MAX(sort_order) FROM task_files WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )?;
            let sort_order = max.unwrap_or(0) + 1;

            conn.execute(
                "INSERT INTO task_files (
                    id, task_id, name, description, url, file_type, is_optional, sort_order,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    &id,
                    task_id,
                    &name,
                    &input.description,
                    &input.url,
                    input.file_type.as_str(),
                    input.is_optional,
                    sort_order,
                    now,
                ],
            )?;

            Ok(TaskFile {
                id,
                task_id: task_id.to_string(),
                name,
                description: input.description,
                url: input.url,
                file_type: input.file_type,
                is_optional: input.is_optional,
                sort_order,
                created_at: now,
            })
        })
    }

    /// All task files, grouped by task in display order.
    pub fn list_task_files(&self) -> Result<Vec<TaskFile>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM task_files ORDER BY task_id, sort_order")?;
            let files = stmt
                .query_map([], parse_task_file_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(files)
        })
    }

    /// Files attached to one task, in display order.
    pub fn list_task_files_for_task(&self, task_id: &str) -> Result<Vec<TaskFile>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM task_files WHERE task_id = ?1 ORDER BY sort_order")?;
            let files = stmt
                .query_map(params![task_id], parse_task_file_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(files)
        })
    }

    /// Delete a task file. Returns the removed row.
    pub fn delete_task_file(&self, file_id: &str) -> Result<TaskFile> {
        self.with_conn(|conn| {
            let file = get_task_file_internal(conn, file_id)?
                .ok_or_else(|| ServiceError::task_file_not_found(file_id))?;
            conn.execute("DELETE FROM task_files WHERE id = ?1", params![file_id])?;
            Ok(file)
        })
    }
}
