//! Progress ledger: per-(customer, task) completion and verification state.
//!
//! Transitions:
//! - `mark_complete`: pending -> completed (stale verification is cleared)
//! - `mark_incomplete`: completed/verified -> pending (verification is always cleared)
//! - `verify`: completed -> verified (rejected on pending rows)
//! - `unverify`: verified -> completed
//!
//! `is_skipped` is orthogonal to the three states.

use super::{Database, json_column, new_id, now_ms};
use crate::error::ServiceError;
use crate::types::{CustomerProgress, UploadedFile};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

pub fn parse_progress_row(row: &Row) -> rusqlite::Result<CustomerProgress> {
    let files_json: Option<String> = row.get("files")?;
    Ok(CustomerProgress {
        id: row.get("id")?,
        customer_id: row.get("customer_id")?,
        task_id: row.get("task_id")?,
        completed: row.get("completed")?,
        completed_at: row.get("completed_at")?,
        verified: row.get("verified")?,
        verified_at: row.get("verified_at")?,
        verified_by: row.get("verified_by")?,
        is_skipped: row.get("is_skipped")?,
        files: json_column::<Vec<UploadedFile>>(files_json),
        notes: row.get("notes")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Insert a pending progress row. Existing (customer, task) pairs are left alone.
pub(crate) fn insert_progress_row(
    conn: &Connection,
    customer_id: &str,
    task_id: &str,
    now: i64,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO customer_progress (id, customer_id, task_id, files, updated_at)
         VALUES (?1, ?2, ?3, '[]', ?4)",
        params![new_id(), customer_id, task_id, now],
    )?;
    Ok(())
}

pub(crate) fn get_progress_internal(
    conn: &Connection,
    progress_id: &str,
) -> Result<Option<CustomerProgress>> {
    let mut stmt = conn.prepare("SELECT * FROM customer_progress WHERE id = ?1")?;
    match stmt.query_row(params![progress_id], parse_progress_row) {
        Ok(progress) => Ok(Some(progress)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn require_progress(conn: &Connection, progress_id: &str) -> Result<CustomerProgress> {
    get_progress_internal(conn, progress_id)?
        .ok_or_else(|| ServiceError::progress_not_found(progress_id).into())
}

impl Database {
    /// Get a progress row by id.
    pub fn get_progress(&self, progress_id: &str) -> Result<Option<CustomerProgress>> {
        self.with_conn(|conn| get_progress_internal(conn, progress_id))
    }

    /// Find the progress row for a (customer, task) pair.
    pub fn find_progress(
        &self,
        customer_id: &str,
        task_id: &str,
    ) -> Result<Option<CustomerProgress>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM customer_progress WHERE customer_id = ?1 AND task_id = ?2",
            )?;
            match stmt.query_row(params![customer_id, task_id], parse_progress_row) {
                Ok(progress) => Ok(Some(progress)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// All progress rows.
    pub fn list_progress(&self) -> Result<Vec<CustomerProgress>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM customer_progress ORDER BY customer_id, id")?;
            let rows = stmt
                .query_map([], parse_progress_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Progress rows for one customer.
    pub fn list_progress_for_customer(&self, customer_id: &str) -> Result<Vec<CustomerProgress>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM customer_progress WHERE customer_id = ?1 ORDER BY id")?;
            let rows = stmt
                .query_map(params![customer_id], parse_progress_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Pending -> completed. A no-op on rows that are already completed.
    pub fn mark_complete(&self, progress_id: &str) -> Result<CustomerProgress> {
        let now = now_ms();
        self.with_conn(|conn| {
            let progress = require_progress(conn, progress_id)?;
            if progress.completed {
                return Ok(progress);
            }
            conn.execute(
                "UPDATE customer_progress
                 SET completed = 1, completed_at = ?1,
                     verified = 0, verified_at = NULL, verified_by = NULL,
                     updated_at = ?1
                 WHERE id = ?2",
                params![now, progress_id],
            )?;
            require_progress(conn, progress_id)
        })
    }

    /// Completed/verified -> pending. Always clears verification.
    pub fn mark_incomplete(&self, progress_id: &str) -> Result<CustomerProgress> {
        let now = now_ms();
        self.with_conn(|conn| {
            let progress = require_progress(conn, progress_id)?;
            if !progress.completed && !progress.verified {
                return Ok(progress);
            }
            conn.execute(
                "UPDATE customer_progress
                 SET completed = 0, completed_at = NULL,
                     verified = 0, verified_at = NULL, verified_by = NULL,
                     updated_at = ?1
                 WHERE id = ?2",
                params![now, progress_id],
            )?;
            require_progress(conn, progress_id)
        })
    }

    /// Completed -> verified, stamped with the staff member's display name.
    ///
    /// Fails on pending rows; already-verified rows keep their original stamp.
    pub fn verify(&self, progress_id: &str, verified_by: &str) -> Result<CustomerProgress> {
        let now = now_ms();
        self.with_conn(|conn| {
            let progress = require_progress(conn, progress_id)?;
            if !progress.completed {
                return Err(ServiceError::invalid_state(
                    "Cannot verify a task that has not been completed",
                )
                .with_details(format!("progress_id={}", progress_id))
                .into());
            }
            if progress.verified {
                return Ok(progress);
            }
            conn.execute(
                "UPDATE customer_progress
                 SET verified = 1, verified_at = ?1, verified_by = ?2, updated_at = ?1
                 WHERE id = ?3",
                params![now, verified_by, progress_id],
            )?;
            require_progress(conn, progress_id)
        })
    }

    /// Verified -> completed. A no-op on rows that are not verified.
    pub fn unverify(&self, progress_id: &str) -> Result<CustomerProgress> {
        let now = now_ms();
        self.with_conn(|conn| {
            let progress = require_progress(conn, progress_id)?;
            if !progress.verified {
                return Ok(progress);
            }
            conn.execute(
                "UPDATE customer_progress
                 SET verified = 0, verified_at = NULL, verified_by = NULL, updated_at = ?1
                 WHERE id = ?2",
                params![now, progress_id],
            )?;
            require_progress(conn, progress_id)
        })
    }

    /// Flip the skip flag on a progress row.
    pub fn toggle_skip(&self, progress_id: &str) -> Result<CustomerProgress> {
        let now = now_ms();
        self.with_conn(|conn| {
            require_progress(conn, progress_id)?;
            conn.execute(
                "UPDATE customer_progress SET is_skipped = NOT is_skipped, updated_at = ?1
                 WHERE id = ?2",
                params![now, progress_id],
            )?;
            require_progress(conn, progress_id)
        })
    }

    /// Verify every completed, unverified row of a customer with one shared stamp.
    /// Returns the ids of the rows that were verified.
    pub fn verify_all(&self, customer_id: &str, verified_by: &str) -> Result<Vec<String>> {
        let now = now_ms();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if super::customers::get_customer_internal(&tx, customer_id)?.is_none() {
                return Err(ServiceError::customer_not_found(customer_id).into());
            }

            let ids: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM customer_progress
                     WHERE customer_id = ?1 AND completed = 1 AND verified = 0
                     ORDER BY id",
                )?;
                stmt.query_map(params![customer_id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            };

            tx.execute(
                "UPDATE customer_progress
                 SET verified = 1, verified_at = ?1, verified_by = ?2, updated_at = ?1
                 WHERE customer_id = ?3 AND completed = 1 AND verified = 0",
                params![now, verified_by, customer_id],
            )?;

            tx.commit()?;
            Ok(ids)
        })
    }

    /// Append an uploaded file reference. Existing entries are never replaced.
    pub fn attach_file(&self, progress_id: &str, file: UploadedFile) -> Result<CustomerProgress> {
        if file.name.trim().is_empty() {
            return Err(ServiceError::missing_field("name").into());
        }
        if file.url.trim().is_empty() {
            return Err(ServiceError::missing_field("url").into());
        }
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut progress = require_progress(&tx, progress_id)?;
            progress.files.push(file);

            tx.execute(
                "UPDATE customer_progress SET files = ?1, updated_at = ?2 WHERE id = ?3",
                params![serde_json::to_string(&progress.files)?, now, progress_id],
            )?;
            tx.commit()?;

            progress.updated_at = now;
            Ok(progress)
        })
    }
}
