//! Append-only comment threads on progress rows.

use super::{Database, new_id, now_ms};
use crate::error::ServiceError;
use crate::types::{AuthorRole, CommentAuthor, TaskComment};
use anyhow::Result;
use rusqlite::{Row, params};

fn parse_comment_row(row: &Row) -> rusqlite::Result<TaskComment> {
    let role: String = row.get("author_role")?;
    Ok(TaskComment {
        id: row.get("id")?,
        progress_id: row.get("progress_id")?,
        customer_id: row.get("customer_id")?,
        author_email: row.get("author_email")?,
        author_name: row.get("author_name")?,
        author_role: AuthorRole::parse(&role).unwrap_or(AuthorRole::Customer),
        message: row.get("message")?,
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// Append a comment to a progress row's thread.
    ///
    /// The customer id is copied from the progress row.
    pub fn post_comment(
        &self,
        progress_id: &str,
        author: &CommentAuthor,
        message: &str,
    ) -> Result<TaskComment> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ServiceError::missing_field("message").into());
        }
        let id = new_id();
        let now = now_ms();

        self.with_conn(|conn| {
            let progress = super::progress::get_progress_internal(conn, progress_id)?
                .ok_or_else(|| ServiceError::progress_not_found(progress_id))?;

            conn.execute(
                "INSERT INTO task_comments (
                    id, progress_id, customer_id, author_email, author_name, author_role,
                    message, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    &id,
                    progress_id,
                    &progress.customer_id,
                    &author.email,
                    &author.name,
                    author.role.as_str(),
                    message,
                    now,
                ],
            )?;

            Ok(TaskComment {
                id,
                progress_id: progress_id.to_string(),
                customer_id: progress.customer_id,
                author_email: author.email.clone(),
                author_name: author.name.clone(),
                author_role: author.role,
                message: message.to_string(),
                created_at: now,
            })
        })
    }

    /// All comments, oldest first. Ties keep insertion order.
    pub fn list_comments(&self) -> Result<Vec<TaskComment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM task_comments ORDER BY created_at, rowid")?;
            let comments = stmt
                .query_map([], parse_comment_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(comments)
        })
    }

    /// One progress row's thread, oldest first.
    pub fn list_comments_for_progress(&self, progress_id: &str) -> Result<Vec<TaskComment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM task_comments WHERE progress_id = ?1 ORDER BY created_at, rowid",
            )?;
            let comments = stmt
                .query_map(params![progress_id], parse_comment_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(comments)
        })
    }

    /// All comments on one customer's progress rows, oldest first.
    pub fn list_comments_for_customer(&self, customer_id: &str) -> Result<Vec<TaskComment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM task_comments WHERE customer_id = ?1 ORDER BY created_at, rowid",
            )?;
            let comments = stmt
                .query_map(params![customer_id], parse_comment_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(comments)
        })
    }
}
