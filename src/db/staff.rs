//! Staff directory (admin_users) operations.

use super::{Database, new_id, now_ms};
use crate::error::ServiceError;
use crate::types::{OmSummary, StaffMember, StaffRole, normalize_email};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

fn parse_staff_row(row: &Row) -> rusqlite::Result<StaffMember> {
    let role: String = row.get("role")?;
    Ok(StaffMember {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        role: StaffRole::parse(&role).unwrap_or(StaffRole::Om),
        created_at: row.get("created_at")?,
    })
}

pub(crate) fn get_staff_internal(conn: &Connection, staff_id: &str) -> Result<Option<StaffMember>> {
    let mut stmt = conn.prepare("SELECT * FROM admin_users WHERE id = ?1")?;
    match stmt.query_row(params![staff_id], parse_staff_row) {
        Ok(staff) => Ok(Some(staff)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Add a staff member. Emails are stored normalized and must be unique.
    pub fn add_staff(&self, email: &str, name: &str, role: StaffRole) -> Result<StaffMember> {
        let email = normalize_email(email);
        let name = name.trim().to_string();
        if email.is_empty() {
            return Err(ServiceError::missing_field("email").into());
        }
        if name.is_empty() {
            return Err(ServiceError::missing_field("name").into());
        }

        let id = new_id();
        let now = now_ms();

        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM admin_users WHERE email = ?1)",
                params![&email],
                |row| row.get(0),
            )?;
            if exists {
                return Err(ServiceError::already_exists("Staff member", &email).into());
            }

            conn.execute(
                "INSERT INTO admin_users (id, email, name, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![&id, &email, &name, role.as_str(), now],
            )?;

            Ok(StaffMember {
                id,
                email,
                name,
                role,
                created_at: now,
            })
        })
    }

    /// Get a staff member by id.
    pub fn get_staff(&self, staff_id: &str) -> Result<Option<StaffMember>> {
        self.with_conn(|conn| get_staff_internal(conn, staff_id))
    }

    /// Look up a staff member by email. `None` means "not staff".
    pub fn find_staff_by_email(&self, email: &str) -> Result<Option<StaffMember>> {
        let email = normalize_email(email);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM admin_users WHERE email = ?1")?;
            match stmt.query_row(params![email], parse_staff_row) {
                Ok(staff) => Ok(Some(staff)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// List all staff members ordered by name.
    pub fn list_staff(&self) -> Result<Vec<StaffMember>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM admin_users ORDER BY name, email")?;
            let staff = stmt
                .query_map([], parse_staff_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(staff)
        })
    }

    /// OM directory with per-OM customer counts.
    ///
    /// Customers are matched on `assigned_om_id`; customers without one fall
    /// back to matching `assigned_om` against the OM's name.
    pub fn om_directory(&self) -> Result<Vec<OmSummary>> {
        let oms: Vec<StaffMember> = self
            .list_staff()?
            .into_iter()
            .filter(|s| s.role == StaffRole::Om)
            .collect();

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT COUNT(*) FROM customers
                 WHERE assigned_om_id = ?1
                    OR (assigned_om_id IS NULL AND assigned_om = ?2)",
            )?;

            let mut summaries = Vec::with_capacity(oms.len());
            for om in oms {
                let count: i64 = stmt.query_row(params![&om.id, &om.name], |row| row.get(0))?;
                summaries.push(OmSummary {
                    staff: om,
                    customer_count: count as usize,
                });
            }
            Ok(summaries)
        })
    }
}
