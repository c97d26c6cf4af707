//! Customer CRUD operations.

use super::{Database, json_column, new_id, now_ms};
use crate::error::ServiceError;
use crate::types::{Customer, NewCustomer, Phase, is_valid_phase, normalize_email};
use anyhow::Result;
use regex_lite::Regex;
use rusqlite::{Connection, Row, params};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Loose syntactic email check.
pub fn is_plausible_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn parse_customer_row(row: &Row) -> rusqlite::Result<Customer> {
    let hidden_json: Option<String> = row.get("hidden_phases")?;
    Ok(Customer {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        company: row.get("company")?,
        phone: row.get("phone")?,
        assigned_om: row.get("assigned_om")?,
        assigned_om_id: row.get("assigned_om_id")?,
        hidden_phases: json_column::<BTreeSet<Phase>>(hidden_json),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Internal helper to get a customer using an existing connection (avoids deadlock).
pub(crate) fn get_customer_internal(
    conn: &Connection,
    customer_id: &str,
) -> Result<Option<Customer>> {
    let mut stmt = conn.prepare("SELECT * FROM customers WHERE id = ?1")?;
    match stmt.query_row(params![customer_id], parse_customer_row) {
        Ok(customer) => Ok(Some(customer)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Create a customer and one pending progress row per global task.
    ///
    /// `om_name` is the display name stamped into `assigned_om`; `input.assigned_om_id`
    /// is stored alongside it when the OM is a known staff member.
    pub fn create_customer(&self, input: NewCustomer, om_name: &str) -> Result<Customer> {
        let name = input.name.trim().to_string();
        let email = normalize_email(&input.email);
        if name.is_empty() {
            return Err(ServiceError::missing_field("name").into());
        }
        if email.is_empty() {
            return Err(ServiceError::missing_field("email").into());
        }
        if !is_plausible_email(&email) {
            return Err(ServiceError::invalid_value("email", "email address is malformed").into());
        }

        let company = input
            .company
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| name.clone());
        let phone = input.phone.filter(|p| !p.trim().is_empty());
        let id = new_id();
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM customers WHERE email = ?1)",
                params![&email],
                |row| row.get(0),
            )?;
            if exists {
                return Err(ServiceError::already_exists("Customer", &email).into());
            }

            tx.execute(
                "INSERT INTO customers (
                    id, name, email, company, phone, assigned_om, assigned_om_id,
                    hidden_phases, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '[]', ?8, ?9)",
                params![
                    &id,
                    &name,
                    &email,
                    &company,
                    &phone,
                    om_name,
                    &input.assigned_om_id,
                    now,
                    now,
                ],
            )?;

            let global_task_ids: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM tasks WHERE customer_id IS NULL ORDER BY phase, sort_order",
                )?;
                stmt.query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            };
            for task_id in &global_task_ids {
                super::progress::insert_progress_row(&tx, &id, task_id, now)?;
            }

            tx.commit()?;

            Ok(Customer {
                id,
                name,
                email,
                company: Some(company),
                phone,
                assigned_om: om_name.to_string(),
                assigned_om_id: input.assigned_om_id,
                hidden_phases: BTreeSet::new(),
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Get a customer by id.
    pub fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>> {
        self.with_conn(|conn| get_customer_internal(conn, customer_id))
    }

    /// Find a customer by login email (case-insensitive).
    pub fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let email = normalize_email(email);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM customers WHERE email = ?1")?;
            match stmt.query_row(params![email], parse_customer_row) {
                Ok(customer) => Ok(Some(customer)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// List all customers, newest first.
    pub fn list_customers(&self) -> Result<Vec<Customer>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM customers ORDER BY created_at DESC, id DESC")?;
            let customers = stmt
                .query_map([], parse_customer_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(customers)
        })
    }

    /// Reassign a customer's onboarding manager.
    pub fn reassign_om(&self, customer_id: &str, om_id: &str, om_name: &str) -> Result<Customer> {
        let now = now_ms();
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE customers SET assigned_om = ?1, assigned_om_id = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![om_name, om_id, now, customer_id],
            )?;
            if changed == 0 {
                return Err(ServiceError::customer_not_found(customer_id).into());
            }
            get_customer_internal(conn, customer_id)?
                .ok_or_else(|| ServiceError::customer_not_found(customer_id).into())
        })
    }

    /// Toggle whether a phase is hidden from the customer's view.
    /// Returns the updated customer.
    pub fn toggle_phase_visibility(&self, customer_id: &str, phase: Phase) -> Result<Customer> {
        if !is_valid_phase(phase) {
            return Err(
                ServiceError::invalid_value("phase", "phase must be between 0 and 4").into(),
            );
        }
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut customer = get_customer_internal(&tx, customer_id)?
                .ok_or_else(|| ServiceError::customer_not_found(customer_id))?;

            if !customer.hidden_phases.remove(&phase) {
                customer.hidden_phases.insert(phase);
            }
            customer.updated_at = now;

            tx.execute(
                "UPDATE customers SET hidden_phases = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    serde_json::to_string(&customer.hidden_phases)?,
                    now,
                    customer_id
                ],
            )?;
            tx.commit()?;
            Ok(customer)
        })
    }
}
