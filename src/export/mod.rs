//! Structured JSON snapshots of the onboarding database.
//!
//! Snapshots are used for backups and for eyeballing state in version
//! control: table rows are written in a fixed order so two exports of the
//! same data are byte-identical apart from the header.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Schema version of the current database (highest applied migration).
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Export format version (semver).
pub const EXPORT_VERSION: &str = "1.0.0";

/// Tables that are exported, parents before children.
pub const EXPORTED_TABLES: &[&str] = &[
    "admin_users",
    "customers",
    "tasks",
    "customer_progress",
    "task_comments",
    "task_files",
    "reports",
];

/// A structured export snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: i32,

    /// Export format version (semver)
    pub export_version: String,

    /// RFC 3339 timestamp of export
    pub exported_at: String,

    /// Tool name and version that created this export
    pub exported_by: String,

    /// Table data keyed by table name; each row is a column-name -> value object.
    pub tables: BTreeMap<String, Vec<Value>>,
}

impl Snapshot {
    /// Create a new empty snapshot with current metadata.
    pub fn new() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            export_version: EXPORT_VERSION.to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            exported_by: format!("onboard-tracker v{}", env!("CARGO_PKG_VERSION")),
            tables: BTreeMap::new(),
        }
    }

    /// Serialize to JSON with pretty formatting.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Total number of rows across all tables.
    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic row ordering for each exported table.
pub fn get_table_ordering(table: &str) -> &'static str {
    match table {
        "admin_users" => "ORDER BY email",
        "customers" => "ORDER BY created_at, id",
        "tasks" => "ORDER BY phase, customer_id IS NOT NULL, customer_id, sort_order, id",
        "customer_progress" => "ORDER BY customer_id, task_id",
        "task_comments" => "ORDER BY progress_id, created_at, id",
        "task_files" => "ORDER BY task_id, sort_order, id",
        "reports" => "ORDER BY sort_order, id",
        _ => "ORDER BY rowid",
    }
}
