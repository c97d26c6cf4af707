//! Table dumps for the `export` command.

use super::Database;
use crate::export::{EXPORTED_TABLES, Snapshot, get_table_ordering};
use anyhow::{Result, bail};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};

fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b,
        )),
    }
}

fn dump_table(conn: &Connection, table: &str) -> Result<Vec<Value>> {
    let sql = format!("SELECT * FROM {} {}", table, get_table_ordering(table));
    let mut stmt = conn.prepare(&sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let rows = stmt
        .query_map([], |row| {
            let mut obj = Map::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                obj.insert(name.clone(), value_ref_to_json(row.get_ref(i)?));
            }
            Ok(Value::Object(obj))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

impl Database {
    /// Dump tables into a snapshot. `tables = None` exports every table.
    pub fn export_snapshot(&self, tables: Option<&[String]>) -> Result<Snapshot> {
        if let Some(requested) = tables {
            for name in requested {
                if !EXPORTED_TABLES.contains(&name.as_str()) {
                    bail!(
                        "Unknown table '{}'. Valid tables: {}",
                        name,
                        EXPORTED_TABLES.join(", ")
                    );
                }
            }
        }

        let mut snapshot = Snapshot::new();
        self.with_conn(|conn| {
            for table in EXPORTED_TABLES {
                let wanted = tables.is_none_or(|t| t.iter().any(|s| s == table));
                if wanted {
                    snapshot.tables.insert(table.to_string(), dump_table(conn, table)?);
                }
            }
            Ok(())
        })?;
        Ok(snapshot)
    }
}
