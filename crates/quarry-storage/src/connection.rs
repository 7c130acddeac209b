// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The single database connection and its open/close lifecycle.
//!
//! State machine: `Closed -> Open(a)`, and `Open(a) -> Closed -> Open(b)` on a
//! switch. The old handle is always closed (and awaited) before the next one
//! is opened, so two connections never coexist.

use std::path::Path;
use std::sync::Arc;

use quarry_core::{QuarryError, Record, Value};
use rusqlite::types::ValueRef;
use tracing::{debug, info, warn};

use crate::paths::PathResolver;
use crate::stats::WorkerStats;

/// Observable connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open(String),
}

/// Owns the one native connection. Lives inside the worker and is never shared.
pub struct DatabaseConnection {
    handle: Option<tokio_rusqlite::Connection>,
    /// Name of the last database a switch targeted, whether or not it opened.
    current_db_name: Option<String>,
    synchronous: &'static str,
    stats: Arc<WorkerStats>,
}

impl DatabaseConnection {
    /// Create a closed connection. `synchronous` is the `PRAGMA synchronous`
    /// mode applied after every open.
    pub fn new(synchronous: &str, stats: Arc<WorkerStats>) -> Self {
        Self {
            handle: None,
            current_db_name: None,
            synchronous: synchronous_mode(synchronous),
            stats,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match (&self.handle, &self.current_db_name) {
            (Some(_), Some(name)) => ConnectionState::Open(name.clone()),
            _ => ConnectionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn current_db_name(&self) -> Option<&str> {
        self.current_db_name.as_deref()
    }

    /// Close the current connection, if any.
    pub async fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.stats.record_close();
        match handle.close().await {
            Ok(()) => debug!(db_name = ?self.current_db_name, "database connection closed"),
            Err(e) => warn!(error = %e, "error while closing database connection"),
        }
    }

    /// Close whatever is open, then resolve and open `db_name`.
    ///
    /// `db_name` becomes the current name even when resolution or opening
    /// fails, so later requests for the same name do not retry until a
    /// different database has been requested in between.
    pub async fn switch_to(
        &mut self,
        db_name: &str,
        resolver: &mut PathResolver,
    ) -> Result<(), QuarryError> {
        self.close().await;
        self.current_db_name = Some(db_name.to_string());

        let path = match resolver.resolve(db_name).await {
            Ok(path) => path,
            Err(e) => {
                self.stats.record_open_failure();
                return Err(e);
            }
        };
        self.open(db_name, &path).await
    }

    async fn open(&mut self, db_name: &str, path: &Path) -> Result<(), QuarryError> {
        let handle = tokio_rusqlite::Connection::open(path).await.map_err(|e| {
            self.stats.record_open_failure();
            QuarryError::ConnectionOpen {
                db_name: db_name.to_string(),
                source: Box::new(e),
            }
        })?;
        self.stats.record_open();
        info!(db_name, path = %path.display(), "database connection opened");

        let pragma = format!("PRAGMA synchronous = {};", self.synchronous);
        let applied = handle
            .call(move |conn| -> Result<(), rusqlite::Error> { conn.execute_batch(&pragma) })
            .await;
        if let Err(e) = applied {
            warn!(db_name, error = %e, "failed to apply synchronous pragma");
        }

        self.handle = Some(handle);
        Ok(())
    }

    /// Run `query` and collect every row, preserving column order.
    ///
    /// Statements that produce no rows (DDL, INSERT, ...) return an empty list.
    pub async fn execute(&self, query: &str) -> Result<Vec<Record>, QuarryError> {
        let handle = self.handle.as_ref().ok_or(QuarryError::NotRunning)?;
        let query = query.to_string();

        let outcome = handle
            .call(move |conn| -> Result<Vec<Record>, rusqlite::Error> {
                let mut stmt = conn.prepare(&query)?;
                let columns: Vec<String> = stmt
                    .column_names()
                    .into_iter()
                    .map(String::from)
                    .collect();

                let mut rows = stmt.query([])?;
                let mut records = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut record = Record::with_capacity(columns.len());
                    for (index, column) in columns.iter().enumerate() {
                        record.push(column.as_str(), to_value(row.get_ref(index)?));
                    }
                    records.push(record);
                }
                Ok(records)
            })
            .await;

        match outcome {
            Ok(records) => {
                self.stats.record_executed();
                Ok(records)
            }
            Err(e) => {
                self.stats.record_failed();
                Err(QuarryError::QueryExecution {
                    source: Box::new(e),
                })
            }
        }
    }
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

/// Canonical `PRAGMA synchronous` keyword; unknown values fall back to `OFF`.
fn synchronous_mode(value: &str) -> &'static str {
    match value.trim().to_ascii_uppercase().as_str() {
        "OFF" | "0" => "OFF",
        "NORMAL" | "1" => "NORMAL",
        "FULL" | "2" => "FULL",
        "EXTRA" | "3" => "EXTRA",
        other => {
            warn!(value = other, "unknown synchronous mode, using OFF");
            "OFF"
        }
    }
}
