//! SQLite-backed trace store.
//!
//! One connection guarded by a mutex; batch writes run inside a transaction
//! so a failed insert never leaves a partial batch behind. Rows that fail to
//! decode on the way out are logged and skipped rather than failing the read.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::debug;

use crate::encoding::{decode_traces, serialize_traces, CallTraceRow};
use crate::errors::{TraceError, TraceResult};
use crate::store::{schema, CallTraceStore};
use crate::trace::CallTrace;

/// SQLite store for call traces.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at `path` and initialise the schema. Parent
    /// directories are created if absent.
    pub fn open(path: impl AsRef<Path>) -> TraceResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store. Used by tests and one-shot analysis runs.
    pub fn in_memory() -> TraceResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Copy the database to `destination` using the SQLite backup API.
    /// Returns the resolved destination path.
    pub fn backup_to(&self, destination: impl AsRef<Path>) -> TraceResult<PathBuf> {
        let destination = destination.as_ref().to_path_buf();
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = self.conn.lock();
        let mut dst_conn = Connection::open(&destination)?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut dst_conn)?;
        backup.run_to_completion(100, std::time::Duration::from_millis(10), None)?;
        Ok(destination)
    }
}

/// Convenience constructor returning the store behind the trait seam.
pub fn make_store(path: impl AsRef<Path>) -> TraceResult<Box<dyn CallTraceStore>> {
    Ok(Box::new(SqliteStore::open(path)?))
}

impl CallTraceStore for SqliteStore {
    fn add(&self, traces: &[CallTrace]) -> TraceResult<()> {
        if traces.is_empty() {
            return Ok(());
        }
        let rows = serialize_traces(traces);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO call_traces (module, qualname, arg_types, return_type, yield_type) \
                 VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            for row in &rows {
                stmt.execute(params![
                    row.module,
                    row.qualname,
                    row.arg_types,
                    row.return_type,
                    row.yield_type,
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = rows.len(), "stored trace batch");
        Ok(())
    }

    fn filter(
        &self,
        module: &str,
        qualname_prefix: Option<&str>,
        limit: usize,
    ) -> TraceResult<Vec<CallTrace>> {
        if limit == 0 {
            return Err(TraceError::Config(
                "filter limit must be positive".to_string(),
            ));
        }
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT module, qualname, arg_types, return_type, yield_type \
             FROM call_traces \
             WHERE module = ?1 AND qualname LIKE ?2 || '%' \
             ORDER BY created_at DESC, id DESC \
             LIMIT ?3;",
        )?;
        let prefix = qualname_prefix.unwrap_or("");
        let rows: Vec<CallTraceRow> = stmt
            .query_map(params![module, prefix, limit as i64], |row| {
                Ok(CallTraceRow {
                    module: row.get(0)?,
                    qualname: row.get(1)?,
                    arg_types: row.get(2)?,
                    return_type: row.get(3)?,
                    yield_type: row.get(4)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(decode_traces(&rows))
    }

    fn list_modules(&self) -> TraceResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT DISTINCT module FROM call_traces ORDER BY module ASC;")?;
        let modules: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        Ok(modules)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
