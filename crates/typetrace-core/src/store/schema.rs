//! SQLite schema DDL for the trace store.

use rusqlite::Connection;

use crate::errors::TraceResult;

/// Core DDL statements: 1 CREATE TABLE + 2 CREATE INDEX.
///
/// Executed with `CREATE … IF NOT EXISTS` so they are safe to replay on an
/// already-initialised database.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS call_traces (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        module TEXT NOT NULL,
        qualname TEXT NOT NULL,
        arg_types TEXT NOT NULL,
        return_type TEXT,
        yield_type TEXT
    );",
    "CREATE INDEX IF NOT EXISTS idx_call_traces_module ON call_traces(module, created_at);",
    "CREATE INDEX IF NOT EXISTS idx_call_traces_qualname ON call_traces(module, qualname);",
];

/// Initialise the schema on a fresh or existing connection: WAL mode for
/// concurrent readers, then the DDL statements.
pub fn init_schema(conn: &Connection) -> TraceResult<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    for stmt in SCHEMA_STATEMENTS {
        conn.execute_batch(stmt)?;
    }
    Ok(())
}
