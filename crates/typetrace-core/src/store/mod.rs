//! Durable trace storage.
//!
//! The [`CallTraceStore`] trait is the seam between trace capture and trace
//! retrieval; [`sqlite::SqliteStore`] is the shipped implementation.

pub mod schema;
pub mod sqlite;

use crate::errors::TraceResult;
use crate::trace::CallTrace;

/// A sink and source for call traces.
///
/// Implementations must be safe to share across threads; batches are written
/// atomically and reads return the most recent traces first.
pub trait CallTraceStore: Send + Sync {
    /// Persist a batch of traces. Either the whole batch lands or none of it.
    fn add(&self, traces: &[CallTrace]) -> TraceResult<()>;

    /// Fetch up to `limit` traces for a module, most recent first, optionally
    /// narrowed to qualnames starting with `qualname_prefix`.
    fn filter(
        &self,
        module: &str,
        qualname_prefix: Option<&str>,
        limit: usize,
    ) -> TraceResult<Vec<CallTrace>>;

    /// Distinct modules with at least one stored trace, sorted by name.
    fn list_modules(&self) -> TraceResult<Vec<String>>;
}
