//! Error types for the typetrace core library.

/// Top-level error enum for the typetrace core library.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// A stored call trace row could not be decoded back into a `CallTrace`.
    ///
    /// Carries the identity of the failing call site so callers can skip just
    /// that record and report it.
    #[error("Failed to decode trace for {module}.{qualname}: {source}")]
    Decode {
        module: String,
        qualname: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TraceResult<T> = Result<T, TraceError>;
