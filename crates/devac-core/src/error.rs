//! Error kinds shared across the pipeline

use std::path::PathBuf;

/// Typed failures the core API surface can return. Per-file and per-ref
/// failures are collected into result `errors[]` lists by their callers;
/// these variants cover everything that propagates.
#[derive(Debug, thiserror::Error)]
pub enum DevacError {
    /// Malformed request: missing package path, unknown language, bad SQL
    /// placeholder, and similar caller mistakes.
    #[error("invalid input: {0}")]
    Input(String),

    /// Seed files absent. Non-fatal for readiness checks.
    #[error("not found: {0}")]
    NotFound(String),

    /// A parquet file failed to parse or violates the schema version.
    /// Recovery quarantines the file.
    #[error("corrupt seed file {path}: {reason}")]
    CorruptSeed { path: PathBuf, reason: String },

    /// The package lock could not be acquired within the timeout window.
    #[error("lock timeout on {path} after {waited_ms}ms")]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    /// A per-ref resolution failure. Aggregated by the resolver, never
    /// fatal to the package.
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// The query engine connection died or crashed. Triggers exactly one
    /// recovery retry.
    #[error("fatal engine error: {0}")]
    FatalEngine(String),

    /// Hook output missing the `<system-reminder>` wrap or carrying a
    /// wrong event name.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// Operation exceeded its deadline.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Hub or engine used after `close()`.
    #[error("not initialized")]
    NotInitialized,

    /// Unexpected internal failure (worker pool died, storage layer bug).
    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DevacError {
    /// Whether this failure warrants engine teardown + rebuild + retry.
    pub fn is_fatal_engine(&self) -> bool {
        matches!(self, DevacError::FatalEngine(_))
    }
}
