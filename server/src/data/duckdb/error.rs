//! Store error type

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("query timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("store is closed")]
    Closed,

    #[error("migration to version {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("not found: {0}")]
    NotFound(String),
}
