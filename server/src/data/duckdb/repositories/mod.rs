//! Store repositories
//!
//! Plain synchronous functions over a borrowed connection. Writers are
//! always invoked through `Store::write`, which wraps the call in a single
//! transaction; repository functions therefore never open transactions of
//! their own.

pub mod dashboard;
pub mod log;
pub mod metric;
pub mod series;
pub mod span;
pub mod stats;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use duckdb::types::Value;

/// Bindable text form of a UTC timestamp (pairs with `CAST(? AS TIMESTAMP)`)
pub(crate) fn ts_value(dt: DateTime<Utc>) -> Value {
    Value::Text(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
}

/// Parse a JSON object column back into a flat attribute map
pub(crate) fn parse_attrs(text: Option<String>) -> HashMap<String, String> {
    text.and_then(|t| serde_json::from_str(&t).ok())
        .unwrap_or_default()
}

/// Escape an attribute key for use inside a JSON path literal
pub(crate) fn json_path(key: &str) -> String {
    format!("$.\"{}\"", key.replace('"', ""))
}

#[cfg(test)]
pub(crate) mod test_support {
    use duckdb::Connection;

    use crate::data::duckdb::schema::SCHEMA;

    /// A migrated in-memory connection for synchronous repository tests
    pub fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("Failed to open in-memory database");
        conn.execute_batch("LOAD json;").expect("Failed to load json");
        conn.execute_batch(SCHEMA).expect("Failed to apply schema");
        conn
    }
}
