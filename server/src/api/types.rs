//! Shared query-parameter handling
//!
//! Query structs spell out `from`/`to`/`limit`/`offset` directly (no
//! serde flattening: the urlencoded deserializer buffers flattened
//! fields as strings and then rejects the numeric ones) and resolve them
//! through these helpers.

use chrono::{DateTime, Duration, Utc};

use crate::core::constants::{DEFAULT_PAGE_LIMIT, DEFAULT_QUERY_WINDOW_HOURS, MAX_PAGE_LIMIT};

/// Resolve an optional `[from, to]` window; the default is the 24 hours
/// ending now (or ending at an explicit `to`)
pub fn resolve_time_range(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let to = to.unwrap_or_else(Utc::now);
    let from = from.unwrap_or_else(|| to - Duration::hours(DEFAULT_QUERY_WINDOW_HOURS));
    (from, to)
}

/// Clamp an optional page size to the configured bounds
pub fn clamp_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT)
}
