//! Time conversion helpers
//!
//! All pipeline timestamps are UTC instants with nanosecond precision.

use chrono::{DateTime, TimeZone, Utc};

/// Convert OTLP unix nanoseconds to a UTC timestamp.
/// Values outside chrono's representable range collapse to the epoch.
pub fn nanos_to_datetime(nanos: u64) -> DateTime<Utc> {
    let nanos = i64::try_from(nanos).unwrap_or(0);
    Utc.timestamp_nanos(nanos)
}

/// Convert epoch microseconds (DuckDB `epoch_us`) back to a UTC timestamp
pub fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros)
        .single()
        .unwrap_or_else(|| Utc.timestamp_nanos(0))
}

/// Parse an RFC 3339 timestamp, with or without fractional seconds
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_roundtrip() {
        let dt = nanos_to_datetime(1_700_000_000_123_456_789);
        assert_eq!(dt.timestamp_nanos_opt().unwrap(), 1_700_000_000_123_456_789);
    }

    #[test]
    fn test_nanos_zero_is_epoch() {
        assert_eq!(nanos_to_datetime(0).timestamp(), 0);
    }

    #[test]
    fn test_nanos_overflow_collapses_to_epoch() {
        assert_eq!(nanos_to_datetime(u64::MAX).timestamp(), 0);
    }

    #[test]
    fn test_micros_to_datetime() {
        let dt = micros_to_datetime(1_700_000_000_000_123);
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert_eq!(dt.timestamp_subsec_micros(), 123);
    }

    #[test]
    fn test_parse_rfc3339_with_fraction() {
        let dt = parse_rfc3339("2025-06-01T12:30:45.123456789Z").unwrap();
        assert_eq!(dt.timestamp_subsec_nanos(), 123_456_789);
    }

    #[test]
    fn test_parse_rfc3339_without_fraction() {
        let dt = parse_rfc3339("2025-06-01T12:30:45Z").unwrap();
        assert_eq!(dt.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let dt = parse_rfc3339("2025-06-01T14:30:45+02:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-06-01T12:30:45+00:00");
    }

    #[test]
    fn test_parse_rfc3339_invalid() {
        assert!(parse_rfc3339("not a timestamp").is_none());
    }
}
