//! SQL type wrappers and JSON list helpers for DuckDB
//!
//! Timestamps are written as microsecond-precision text; list-shaped row
//! fields travel as JSON array text.

use chrono::{DateTime, Utc};
use duckdb::ToSql;
use duckdb::types::{ToSqlOutput, Value, ValueRef};

/// Wrapper for DateTime<Utc> to implement ToSql for DuckDB TIMESTAMP
pub struct SqlTimestamp(pub DateTime<Utc>);

impl ToSql for SqlTimestamp {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        let ts = self.0.format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        Ok(ToSqlOutput::Owned(Value::Text(ts)))
    }
}

/// Wrapper for optional DateTime<Utc>
pub struct SqlOptTimestamp(pub Option<DateTime<Utc>>);

impl ToSql for SqlOptTimestamp {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        match &self.0 {
            Some(dt) => {
                let ts = dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string();
                Ok(ToSqlOutput::Owned(Value::Text(ts)))
            }
            None => Ok(ToSqlOutput::Borrowed(ValueRef::Null)),
        }
    }
}

/// Serialize any serde value as JSON text, `None` as SQL NULL
pub fn opt_json_string<T: serde::Serialize>(value: &Option<T>) -> Option<String> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v).unwrap_or_else(|_| "null".to_string()))
}

/// Deserialize a JSON array column back into a vector; NULL or malformed
/// text yields `None`
pub fn parse_json_list<T: serde::de::DeserializeOwned>(text: Option<String>) -> Option<Vec<T>> {
    text.and_then(|t| serde_json::from_str(&t).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sql_timestamp_format() {
        let dt = Utc.timestamp_micros(1_700_000_000_123_456).single().unwrap();
        let ts = SqlTimestamp(dt);
        let out = ts.to_sql().unwrap();
        match out {
            ToSqlOutput::Owned(Value::Text(s)) => {
                assert_eq!(s, "2023-11-14 22:13:20.123456");
            }
            _ => panic!("Expected owned text"),
        }
    }

    #[test]
    fn test_sql_opt_timestamp_none_is_null() {
        let out = SqlOptTimestamp(None).to_sql().unwrap();
        assert!(matches!(out, ToSqlOutput::Borrowed(ValueRef::Null)));
    }

    #[test]
    fn test_opt_json_string() {
        let values: Option<Vec<i64>> = Some(vec![1, 2, 3]);
        assert_eq!(opt_json_string(&values).as_deref(), Some("[1,2,3]"));
        let none: Option<Vec<i64>> = None;
        assert!(opt_json_string(&none).is_none());
    }

    #[test]
    fn test_parse_json_list() {
        let parsed: Option<Vec<f64>> = parse_json_list(Some("[0.5,0.99]".to_string()));
        assert_eq!(parsed, Some(vec![0.5, 0.99]));
        let empty: Option<Vec<f64>> = parse_json_list(None);
        assert!(empty.is_none());
        let bad: Option<Vec<f64>> = parse_json_list(Some("not json".to_string()));
        assert!(bad.is_none());
    }
}
