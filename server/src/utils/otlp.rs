//! OTLP attribute helpers
//!
//! Lowers OTLP `AnyValue` trees into the flat string representation used by
//! the row model: scalars render canonically, arrays and kvlists render as
//! compact JSON.

use std::collections::HashMap;

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};

pub const SERVICE_NAME_ATTR: &str = "service.name";

/// Fallback service name when the resource carries no `service.name`
pub const UNKNOWN_SERVICE: &str = "unknown";

/// Extract attributes from a KeyValue array into a flat string map
pub fn extract_attributes(attrs: &[KeyValue]) -> HashMap<String, String> {
    attrs
        .iter()
        .filter_map(|kv| {
            kv.value
                .as_ref()
                .map(|v| (kv.key.clone(), any_value_to_string(v)))
        })
        .collect()
}

/// Convert an AnyValue to its flat string representation
pub fn any_value_to_string(value: &AnyValue) -> String {
    match &value.value {
        Some(any_value::Value::StringValue(s)) => s.clone(),
        Some(any_value::Value::BoolValue(b)) => b.to_string(),
        Some(any_value::Value::IntValue(i)) => i.to_string(),
        Some(any_value::Value::DoubleValue(d)) => d.to_string(),
        Some(any_value::Value::ArrayValue(arr)) => {
            let values: Vec<serde_json::Value> =
                arr.values.iter().map(any_value_to_json).collect();
            serde_json::to_string(&values).unwrap_or_default()
        }
        Some(any_value::Value::KvlistValue(kvlist)) => {
            let map: serde_json::Map<String, serde_json::Value> = kvlist
                .values
                .iter()
                .filter_map(|kv| {
                    kv.value
                        .as_ref()
                        .map(|v| (kv.key.clone(), any_value_to_json(v)))
                })
                .collect();
            serde_json::to_string(&map).unwrap_or_default()
        }
        Some(any_value::Value::BytesValue(b)) => hex::encode(b),
        None => String::new(),
    }
}

/// Convert an AnyValue to JSON, preserving native types (used for nested
/// values inside arrays/kvlists)
fn any_value_to_json(value: &AnyValue) -> serde_json::Value {
    match &value.value {
        Some(any_value::Value::StringValue(s)) => serde_json::json!(s),
        Some(any_value::Value::BoolValue(b)) => serde_json::json!(b),
        Some(any_value::Value::IntValue(i)) => serde_json::json!(i),
        Some(any_value::Value::DoubleValue(d)) => serde_json::json!(d),
        Some(any_value::Value::ArrayValue(arr)) => {
            serde_json::json!(arr.values.iter().map(any_value_to_json).collect::<Vec<_>>())
        }
        Some(any_value::Value::KvlistValue(kvlist)) => {
            let map: serde_json::Map<String, serde_json::Value> = kvlist
                .values
                .iter()
                .filter_map(|kv| {
                    kv.value
                        .as_ref()
                        .map(|v| (kv.key.clone(), any_value_to_json(v)))
                })
                .collect();
            serde_json::Value::Object(map)
        }
        Some(any_value::Value::BytesValue(b)) => serde_json::json!(hex::encode(b)),
        None => serde_json::Value::Null,
    }
}

/// Resolve the service name from resource attributes
pub fn resolve_service_name(resource_attrs: &HashMap<String, String>) -> String {
    resource_attrs
        .get(SERVICE_NAME_ATTR)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_SERVICE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::common::v1::{ArrayValue, KeyValueList};

    fn make_any_value(value: any_value::Value) -> AnyValue {
        AnyValue { value: Some(value) }
    }

    #[test]
    fn test_string_value() {
        let av = make_any_value(any_value::Value::StringValue("hello".to_string()));
        assert_eq!(any_value_to_string(&av), "hello");
    }

    #[test]
    fn test_bool_value() {
        let av = make_any_value(any_value::Value::BoolValue(true));
        assert_eq!(any_value_to_string(&av), "true");
    }

    #[test]
    fn test_int_value() {
        let av = make_any_value(any_value::Value::IntValue(-42));
        assert_eq!(any_value_to_string(&av), "-42");
    }

    #[test]
    fn test_double_value() {
        let av = make_any_value(any_value::Value::DoubleValue(3.5));
        assert_eq!(any_value_to_string(&av), "3.5");
    }

    #[test]
    fn test_bytes_value_hex() {
        let av = make_any_value(any_value::Value::BytesValue(vec![0xde, 0xad]));
        assert_eq!(any_value_to_string(&av), "dead");
    }

    #[test]
    fn test_none_value_empty() {
        let av = AnyValue { value: None };
        assert_eq!(any_value_to_string(&av), "");
    }

    #[test]
    fn test_array_renders_compact_json() {
        let arr = ArrayValue {
            values: vec![
                make_any_value(any_value::Value::IntValue(1)),
                make_any_value(any_value::Value::StringValue("two".to_string())),
            ],
        };
        let av = make_any_value(any_value::Value::ArrayValue(arr));
        assert_eq!(any_value_to_string(&av), r#"[1,"two"]"#);
    }

    #[test]
    fn test_kvlist_renders_compact_json() {
        let kvlist = KeyValueList {
            values: vec![KeyValue {
                key: "count".to_string(),
                value: Some(make_any_value(any_value::Value::IntValue(5))),
            }],
        };
        let av = make_any_value(any_value::Value::KvlistValue(kvlist));
        assert_eq!(any_value_to_string(&av), r#"{"count":5}"#);
    }

    #[test]
    fn test_extract_attributes_skips_missing_values() {
        let attrs = vec![
            KeyValue {
                key: "present".to_string(),
                value: Some(make_any_value(any_value::Value::StringValue(
                    "yes".to_string(),
                ))),
            },
            KeyValue {
                key: "missing".to_string(),
                value: None,
            },
        ];
        let map = extract_attributes(&attrs);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("present").map(String::as_str), Some("yes"));
    }

    #[test]
    fn test_resolve_service_name_present() {
        let mut attrs = HashMap::new();
        attrs.insert(SERVICE_NAME_ATTR.to_string(), "claude-code".to_string());
        assert_eq!(resolve_service_name(&attrs), "claude-code");
    }

    #[test]
    fn test_resolve_service_name_absent() {
        let attrs = HashMap::new();
        assert_eq!(resolve_service_name(&attrs), UNKNOWN_SERVICE);
    }
}
