//! Record extraction from RPC/REST payloads
//!
//! Backend methods wrap their row lists in different envelopes (`records`,
//! `items`, `data`, `rows`, `result`, sometimes nested one level inside
//! `result`). Every repository goes through [`extract_records`] so none of
//! them depends on a particular envelope.

use serde_json::Value;

/// Container keys probed, in order, at the top level of a payload
pub const CONTAINER_KEYS: [&str; 5] = ["records", "items", "data", "rows", "result"];

/// Locate the record sequence inside a payload, if it has a known shape.
///
/// Returns `None` when the payload is neither a sequence nor an object
/// exposing a sequence under one of [`CONTAINER_KEYS`] (directly, or one level
/// inside an object-valued `result`).
pub fn find_records(payload: &Value) -> Option<&[Value]> {
    match payload {
        Value::Array(items) => Some(items.as_slice()),
        Value::Object(map) => {
            for key in CONTAINER_KEYS {
                if let Some(Value::Array(items)) = map.get(key) {
                    return Some(items.as_slice());
                }
            }
            match map.get("result") {
                Some(Value::Object(inner)) => CONTAINER_KEYS
                    .iter()
                    .filter(|key| **key != "result")
                    .find_map(|key| match inner.get(*key) {
                        Some(Value::Array(items)) => Some(items.as_slice()),
                        _ => None,
                    }),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Flat record sequence of a payload; empty when the shape is unknown.
///
/// When the payload already is a sequence, that sequence itself is returned.
///
/// # Examples
///
/// ```
/// use nsi_common::records::extract_records;
/// use serde_json::json;
///
/// assert_eq!(extract_records(&json!([1, 2])).len(), 2);
/// assert_eq!(extract_records(&json!({"records": [{"id": 1}]})).len(), 1);
/// assert_eq!(extract_records(&json!({"result": {"data": [1, 2, 3]}})).len(), 3);
/// assert!(extract_records(&json!("<html>")).is_empty());
/// ```
pub fn extract_records(payload: &Value) -> &[Value] {
    find_records(payload).unwrap_or(&[])
}

/// First record of a payload, if any
pub fn first_record(payload: &Value) -> Option<&Value> {
    extract_records(payload).first()
}

/// Whether a payload has a shape the extractor recognises
pub fn has_known_shape(payload: &Value) -> bool {
    find_records(payload).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_is_total() {
        let inputs = [
            json!(null),
            json!(true),
            json!(12),
            json!("text"),
            json!({}),
            json!({"records": "not a list"}),
            json!({"result": 5}),
            json!({"result": {"result": [1]}}),
        ];
        for input in inputs {
            assert!(extract_records(&input).is_empty(), "{:?}", input);
        }
    }

    #[test]
    fn test_array_is_returned_as_is() {
        let payload = json!([{"id": 1}, {"id": 2}]);
        let records = extract_records(&payload);
        assert_eq!(records, payload.as_array().unwrap().as_slice());
        assert!(std::ptr::eq(records, payload.as_array().unwrap().as_slice()));
    }

    #[test]
    fn test_container_key_order() {
        let payload = json!({
            "rows": [3],
            "items": [2],
            "records": [1],
        });
        assert_eq!(extract_records(&payload), &[json!(1)]);

        let payload = json!({"data": [4], "rows": [5]});
        assert_eq!(extract_records(&payload), &[json!(4)]);
    }

    #[test]
    fn test_top_level_wins_over_nested_result() {
        let payload = json!({"result": {"records": [1]}, "items": [2]});
        assert_eq!(extract_records(&payload), &[json!(2)]);
    }

    #[test]
    fn test_nested_result_variants() {
        for key in ["records", "items", "data", "rows"] {
            let payload = json!({"result": {key: [{"id": 9}]}});
            assert_eq!(extract_records(&payload).len(), 1, "result.{}", key);
        }
        let payload = json!({"result": [1, 2]});
        assert_eq!(extract_records(&payload).len(), 2);
    }

    #[test]
    fn test_first_record() {
        assert_eq!(first_record(&json!({"records": [{"id": 5}]})), Some(&json!({"id": 5})));
        assert_eq!(first_record(&json!({"records": []})), None);
        assert_eq!(first_record(&json!(null)), None);
    }

    #[test]
    fn test_known_shape() {
        assert!(has_known_shape(&json!([])));
        assert!(has_known_shape(&json!({"items": []})));
        assert!(!has_known_shape(&json!("<!doctype html>")));
        assert!(!has_known_shape(&json!({"hits": []})));
    }
}
