//! Backend access seam
//!
//! Repositories talk to the NSI backend only through the [`Backend`] trait:
//! JSON-RPC style calls (`{method, params}` posted to one endpoint), meta RPC
//! calls on a second endpoint, and plain REST verbs. [`crate::http::HttpBackend`]
//! is the production implementation.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::value::{is_truthy, normalize_string};
use crate::{Error, Result};

/// Remote NSI backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Call an RPC method; resolves to the unwrapped result
    async fn rpc(&self, method: &str, params: Vec<Value>) -> Result<Value>;

    /// Call a meta-model RPC method; same envelope as [`Backend::rpc`]
    async fn meta_rpc(&self, method: &str, params: Vec<Value>) -> Result<Value>;

    /// GET a REST resource relative to the API base
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value>;

    /// POST a JSON body
    async fn post(&self, path: &str, body: &Value) -> Result<Value>;

    /// PUT a JSON body
    async fn put(&self, path: &str, body: &Value) -> Result<Value>;

    /// DELETE a resource
    async fn delete(&self, path: &str) -> Result<Value>;

    /// POST an `application/x-www-form-urlencoded` body to the login endpoint
    /// and return the raw response text
    async fn post_login_form(&self, fields: &[(&str, &str)]) -> Result<String>;
}

/// Request body for an RPC call
pub fn rpc_request(method: &str, params: &[Value]) -> Value {
    json!({ "method": method, "params": params })
}

/// Unwrap an RPC response envelope.
///
/// - an object with a truthy `error` fails with the error string, the
///   error's `message`, or `"RPC <method> failed"`;
/// - an object with a `result` key yields that value;
/// - anything else is already the bare result.
///
/// # Examples
///
/// ```
/// use nsi_common::client::decode_envelope;
/// use serde_json::json;
///
/// assert_eq!(decode_envelope("data/x", json!({"result": 42})).unwrap(), json!(42));
/// assert_eq!(decode_envelope("data/x", json!([1])).unwrap(), json!([1]));
/// let err = decode_envelope("data/x", json!({"error": "bad id"})).unwrap_err();
/// assert_eq!(err.to_string(), "bad id");
/// ```
pub fn decode_envelope(method: &str, body: Value) -> Result<Value> {
    match body {
        Value::Object(mut map) => {
            if let Some(error) = map.get("error").filter(|e| is_truthy(e)) {
                let message = match error {
                    Value::Object(inner) => inner.get("message").and_then(normalize_string),
                    other => normalize_string(other),
                };
                return Err(Error::rpc(method, message));
            }
            if let Some(result) = map.remove("result") {
                return Ok(result);
            }
            Ok(Value::Object(map))
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_unwrapped() {
        assert_eq!(decode_envelope("m", json!({"result": {"records": []}})).unwrap(), json!({"records": []}));
        assert_eq!(decode_envelope("m", json!({"result": null})).unwrap(), json!(null));
        assert_eq!(decode_envelope("m", json!({"result": 1, "error": null})).unwrap(), json!(1));
        assert_eq!(decode_envelope("m", json!({"result": 1, "error": ""})).unwrap(), json!(1));
    }

    #[test]
    fn test_bare_values_pass_through() {
        assert_eq!(decode_envelope("m", json!({"records": [1]})).unwrap(), json!({"records": [1]}));
        assert_eq!(decode_envelope("m", json!("ok")).unwrap(), json!("ok"));
        assert_eq!(decode_envelope("m", json!(null)).unwrap(), json!(null));
    }

    #[test]
    fn test_error_messages() {
        let err = decode_envelope("data/x", json!({"error": {"message": "no access"}})).unwrap_err();
        assert_eq!(err.to_string(), "no access");

        let err = decode_envelope("data/x", json!({"error": {"code": 3}})).unwrap_err();
        assert_eq!(err.to_string(), "RPC data/x failed");

        let err = decode_envelope("data/x", json!({"error": true})).unwrap_err();
        assert_eq!(err.to_string(), "RPC data/x failed");

        match decode_envelope("data/loadParameters", json!({"error": "boom"})) {
            Err(Error::Rpc { method, message }) => {
                assert_eq!(method, "data/loadParameters");
                assert_eq!(message, "boom");
            }
            other => panic!("expected RPC error, got {:?}", other),
        }
    }

    #[test]
    fn test_request_body() {
        assert_eq!(
            rpc_request("data/loadComponents", &[json!(0)]),
            json!({"method": "data/loadComponents", "params": [0]})
        );
    }
}
