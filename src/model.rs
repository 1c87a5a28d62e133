//! Response model contract and field-validation helpers.
//!
//! Every typed response in the crate implements [`ResponseModel`]: it is
//! built from an already-decoded `serde_json::Value` with explicit presence
//! checks, so a failure names the exact key that was missing or had the
//! wrong type, together with the payload that was being mapped.

use serde_json::{Map, Value};

use crate::error::{AzureApiError, Result};

/// A value constructed from a decoded JSON response body.
///
/// Implementations must either return a fully populated value or fail with
/// `AzureApiError::Mapping`; no partially mapped value is ever exposed.
pub trait ResponseModel: Sized {
    /// Maps `data` into `Self`.
    fn from_response_data(data: &Value) -> Result<Self>;
}

/// Decodes a response body. An unparsable body is a mapping failure.
pub(crate) fn parse_json(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| {
        AzureApiError::Mapping(format!("Response is not a valid JSON: {e}: {body}"))
    })
}

/// Renders `data` as compact JSON for error messages.
pub(crate) fn raw(data: &Value) -> String {
    serde_json::to_string(data).unwrap_or_else(|_| data.to_string())
}

pub(crate) fn missing(key: &str, data: &Value) -> AzureApiError {
    AzureApiError::Mapping(format!(
        "Missing or invalid \"{key}\" in response: {}",
        raw(data)
    ))
}

/// Borrows the top-level object of `data`.
pub(crate) fn object(data: &Value) -> Result<&Map<String, Value>> {
    data.as_object().ok_or_else(|| {
        AzureApiError::Mapping(format!("Response data is not an object: {}", raw(data)))
    })
}

/// Reads a required string field.
pub(crate) fn required_str(data: &Value, key: &str) -> Result<String> {
    object(data)?
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| missing(key, data))
}

/// Reads a required nested object, returned as-is for a nested mapper.
pub(crate) fn required_object<'a>(data: &'a Value, key: &str) -> Result<&'a Value> {
    object(data)?
        .get(key)
        .filter(|v| v.is_object())
        .ok_or_else(|| missing(key, data))
}

/// Reads an optional string field. Present-but-not-a-string is an error.
pub(crate) fn optional_str(data: &Value, key: &str) -> Result<Option<String>> {
    match object(data)?.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(missing(key, data)),
    }
}

/// Reads an optional boolean field, defaulting to `false`.
pub(crate) fn flag(data: &Value, key: &str) -> Result<bool> {
    match object(data)?.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(missing(key, data)),
    }
}

/// Reads an optional non-negative integer field.
pub(crate) fn optional_u64(data: &Value, key: &str) -> Result<Option<u64>> {
    match object(data)?.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| missing(key, data)),
    }
}

/// Reads an optional number field.
pub(crate) fn optional_f64(data: &Value, key: &str) -> Result<Option<f64>> {
    match object(data)?.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| missing(key, data)),
    }
}

/// Reads an optional integer that the server may send either as a JSON
/// number or as a numeric string (the metadata service does the latter).
pub(crate) fn optional_lenient_i64(data: &Value, key: &str) -> Result<Option<i64>> {
    match object(data)?.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| missing(key, data)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| missing(key, data)),
        Some(_) => Err(missing(key, data)),
    }
}

/// Reads an optional value of any JSON type. `null` counts as absent.
pub(crate) fn optional_value(data: &Value, key: &str) -> Result<Option<Value>> {
    Ok(object(data)?.get(key).filter(|v| !v.is_null()).cloned())
}
