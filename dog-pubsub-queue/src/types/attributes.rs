use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{QueueError, QueueResult};

/// Attributes as supplied by callers, before validation
pub type RawAttributes = Map<String, Value>;

/// Validated, string-typed message attributes as sent to the backend
pub type MessageAttributes = BTreeMap<String, String>;

/// Attribute carrying the earliest Unix timestamp at which a message may be processed
pub const AVAILABLE_AT: &str = "availableAt";

/// Attribute carrying the attempt counter of a released job
pub const ATTEMPTS: &str = "attempts";

pub const MAX_ATTRIBUTES: usize = 100;
pub const MAX_KEY_BYTES: usize = 256;
pub const MAX_VALUE_BYTES: usize = 1024;
pub const RESERVED_KEY_PREFIX: &str = "goog";

/// Check raw attributes against the backend's attribute constraints.
///
/// Values must be JSON strings; keys must be non-empty, at most
/// [`MAX_KEY_BYTES`] long and must not use the reserved `goog` prefix.
pub fn validate_attributes(raw: &RawAttributes) -> QueueResult<MessageAttributes> {
    if raw.len() > MAX_ATTRIBUTES {
        return Err(QueueError::invalid_attribute(
            "*",
            format!("at most {} attributes are allowed, got {}", MAX_ATTRIBUTES, raw.len()),
        ));
    }

    let mut attributes = MessageAttributes::new();
    for (key, value) in raw {
        if key.is_empty() {
            return Err(QueueError::invalid_attribute(key, "key must not be empty"));
        }
        if key.len() > MAX_KEY_BYTES {
            return Err(QueueError::invalid_attribute(
                key,
                format!("key exceeds {} bytes", MAX_KEY_BYTES),
            ));
        }
        if key.starts_with(RESERVED_KEY_PREFIX) {
            return Err(QueueError::invalid_attribute(key, "key uses the reserved `goog` prefix"));
        }

        let value = match value {
            Value::String(s) => s,
            other => {
                return Err(QueueError::invalid_attribute(
                    key,
                    format!("value must be a string, got {}", json_type_name(other)),
                ))
            }
        };
        if value.len() > MAX_VALUE_BYTES {
            return Err(QueueError::invalid_attribute(
                key,
                format!("value exceeds {} bytes", MAX_VALUE_BYTES),
            ));
        }

        attributes.insert(key.clone(), value.clone());
    }

    Ok(attributes)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawAttributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_string_attributes_pass() {
        let attributes = validate_attributes(&raw(json!({"successtest": "ok", "attempts": "2"}))).unwrap();
        assert_eq!(attributes.get("successtest").map(String::as_str), Some("ok"));
        assert_eq!(attributes.len(), 2);
    }

    #[test]
    fn test_non_string_values_are_rejected() {
        let err = validate_attributes(&raw(json!({"successtest": "ok", "wrongtest": {"foo": "bar"}}))).unwrap_err();
        assert_eq!(
            err,
            QueueError::invalid_attribute("wrongtest", "value must be a string, got object")
        );

        let err = validate_attributes(&raw(json!({"attempts": 2}))).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_key_constraints() {
        assert!(validate_attributes(&raw(json!({"": "x"}))).is_err());
        assert!(validate_attributes(&raw(json!({"googOrdering": "x"}))).is_err());

        let long_key = "k".repeat(MAX_KEY_BYTES + 1);
        let mut attrs = RawAttributes::new();
        attrs.insert(long_key, json!("x"));
        assert!(validate_attributes(&attrs).is_err());
    }

    #[test]
    fn test_value_and_count_limits() {
        let mut attrs = RawAttributes::new();
        attrs.insert("big".to_string(), json!("v".repeat(MAX_VALUE_BYTES + 1)));
        assert!(validate_attributes(&attrs).is_err());

        let attrs: RawAttributes = (0..=MAX_ATTRIBUTES)
            .map(|i| (format!("k{}", i), json!("v")))
            .collect();
        assert!(validate_attributes(&attrs).is_err());
    }
}
