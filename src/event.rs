//! Defines the change notifications delivered by the event stream,
//! and how a delivered batch payload is decoded into them.

use crate::error::DecodeError;
use serde::Deserialize;
use serde_json::Value;

/// A single storage operation reported by the file share.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// The storage operation, e.g. `PutRange` for a file write.
    pub operation_name: String,

    /// The resource the operation acted on, including its query
    /// string.
    pub uri: String,
}

/// One event stream message, holding a group of change records.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StorageEvent {
    pub records: Vec<ChangeRecord>,
}

/// Decode a binding value into storage events. The value may be the
/// event object itself, a string holding its JSON text, or an array
/// of either when messages are delivered in groups.
pub fn decode_batch(payload: &Value) -> Result<Vec<StorageEvent>, DecodeError> {
    match payload {
        Value::Array(items) => items.iter().map(decode_event).collect(),
        other => Ok(vec![decode_event(other)?]),
    }
}

fn decode_event(value: &Value) -> Result<StorageEvent, DecodeError> {
    match value {
        Value::Object(_) => Ok(StorageEvent::deserialize(value)?),
        Value::String(text) => Ok(serde_json::from_str(text)?),
        other => Err(DecodeError::Shape(format!(
            "expected an event object or its JSON text, found {}",
            kind(other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Iterate over every record of the given events, in delivery order.
pub fn records(events: Vec<StorageEvent>) -> impl Iterator<Item = ChangeRecord> {
    events.into_iter().flat_map(|event| event.records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const URI: &str = "https://acct.file.core.windows.net/container/config/route42.yml?sv=2021";

    #[test]
    fn test_decode_object() {
        let events = decode_batch(&json!({
            "records": [{"operationName": "PutRange", "uri": URI, "category": "StorageWrite"}]
        }))
        .unwrap();
        assert_eq!(
            events,
            vec![StorageEvent {
                records: vec![ChangeRecord {
                    operation_name: "PutRange".into(),
                    uri: URI.into(),
                }]
            }]
        );
    }

    #[test]
    fn test_decode_json_text() {
        let text = json!({"records": [{"operationName": "PutRange", "uri": URI}]}).to_string();
        let events = decode_batch(&Value::String(text)).unwrap();
        assert_eq!(events[0].records[0].uri, URI);
    }

    #[test]
    fn test_decode_many() {
        let events = decode_batch(&json!([
            {"records": [{"operationName": "PutRange", "uri": URI}]},
            json!({"records": [
                {"operationName": "GetFile", "uri": URI},
                {"operationName": "PutRange", "uri": URI}
            ]})
            .to_string()
        ]))
        .unwrap();
        let operations: Vec<String> = records(events).map(|r| r.operation_name).collect();
        assert_eq!(operations, vec!["PutRange", "GetFile", "PutRange"]);
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let error = decode_batch(&json!({"records": [{"operationName": "PutRange"}]}))
            .unwrap_err();
        assert!(error.to_string().contains("missing field `uri`"));
    }

    #[test]
    fn test_missing_records_is_an_error() {
        assert!(decode_batch(&json!({"other": []})).is_err());
    }

    #[test]
    fn test_unexpected_shape() {
        let error = decode_batch(&json!(42)).unwrap_err();
        assert!(matches!(error, DecodeError::Shape(_)));
    }
}
