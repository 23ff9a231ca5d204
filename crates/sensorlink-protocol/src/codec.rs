//! JSON text codec for controller messages.
//!
//! Outbound messages are serialized to a single JSON text frame. Inbound
//! frames are left untouched by the channel; consumers that want typed data
//! call [`decode_snapshot`] themselves.

use serde::Serialize;
use thiserror::Error;

use crate::messages::{ControlCommand, ControllerSnapshot};

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization or parsing failed.
    #[error("failed to process JSON message: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame was valid JSON but not an object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Encode any serializable message as a JSON text frame.
pub fn encode_message<T: Serialize + ?Sized>(msg: &T) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::from)
}

/// Decode a controller status frame.
pub fn decode_snapshot(text: &str) -> Result<ControllerSnapshot, CodecError> {
    let value: serde_json::Value = serde_json::from_str(text.trim())?;
    if !value.is_object() {
        return Err(CodecError::NotAnObject(json_kind(&value)));
    }
    serde_json::from_value(value).map_err(CodecError::from)
}

/// Decode a dashboard command, as the controller side receives it.
pub fn decode_command(text: &str) -> Result<ControlCommand, CodecError> {
    serde_json::from_str(text.trim()).map_err(CodecError::from)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::SetpointName;

    #[test]
    fn test_encode_arbitrary_json() {
        let json = encode_message(&serde_json::json!({ "command": "start" })).unwrap();
        assert_eq!(json, r#"{"command":"start"}"#);
    }

    #[test]
    fn test_encode_program_command() {
        let json = encode_message(&ControlCommand::program("fermentation")).unwrap();
        assert_eq!(json, r#"{"command":"program","program":"fermentation"}"#);
    }

    #[test]
    fn test_decode_command() {
        let cmd = decode_command(r#"{"command":"setpoint","name":"ph","value":6.8}"#).unwrap();
        assert_eq!(cmd, ControlCommand::setpoint(SetpointName::Ph, 6.8));

        assert!(decode_command(r#"{"command":"explode"}"#).is_err());
    }

    #[test]
    fn test_decode_snapshot_with_trailing_newline() {
        // The firmware terminates each frame with a newline.
        let snapshot = decode_snapshot("{\"prog\":\"None\",\"stat\":\"Idle\",\"aT\":21.5}\n").unwrap();
        assert_eq!(snapshot.program, "None");
        assert_eq!(snapshot.sensors.air_temp, 21.5);
    }

    #[test]
    fn test_decode_snapshot_rejects_scalars() {
        // Bare sensor values are valid payloads for the channel but not snapshots.
        match decode_snapshot("42.5") {
            Err(CodecError::NotAnObject(kind)) => assert_eq!(kind, "number"),
            other => panic!("Expected NotAnObject, got {:?}", other),
        }

        assert!(matches!(decode_snapshot("not json"), Err(CodecError::Json(_))));
    }
}
