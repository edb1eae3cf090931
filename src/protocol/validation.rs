use super::RobotCommand;
use serde_json::Value;
use std::fmt;

/// Control task that bypasses envelope validation
pub const RESET_STATE: &str = "reset_state";

/// Envelope errors for inbound command payloads
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeError {
    Undecodable(String),
    NotAnObject,
    Invalid(String),
    EmptyTaskId,
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeError::Undecodable(e) => write!(f, "payload is not valid JSON: {}", e),
            EnvelopeError::NotAnObject => write!(f, "command must be a JSON object"),
            EnvelopeError::Invalid(e) => write!(f, "invalid command envelope: {}", e),
            EnvelopeError::EmptyTaskId => write!(f, "task_id must not be empty"),
        }
    }
}

impl std::error::Error for EnvelopeError {}

/// A decoded inbound payload
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// Clear the world state; `task_id` defaults to "unknown"
    Reset { task_id: String },
    Command(RobotCommand),
}

/// Decodes a raw command payload.
///
/// `reset_state` is recognised from the raw `task_type` before the
/// envelope is validated, so it works with any (or no) params.
/// Everything else must carry a string `task_id`, a known `task_type`
/// and an optional object `params`.
pub fn decode_command(payload: &[u8]) -> Result<Inbound, EnvelopeError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| EnvelopeError::Undecodable(e.to_string()))?;

    let object = value.as_object().ok_or(EnvelopeError::NotAnObject)?;

    if object.get("task_type").and_then(Value::as_str) == Some(RESET_STATE) {
        let task_id = object
            .get("task_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Ok(Inbound::Reset { task_id });
    }

    let command: RobotCommand =
        serde_json::from_value(value).map_err(|e| EnvelopeError::Invalid(e.to_string()))?;

    if command.task_id.is_empty() {
        return Err(EnvelopeError::EmptyTaskId);
    }

    Ok(Inbound::Command(command))
}

#[cfg(test)]
mod validation_tests {
    use super::*;
    use crate::protocol::TaskType;

    #[test]
    fn test_reset_without_task_id() {
        let inbound = decode_command(br#"{"task_type": "reset_state"}"#).unwrap();
        assert_eq!(
            inbound,
            Inbound::Reset {
                task_id: "unknown".to_string()
            }
        );
    }

    #[test]
    fn test_params_default_to_empty_object() {
        let inbound =
            decode_command(br#"{"task_id": "t1", "task_type": "setup_tube_rack"}"#).unwrap();
        match inbound {
            Inbound::Command(cmd) => {
                assert_eq!(cmd.task_type, TaskType::SetupTubeRack);
                assert!(cmd.params.is_empty());
            }
            other => panic!("expected command, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_task_type_rejected() {
        let err = decode_command(br#"{"task_id": "t1", "task_type": "make_coffee"}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::Invalid(_)));
    }

    #[test]
    fn test_params_must_be_object() {
        let err = decode_command(br#"{"task_id": "t1", "task_type": "take_photo", "params": [1]}"#)
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::Invalid(_)));
    }

    #[test]
    fn test_garbage_is_undecodable() {
        assert!(matches!(
            decode_command(b"not json"),
            Err(EnvelopeError::Undecodable(_))
        ));
        assert_eq!(decode_command(b"[1,2]"), Err(EnvelopeError::NotAnObject));
    }

    #[test]
    fn test_empty_task_id_rejected() {
        let err = decode_command(br#"{"task_id": "", "task_type": "take_photo"}"#).unwrap_err();
        assert_eq!(err, EnvelopeError::EmptyTaskId);
    }
}
