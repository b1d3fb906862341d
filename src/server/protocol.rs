// src/server/protocol.rs
//
// JSON event envelope: `{"event": <name>, "data": <payload>}` in both
// directions.

use crate::error::ProtocolError;
use crate::types::ClassificationResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureSource {
    /// Browser sends frames with `submit_frame`.
    #[default]
    Client,
    /// Frames come from the server's own camera.
    Server,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StartCapture { source: CaptureSource },
    StopCapture,
    ResetCapture,
    SubmitFrame { image: String },
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;

        match envelope.event.as_str() {
            "start_capture" => {
                let source = match envelope.data.get("source").and_then(Value::as_str) {
                    None | Some("client") => CaptureSource::Client,
                    Some("server") => CaptureSource::Server,
                    Some(other) => return Err(ProtocolError::UnknownSource(other.to_string())),
                };
                Ok(Self::StartCapture { source })
            }
            "stop_capture" => Ok(Self::StopCapture),
            "reset_capture" => Ok(Self::ResetCapture),
            "submit_frame" | "process_frame" => {
                let image = envelope
                    .data
                    .get("image")
                    .and_then(Value::as_str)
                    .ok_or(ProtocolError::MissingField {
                        event: "submit_frame",
                        field: "image",
                    })?;
                Ok(Self::SubmitFrame {
                    image: image.to_string(),
                })
            }
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationResult {
    pub gesture: Option<String>,
    pub confianca: u8,
    pub hand_detected: bool,
}

impl From<&ClassificationResult> for TranslationResult {
    fn from(result: &ClassificationResult) -> Self {
        Self {
            gesture: result.gesture.clone(),
            confianca: result.confidence,
            hand_detected: result.hand_detected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    TranslationResult(TranslationResult),
    Status { message: String },
    Error { message: String },
}

impl ServerEvent {
    pub fn status<S: Into<String>>(message: S) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Inference;
    use serde_json::json;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ClientEvent::parse(r#"{"event":"start_capture"}"#).unwrap(),
            ClientEvent::StartCapture {
                source: CaptureSource::Client
            }
        );
        assert_eq!(
            ClientEvent::parse(r#"{"event":"start_capture","data":{"source":"server"}}"#).unwrap(),
            ClientEvent::StartCapture {
                source: CaptureSource::Server
            }
        );
        assert_eq!(
            ClientEvent::parse(r#"{"event":"stop_capture","data":{}}"#).unwrap(),
            ClientEvent::StopCapture
        );
        assert_eq!(
            ClientEvent::parse(r#"{"event":"reset_capture"}"#).unwrap(),
            ClientEvent::ResetCapture
        );
    }

    #[test]
    fn test_parse_frame_and_alias() {
        let expected = ClientEvent::SubmitFrame {
            image: "aGVsbG8=".to_string(),
        };
        assert_eq!(
            ClientEvent::parse(r#"{"event":"submit_frame","data":{"image":"aGVsbG8="}}"#).unwrap(),
            expected
        );
        assert_eq!(
            ClientEvent::parse(r#"{"event":"process_frame","data":{"image":"aGVsbG8="}}"#).unwrap(),
            expected
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            ClientEvent::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientEvent::parse(r#"{"event":"dance"}"#),
            Err(ProtocolError::UnknownEvent(e)) if e == "dance"
        ));
        assert!(matches!(
            ClientEvent::parse(r#"{"event":"submit_frame","data":{}}"#),
            Err(ProtocolError::MissingField { field: "image", .. })
        ));
        assert!(matches!(
            ClientEvent::parse(r#"{"event":"start_capture","data":{"source":"drone"}}"#),
            Err(ProtocolError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_translation_result_wire_format() {
        let result = ClassificationResult {
            gesture: Some("sim".to_string()),
            confidence: 60,
            hand_detected: true,
            frames_collected: 30,
            inference: Inference::Predicted("sim".to_string()),
        };
        let event = ServerEvent::TranslationResult(TranslationResult::from(&result));
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "translation_result",
                "data": {"gesture": "sim", "confianca": 60, "hand_detected": true}
            })
        );
    }

    #[test]
    fn test_null_gesture_and_status_wire_format() {
        let event = ServerEvent::TranslationResult(TranslationResult {
            gesture: None,
            confianca: 0,
            hand_detected: false,
        });
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["data"]["gesture"], Value::Null);

        let status: Value =
            serde_json::from_str(&ServerEvent::status("Conectado ao servidor").to_json().unwrap())
                .unwrap();
        assert_eq!(
            status,
            json!({"event": "status", "data": {"message": "Conectado ao servidor"}})
        );
    }
}
