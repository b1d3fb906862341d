// src/error.rs
//
// Typed failures for the per-frame path. Everything here is caught at the
// pipeline or connection boundary; none of it closes a connection.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Why a single inbound frame produced no result.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Payload was not valid base64 or not a decodable image.
    #[error("frame decode failed: {0}")]
    Decode(String),

    #[error("landmark extraction failed: {0}")]
    Extraction(#[from] LandmarkError),

    #[error("frame processing exceeded {0:?}")]
    Timeout(Duration),

    #[error("unexpected frame failure: {0}")]
    Unexpected(String),
}

impl FrameError {
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        FrameError::Decode(msg.into())
    }

    /// Short tag used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Extraction(_) => "extraction",
            Self::Timeout(_) => "timeout",
            Self::Unexpected(_) => "unexpected",
        }
    }
}

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("failed to load landmark model: {0}")]
    ModelLoad(String),

    #[error("landmark inference failed: {0}")]
    Inference(String),

    #[error("unexpected landmark output: {0}")]
    Output(String),
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("failed to load classifier: {0}")]
    ModelLoad(String),

    #[error("classifier input has {actual} values, expected {expected}")]
    InputLength { expected: usize, actual: usize },

    #[error("classifier inference failed: {0}")]
    Inference(String),

    #[error("classifier returned no prediction")]
    EmptyOutput,

    #[error("class index {0} has no label")]
    UnknownClass(i64),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no camera could be opened: {0}")]
    Unavailable(String),

    #[error("camera read failed: {0}")]
    Read(String),

    #[error("camera stream ended")]
    Ended,

    #[error("server camera support is not compiled in")]
    Unsupported,
}

/// Inbound message that could not be understood.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    #[error("event '{event}' is missing '{field}'")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },

    #[error("unknown capture source '{0}'")]
    UnknownSource(String),
}
