// src/types.rs

use serde::{Deserialize, Serialize};

/// Number of keypoints the hand landmark model reports per hand.
pub const NUM_LANDMARKS: usize = 21;

/// Length of one encoded frame (21 landmarks × xyz).
pub const ENCODED_FRAME_LEN: usize = NUM_LANDMARKS * 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub landmarks: LandmarkConfig,
    pub classifier: ClassifierConfig,
    pub recognition: RecognitionConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory with the browser client, served at `/` when set.
    pub static_dir: Option<String>,
    pub max_frame_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: i32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub mirror: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkConfig {
    pub model_path: String,
    pub input_size: u32,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub max_hands: usize,
    pub num_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model_path: String,
    pub labels: Vec<String>,
    pub num_threads: usize,
    pub use_cuda: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub clip_size: usize,
    pub confirmation_threshold: u32,
    /// Encoded frames that must arrive between two classifications once the
    /// window is full. 0 classifies on every processed frame.
    pub min_new_frames: usize,
    pub clear_window_on_gap: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub working_width: u32,
    pub working_height: u32,
    /// Process 1 of every N inbound frames.
    pub frame_skip: u32,
    pub frame_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "en")]
    En,
}

/// A decoded frame in packed RGB8 layout.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.width * self.height * 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// The 21 keypoints of one detected hand, in model index order
/// (wrist first, then thumb, index, middle, ring and pinky, base to tip).
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    pub points: [Landmark; NUM_LANDMARKS],
    /// Hand presence score reported by the detector.
    pub score: f32,
}

impl LandmarkSet {
    pub fn new(points: [Landmark; NUM_LANDMARKS], score: f32) -> Self {
        Self { points, score }
    }
}

/// Flattened landmark coordinates of one frame: x0, y0, z0, x1, ...
pub type EncodedFrame = [f32; ENCODED_FRAME_LEN];

/// What happened to the classifier on a processed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inference {
    /// Window not full yet, or not enough new frames since the last run.
    NotReady,
    /// No classifier loaded.
    Unavailable,
    Predicted(String),
    /// The classifier rejected the input. The debouncer was left untouched.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub gesture: Option<String>,
    /// 0-100, only non-zero for a confirmed gesture.
    pub confidence: u8,
    pub hand_detected: bool,
    pub frames_collected: usize,
    pub inference: Inference,
}
