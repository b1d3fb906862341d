// src/landmarks.rs
//
// Hand landmark extraction. The pipeline only sees the `LandmarkExtractor`
// trait; `OnnxHandLandmarker` runs a MediaPipe-style hand landmark model
// (NHWC float input in [0, 1], outputs: 63 pixel-space coordinates and a
// hand presence logit) through ONNX Runtime.

use crate::error::LandmarkError;
use crate::preprocessing::resize_rgb;
use crate::types::{Frame, Landmark, LandmarkConfig, LandmarkSet, ENCODED_FRAME_LEN, NUM_LANDMARKS};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info};

pub trait LandmarkExtractor: Send + Sync {
    /// Find at most one hand in `frame`.
    ///
    /// `tracking` is true when the previous frame of the same session had a
    /// hand, which lets the detector apply its (lower) tracking threshold.
    fn detect(&self, frame: &Frame, tracking: bool) -> Result<Option<LandmarkSet>, LandmarkError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceThresholds {
    pub min_detection: f32,
    pub min_tracking: f32,
}

impl ConfidenceThresholds {
    pub fn from_config(config: &LandmarkConfig) -> Self {
        Self {
            min_detection: config.min_detection_confidence,
            min_tracking: config.min_tracking_confidence,
        }
    }

    pub fn threshold(&self, tracking: bool) -> f32 {
        if tracking {
            self.min_tracking
        } else {
            self.min_detection
        }
    }

    pub fn accepts(&self, score: f32, tracking: bool) -> bool {
        score >= self.threshold(tracking)
    }
}

pub struct OnnxHandLandmarker {
    // ort sessions need exclusive access per run
    session: Mutex<Session>,
    input_size: usize,
    thresholds: ConfidenceThresholds,
}

impl OnnxHandLandmarker {
    pub fn new(config: &LandmarkConfig) -> Result<Self, LandmarkError> {
        info!("Loading hand landmark model: {}", config.model_path);

        if !Path::new(&config.model_path).exists() {
            return Err(LandmarkError::ModelLoad(format!(
                "{} not found",
                config.model_path
            )));
        }

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(config.num_threads.max(1)))
            .and_then(|b| b.commit_from_file(&config.model_path))
            .map_err(|e| LandmarkError::ModelLoad(e.to_string()))?;

        info!("✓ Hand landmark model loaded");

        Ok(Self {
            session: Mutex::new(session),
            input_size: config.input_size as usize,
            thresholds: ConfidenceThresholds::from_config(config),
        })
    }

    fn prepare_input(&self, frame: &Frame) -> Result<Array4<f32>, LandmarkError> {
        let size = self.input_size;
        let resized = resize_rgb(frame, size, size)
            .map_err(|e| LandmarkError::Inference(format!("input resize: {}", e)))?;
        let pixels: Vec<f32> = resized.data.iter().map(|&v| v as f32 / 255.0).collect();
        Array4::from_shape_vec((1, size, size, 3), pixels)
            .map_err(|e| LandmarkError::Inference(format!("input tensor: {}", e)))
    }
}

impl LandmarkExtractor for OnnxHandLandmarker {
    fn detect(&self, frame: &Frame, tracking: bool) -> Result<Option<LandmarkSet>, LandmarkError> {
        if !frame.is_valid() {
            return Err(LandmarkError::Inference(format!(
                "frame buffer does not match {}x{}",
                frame.width, frame.height
            )));
        }

        let input = Tensor::from_array(self.prepare_input(frame)?)
            .map_err(|e| LandmarkError::Inference(e.to_string()))?;

        let (coords, presence) = {
            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![input])
                .map_err(|e| LandmarkError::Inference(e.to_string()))?;

            if outputs.len() < 2 {
                return Err(LandmarkError::Output(format!(
                    "expected landmark and presence outputs, got {}",
                    outputs.len()
                )));
            }

            let (_, coords) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| LandmarkError::Output(e.to_string()))?;
            let (_, presence) = outputs[1]
                .try_extract_tensor::<f32>()
                .map_err(|e| LandmarkError::Output(e.to_string()))?;

            (coords.to_vec(), presence.first().copied())
        };

        let presence =
            presence.ok_or_else(|| LandmarkError::Output("empty presence output".to_string()))?;
        let score = sigmoid(presence);

        if !self.thresholds.accepts(score, tracking) {
            debug!(score, tracking, "no hand above threshold");
            return Ok(None);
        }

        decode_landmarks(&coords, self.input_size as f32, score).map(Some)
    }
}

/// Convert pixel-space model output into normalized landmarks.
pub fn decode_landmarks(
    coords: &[f32],
    input_size: f32,
    score: f32,
) -> Result<LandmarkSet, LandmarkError> {
    if coords.len() < ENCODED_FRAME_LEN {
        return Err(LandmarkError::Output(format!(
            "expected {} landmark values, got {}",
            ENCODED_FRAME_LEN,
            coords.len()
        )));
    }

    let mut points = [Landmark::default(); NUM_LANDMARKS];
    for (i, point) in points.iter_mut().enumerate() {
        *point = Landmark::new(
            coords[i * 3] / input_size,
            coords[i * 3 + 1] / input_size,
            coords[i * 3 + 2] / input_size,
        );
    }
    Ok(LandmarkSet::new(points, score))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
