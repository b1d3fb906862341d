// src/config.rs

use crate::error::ConfigError;
use crate::types::{
    CameraConfig, ClassifierConfig, Config, LandmarkConfig, LoggingConfig, PerformanceConfig,
    RecognitionConfig, ServerConfig,
};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the built-in defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let lm = &self.landmarks;
        if !(0.0..=1.0).contains(&lm.min_detection_confidence) {
            errors.push("landmarks.min_detection_confidence must be between 0 and 1".to_string());
        }
        if !(0.0..=1.0).contains(&lm.min_tracking_confidence) {
            errors.push("landmarks.min_tracking_confidence must be between 0 and 1".to_string());
        }
        if lm.max_hands != 1 {
            errors.push(format!(
                "landmarks.max_hands must be 1 (got {})",
                lm.max_hands
            ));
        }
        if lm.input_size == 0 {
            errors.push("landmarks.input_size must be > 0".to_string());
        }

        let rec = &self.recognition;
        if rec.clip_size < 10 {
            errors.push(format!(
                "recognition.clip_size must be >= 10 (got {})",
                rec.clip_size
            ));
        }
        if rec.confirmation_threshold < 1 {
            errors.push("recognition.confirmation_threshold must be >= 1".to_string());
        }

        let perf = &self.performance;
        if perf.frame_skip < 1 {
            errors.push("performance.frame_skip must be >= 1".to_string());
        }
        if perf.working_width == 0 || perf.working_height == 0 {
            errors.push("performance working resolution must be non-zero".to_string());
        }

        if self.classifier.labels.is_empty() {
            errors.push("classifier.labels must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Length of the classifier input vector (`clip_size × 63`).
    pub fn classifier_input_len(&self) -> usize {
        self.recognition.clip_size * crate::types::ENCODED_FRAME_LEN
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            static_dir: None,
            max_frame_bytes: 10_000_000,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 320,
            height: 240,
            fps: 30,
            mirror: true,
        }
    }
}

impl Default for LandmarkConfig {
    fn default() -> Self {
        Self {
            model_path: "models/hand_landmark.onnx".to_string(),
            input_size: 224,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.5,
            max_hands: 1,
            num_threads: 2,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: "models/modelo_libras.onnx".to_string(),
            labels: vec!["ola".to_string(), "sim".to_string(), "nao".to_string()],
            num_threads: 2,
            use_cuda: false,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            clip_size: 30,
            confirmation_threshold: 2,
            min_new_frames: 0,
            clear_window_on_gap: false,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            working_width: 320,
            working_height: 240,
            frame_skip: 1,
            frame_timeout_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
