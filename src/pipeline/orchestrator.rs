// src/pipeline/orchestrator.rs
//
// One call per inbound frame: resize → landmarks → encode → window →
// classify → debounce. Only the session passed in is mutated; the extractor
// and classifier are shared, the metrics are atomics.

use super::metrics::PipelineMetrics;
use crate::error::FrameError;
use crate::inference::GestureClassifier;
use crate::landmarks::LandmarkExtractor;
use crate::preprocessing::{decode_payload, fit_to_working_resolution};
use crate::recognition::encode_frame;
use crate::session::Session;
use crate::types::{ClassificationResult, Config, Frame, Inference};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub working_width: usize,
    pub working_height: usize,
    pub frame_skip: u32,
    pub min_new_frames: usize,
    pub clear_window_on_gap: bool,
    pub max_frame_bytes: usize,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            working_width: config.performance.working_width as usize,
            working_height: config.performance.working_height as usize,
            frame_skip: config.performance.frame_skip,
            min_new_frames: config.recognition.min_new_frames,
            clear_window_on_gap: config.recognition.clear_window_on_gap,
            max_frame_bytes: config.server.max_frame_bytes,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct FramePipeline {
    extractor: Arc<dyn LandmarkExtractor>,
    classifier: Option<Arc<dyn GestureClassifier>>,
    config: PipelineConfig,
    metrics: PipelineMetrics,
}

impl FramePipeline {
    pub fn new(
        extractor: Arc<dyn LandmarkExtractor>,
        classifier: Option<Arc<dyn GestureClassifier>>,
        config: PipelineConfig,
        metrics: PipelineMetrics,
    ) -> Self {
        if classifier.is_none() {
            info!("Pipeline running without classifier: gestures are never confirmed");
        }
        Self {
            extractor,
            classifier,
            config,
            metrics,
        }
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Frame-skip policy: count the inbound frame and say whether to run it.
    pub fn should_process(&self, session: &mut Session) -> bool {
        self.metrics.inc(&self.metrics.frames_received);
        let admitted = session.admit_frame(self.config.frame_skip);
        if !admitted {
            self.metrics.inc(&self.metrics.frames_skipped);
        }
        admitted
    }

    /// Decode a base64 payload and process it.
    pub fn process_payload(
        &self,
        payload: &str,
        session: &mut Session,
    ) -> Result<ClassificationResult, FrameError> {
        let frame = decode_payload(payload, self.config.max_frame_bytes).map_err(|e| {
            self.metrics.inc(&self.metrics.decode_failures);
            warn!(session = %session.id(), "Dropping frame: {}", e);
            e
        })?;
        self.process(frame, session)
    }

    pub fn process(
        &self,
        frame: Frame,
        session: &mut Session,
    ) -> Result<ClassificationResult, FrameError> {
        if !frame.is_valid() {
            self.metrics.inc(&self.metrics.decode_failures);
            return Err(FrameError::decode(format!(
                "frame buffer does not match {}x{}",
                frame.width, frame.height
            )));
        }

        let frame = fit_to_working_resolution(
            frame,
            self.config.working_width,
            self.config.working_height,
        )?;

        let start = Instant::now();
        let hand = self
            .extractor
            .detect(&frame, session.last_hand_detected())
            .map_err(|e| {
                self.metrics.inc(&self.metrics.extraction_failures);
                warn!(session = %session.id(), "Dropping frame: {}", e);
                FrameError::from(e)
            })?;
        self.metrics
            .set_timing(&self.metrics.extraction_time_us, start.elapsed().as_micros() as u64);
        self.metrics.inc(&self.metrics.frames_processed);

        match encode_frame(hand.as_ref()) {
            Some(encoded) => {
                self.metrics.inc(&self.metrics.frames_with_hand);
                session.record_hand(encoded);
            }
            None => session.record_gap(self.config.clear_window_on_gap),
        }

        let inference = self.classify(session);

        let (gesture, confidence) = match &inference {
            Inference::Predicted(label) => match session.debouncer_mut().observe(label) {
                Some(confirmed) => {
                    self.metrics.inc(&self.metrics.gestures_confirmed);
                    info!(
                        session = %session.id(),
                        "✋ Gesture confirmed: {} ({}%)",
                        confirmed.label, confirmed.confidence
                    );
                    (Some(confirmed.label), confirmed.confidence)
                }
                None => (None, 0),
            },
            _ => (None, 0),
        };

        Ok(ClassificationResult {
            gesture,
            confidence,
            hand_detected: session.last_hand_detected(),
            frames_collected: session.window().len(),
            inference,
        })
    }

    fn classify(&self, session: &mut Session) -> Inference {
        if !session.ready_to_classify(self.config.min_new_frames) {
            return Inference::NotReady;
        }
        let Some(classifier) = &self.classifier else {
            return Inference::Unavailable;
        };

        session.mark_classified();
        self.metrics.inc(&self.metrics.classifications);

        let start = Instant::now();
        let outcome = classifier.predict(&session.window().flatten());
        self.metrics.set_timing(
            &self.metrics.classification_time_us,
            start.elapsed().as_micros() as u64,
        );

        match outcome {
            Ok(label) if label.trim().is_empty() => {
                self.metrics.inc(&self.metrics.classifier_failures);
                warn!(session = %session.id(), "Classifier returned an empty label");
                Inference::Failed("empty label".to_string())
            }
            Ok(label) => {
                debug!(session = %session.id(), "Prediction: {}", label);
                Inference::Predicted(label)
            }
            Err(e) => {
                self.metrics.inc(&self.metrics.classifier_failures);
                warn!(session = %session.id(), "Classifier failed: {}", e);
                Inference::Failed(e.to_string())
            }
        }
    }
}
