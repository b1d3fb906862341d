// src/pipeline/metrics.rs
//
// Process-wide counters for the frame pipeline. Cheap to clone; every
// clone shares the same atomics. Served on /health.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub frames_received: Arc<AtomicU64>,
    pub frames_skipped: Arc<AtomicU64>,
    pub frames_processed: Arc<AtomicU64>,
    pub frames_with_hand: Arc<AtomicU64>,
    pub decode_failures: Arc<AtomicU64>,
    pub extraction_failures: Arc<AtomicU64>,
    pub dropped_frames: Arc<AtomicU64>,
    pub classifications: Arc<AtomicU64>,
    pub classifier_failures: Arc<AtomicU64>,
    pub gestures_confirmed: Arc<AtomicU64>,
    pub sessions_opened: Arc<AtomicU64>,
    pub sessions_closed: Arc<AtomicU64>,
    pub extraction_time_us: Arc<AtomicU64>,
    pub classification_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            frames_received: Arc::new(AtomicU64::new(0)),
            frames_skipped: Arc::new(AtomicU64::new(0)),
            frames_processed: Arc::new(AtomicU64::new(0)),
            frames_with_hand: Arc::new(AtomicU64::new(0)),
            decode_failures: Arc::new(AtomicU64::new(0)),
            extraction_failures: Arc::new(AtomicU64::new(0)),
            dropped_frames: Arc::new(AtomicU64::new(0)),
            classifications: Arc::new(AtomicU64::new(0)),
            classifier_failures: Arc::new(AtomicU64::new(0)),
            gestures_confirmed: Arc::new(AtomicU64::new(0)),
            sessions_opened: Arc::new(AtomicU64::new(0)),
            sessions_closed: Arc::new(AtomicU64::new(0)),
            extraction_time_us: Arc::new(AtomicU64::new(0)),
            classification_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.frames_processed.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let opened = self.sessions_opened.load(Ordering::Relaxed);
        let closed = self.sessions_closed.load(Ordering::Relaxed);
        MetricsSummary {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_with_hand: self.frames_with_hand.load(Ordering::Relaxed),
            fps: self.fps(),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            classifications: self.classifications.load(Ordering::Relaxed),
            classifier_failures: self.classifier_failures.load(Ordering::Relaxed),
            gestures_confirmed: self.gestures_confirmed.load(Ordering::Relaxed),
            active_sessions: opened.saturating_sub(closed),
            last_extraction_us: self.extraction_time_us.load(Ordering::Relaxed),
            last_classification_us: self.classification_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_received: u64,
    pub frames_skipped: u64,
    pub frames_processed: u64,
    pub frames_with_hand: u64,
    pub fps: f64,
    pub decode_failures: u64,
    pub extraction_failures: u64,
    pub dropped_frames: u64,
    pub classifications: u64,
    pub classifier_failures: u64,
    pub gestures_confirmed: u64,
    pub active_sessions: u64,
    pub last_extraction_us: u64,
    pub last_classification_us: u64,
    pub elapsed_secs: f64,
}
