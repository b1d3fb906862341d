// src/session/mod.rs
//
// Per-connection recognition state. A session is only ever touched by the
// task serving its own connection.

mod registry;

pub use registry::{SessionRegistry, SharedSession};

use crate::camera::CameraCapture;
use crate::recognition::{ClipWindow, DebounceConfig, GestureDebouncer};
use crate::types::{EncodedFrame, RecognitionConfig};
use uuid::Uuid;

pub type ConnectionId = Uuid;

pub struct Session {
    id: ConnectionId,
    window: ClipWindow,
    debouncer: GestureDebouncer,
    last_hand_detected: bool,
    /// Inbound frames seen, for the frame-skip policy.
    frames_received: u64,
    /// Encoded frames appended since the classifier last ran.
    frames_since_classification: usize,
    camera: Option<CameraCapture>,
}

impl Session {
    pub fn new(id: ConnectionId, config: &RecognitionConfig) -> Self {
        Self {
            id,
            window: ClipWindow::with_capacity(config.clip_size),
            debouncer: GestureDebouncer::new(DebounceConfig {
                confirmation_threshold: config.confirmation_threshold,
            }),
            last_hand_detected: false,
            frames_received: 0,
            frames_since_classification: 0,
            camera: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Back to an empty window and an idle debouncer. The camera, if any,
    /// keeps running.
    pub fn reset(&mut self) {
        self.window.clear();
        self.debouncer.reset();
        self.last_hand_detected = false;
        self.frames_received = 0;
        self.frames_since_classification = 0;
    }

    /// Count an inbound frame and decide whether it is one of the
    /// 1-in-`frame_skip` that get processed.
    pub fn admit_frame(&mut self, frame_skip: u32) -> bool {
        let index = self.frames_received;
        self.frames_received += 1;
        index % u64::from(frame_skip.max(1)) == 0
    }

    pub fn record_hand(&mut self, frame: EncodedFrame) {
        self.window.append(frame);
        self.frames_since_classification += 1;
        self.last_hand_detected = true;
    }

    /// A frame without a hand adds nothing to the window. With
    /// `clear_window` the window and the debouncer start over.
    pub fn record_gap(&mut self, clear_window: bool) {
        self.last_hand_detected = false;
        if clear_window {
            self.window.clear();
            self.debouncer.reset();
            self.frames_since_classification = 0;
        }
    }

    /// Window is full and enough new frames arrived since the last run.
    pub fn ready_to_classify(&self, min_new_frames: usize) -> bool {
        self.window.is_full() && self.frames_since_classification >= min_new_frames
    }

    pub fn mark_classified(&mut self) {
        self.frames_since_classification = 0;
    }

    pub fn window(&self) -> &ClipWindow {
        &self.window
    }

    pub fn debouncer(&self) -> &GestureDebouncer {
        &self.debouncer
    }

    pub fn debouncer_mut(&mut self) -> &mut GestureDebouncer {
        &mut self.debouncer
    }

    pub fn last_hand_detected(&self) -> bool {
        self.last_hand_detected
    }

    pub fn last_gesture(&self) -> Option<&str> {
        self.debouncer.last_label()
    }

    pub fn confirmations(&self) -> u32 {
        self.debouncer.confirmations()
    }

    pub fn camera(&self) -> Option<&CameraCapture> {
        self.camera.as_ref()
    }

    /// Install a camera, handing back the one it replaces so the caller can
    /// stop it.
    pub fn replace_camera(&mut self, camera: CameraCapture) -> Option<CameraCapture> {
        self.camera.replace(camera)
    }

    pub fn take_camera(&mut self) -> Option<CameraCapture> {
        self.camera.take()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("frames_collected", &self.window.len())
            .field("state", self.debouncer.state())
            .field("last_hand_detected", &self.last_hand_detected)
            .field("camera", &self.camera.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ENCODED_FRAME_LEN;

    fn session(clip_size: usize) -> Session {
        Session::new(
            Uuid::new_v4(),
            &RecognitionConfig {
                clip_size,
                ..RecognitionConfig::default()
            },
        )
    }

    #[test]
    fn test_built_from_recognition_config() {
        let s = Session::new(
            Uuid::new_v4(),
            &RecognitionConfig {
                clip_size: 12,
                confirmation_threshold: 4,
                ..RecognitionConfig::default()
            },
        );
        assert_eq!(s.window().capacity(), 12);
        assert_eq!(s.debouncer().threshold(), 4);
        assert_eq!(s.debouncer().state(), &crate::recognition::DebounceState::Idle);
    }

    #[test]
    fn test_frame_skip_admits_one_in_n() {
        let mut s = session(10);
        let admitted: Vec<bool> = (0..6).map(|_| s.admit_frame(3)).collect();
        assert_eq!(admitted, vec![true, false, false, true, false, false]);

        let mut s = session(10);
        assert!((0..5).all(|_| s.admit_frame(1)));
    }

    #[test]
    fn test_ready_to_classify_respects_stride() {
        let mut s = session(10);
        for _ in 0..10 {
            s.record_hand([0.0; ENCODED_FRAME_LEN]);
        }
        assert!(s.ready_to_classify(3));
        s.mark_classified();
        assert!(!s.ready_to_classify(3));
        assert!(s.ready_to_classify(0));

        s.record_hand([0.0; ENCODED_FRAME_LEN]);
        s.record_hand([0.0; ENCODED_FRAME_LEN]);
        assert!(!s.ready_to_classify(3));
        s.record_hand([0.0; ENCODED_FRAME_LEN]);
        assert!(s.ready_to_classify(3));
    }

    #[test]
    fn test_gap_keeps_window_by_default() {
        let mut s = session(10);
        s.record_hand([1.0; ENCODED_FRAME_LEN]);
        s.debouncer_mut().observe("ola");

        s.record_gap(false);
        assert!(!s.last_hand_detected());
        assert_eq!(s.window().len(), 1);
        assert_eq!(s.last_gesture(), Some("ola"));

        s.record_gap(true);
        assert!(s.window().is_empty());
        assert_eq!(s.last_gesture(), None);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut s = session(10);
        s.record_hand([1.0; ENCODED_FRAME_LEN]);
        s.debouncer_mut().observe("sim");
        s.admit_frame(2);

        s.reset();
        assert!(s.window().is_empty());
        assert_eq!(s.confirmations(), 0);
        assert!(!s.last_hand_detected());
        assert!(s.admit_frame(2));
    }
}
