// src/recognition/clip_window.rs
//
// Sliding window of encoded frames feeding the classifier.
// Append-only with FIFO eviction; nothing is reordered.

use crate::types::{EncodedFrame, ENCODED_FRAME_LEN};
use std::collections::VecDeque;

pub const DEFAULT_CLIP_SIZE: usize = 30;

#[derive(Debug, Clone)]
pub struct ClipWindow {
    frames: VecDeque<EncodedFrame>,
    capacity: usize,
}

impl ClipWindow {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CLIP_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, frame: EncodedFrame) {
        if self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<EncodedFrame> {
        self.frames.iter().copied().collect()
    }

    /// Snapshot concatenated into one `len × 63` vector (classifier input).
    pub fn flatten(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.frames.len() * ENCODED_FRAME_LEN);
        for frame in &self.frames {
            flat.extend_from_slice(frame);
        }
        flat
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ClipWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: f32) -> EncodedFrame {
        [tag; ENCODED_FRAME_LEN]
    }

    #[test]
    fn test_fills_up_to_capacity() {
        let mut window = ClipWindow::with_capacity(3);
        assert!(window.is_empty());

        window.append(frame(0.0));
        window.append(frame(1.0));
        assert!(!window.is_full());

        window.append(frame(2.0));
        assert!(window.is_full());
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_sliding_window_keeps_latest_in_order() {
        let capacity = 30;
        let mut window = ClipWindow::with_capacity(capacity);
        let total: usize = 77;

        for i in 0..total {
            window.append(frame(i as f32));
            assert!(window.len() <= capacity);

            let snapshot = window.snapshot();
            let expected_start = (i + 1).saturating_sub(capacity);
            let expected: Vec<f32> = (expected_start..=i).map(|v| v as f32).collect();
            let actual: Vec<f32> = snapshot.iter().map(|f| f[0]).collect();
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut window = ClipWindow::with_capacity(2);
        window.append(frame(1.0));
        let _ = window.snapshot();
        let _ = window.flatten();
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_flatten_matches_classifier_layout() {
        let mut window = ClipWindow::with_capacity(30);
        for i in 0..30 {
            window.append(frame(i as f32));
        }
        let flat = window.flatten();
        assert_eq!(flat.len(), 1890);
        assert_eq!(flat[0], 0.0);
        assert_eq!(flat[63], 1.0);
        assert_eq!(flat[1889], 29.0);
    }

    #[test]
    fn test_clear_resets() {
        let mut window = ClipWindow::with_capacity(2);
        window.append(frame(1.0));
        window.append(frame(2.0));
        window.clear();
        assert!(window.is_empty());
        assert!(!window.is_full());
        assert_eq!(window.capacity(), 2);
    }
}
