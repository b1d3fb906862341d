// src/recognition/features.rs

use crate::types::{EncodedFrame, LandmarkSet, ENCODED_FRAME_LEN};

/// Flatten a hand into the 63-value layout the classifier was trained on:
/// landmark 0..20, each as x, y, z.
pub fn encode_landmarks(hand: &LandmarkSet) -> EncodedFrame {
    let mut encoded = [0.0f32; ENCODED_FRAME_LEN];
    for (i, point) in hand.points.iter().enumerate() {
        encoded[i * 3] = point.x;
        encoded[i * 3 + 1] = point.y;
        encoded[i * 3 + 2] = point.z;
    }
    encoded
}

/// No hand means no frame, never a zero vector.
pub fn encode_frame(hand: Option<&LandmarkSet>) -> Option<EncodedFrame> {
    hand.map(encode_landmarks)
}
