// src/recognition/mod.rs

mod clip_window;
mod features;
mod state_machine;

// Re-export public APIs
pub use clip_window::ClipWindow;
pub use features::{encode_frame, encode_landmarks};
pub use state_machine::{
    confidence_for, ConfirmedGesture, DebounceConfig, DebounceState, GestureDebouncer,
    CONFIDENCE_CAP, CONFIDENCE_STEP,
};
