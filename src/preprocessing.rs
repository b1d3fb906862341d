// src/preprocessing.rs
//
// Frame payload decoding and resizing to the working resolution.

use crate::error::FrameError;
use crate::types::Frame;
use base64::Engine;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};

/// Decode a base64 image payload (optionally a `data:image/...;base64,` URL)
/// into an RGB frame.
pub fn decode_payload(payload: &str, max_bytes: usize) -> Result<Frame, FrameError> {
    let encoded = match payload.find(";base64,") {
        Some(idx) if payload.starts_with("data:") => &payload[idx + ";base64,".len()..],
        _ => payload,
    };

    // base64 inflates by 4/3; reject early before allocating
    if encoded.len() / 4 * 3 > max_bytes {
        return Err(FrameError::decode(format!(
            "payload of ~{} bytes exceeds limit of {} bytes",
            encoded.len() / 4 * 3,
            max_bytes
        )));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| FrameError::decode(format!("invalid base64: {}", e)))?;

    decode_image(&bytes)
}

/// Decode JPEG/PNG bytes into an RGB frame.
pub fn decode_image(bytes: &[u8]) -> Result<Frame, FrameError> {
    if bytes.is_empty() {
        return Err(FrameError::decode("empty image"));
    }

    let image = image::load_from_memory(bytes)
        .map_err(|e| FrameError::decode(format!("unreadable image: {}", e)))?
        .to_rgb8();

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(FrameError::decode("image has no pixels"));
    }

    Ok(Frame::new(image.into_raw(), width as usize, height as usize))
}

/// Downscale to the working resolution when the frame is wider than it.
/// Frames at or below the working width pass through untouched.
pub fn fit_to_working_resolution(
    frame: Frame,
    work_w: usize,
    work_h: usize,
) -> Result<Frame, FrameError> {
    if frame.width <= work_w {
        return Ok(frame);
    }
    resize_rgb(&frame, work_w, work_h)
}

/// Mirror a frame horizontally (selfie view).
pub fn flip_horizontal(frame: &mut Frame) {
    let row_len = frame.width * 3;
    for row in frame.data.chunks_exact_mut(row_len) {
        for x in 0..frame.width / 2 {
            let mirror = frame.width - 1 - x;
            for c in 0..3 {
                row.swap(x * 3 + c, mirror * 3 + c);
            }
        }
    }
}

/// Bilinear resize of a packed RGB frame.
pub fn resize_rgb(frame: &Frame, dst_w: usize, dst_h: usize) -> Result<Frame, FrameError> {
    let view = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(
        frame.width as u32,
        frame.height as u32,
        frame.data.as_slice(),
    )
    .ok_or_else(|| {
        FrameError::decode(format!(
            "frame buffer does not match {}x{}",
            frame.width, frame.height
        ))
    })?;

    let resized = imageops::resize(&view, dst_w as u32, dst_h as u32, FilterType::Triangle);
    Ok(Frame::new(resized.into_raw(), dst_w, dst_h))
}
