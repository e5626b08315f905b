//! Frame validation utilities.
//!
//! Checks that captured payloads are plausible for the settings they were
//! captured with. Used by the test suites and by the CLI's `capture --check`.

use crate::camera::Settings;
use crate::error::{CameraError, Result};
use crate::traits::{FourCC, Frame};

/// JPEG start-of-image marker.
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Validates a frame's payload size against the capture settings.
///
/// Uncompressed formats must fill exactly one image. Compressed formats must
/// be non-empty and no larger than an uncompressed 24-bit image of the same
/// size; MJPG payloads must also start with a JPEG SOI marker.
///
/// # Errors
///
/// Returns `Device` if the payload does not fit the settings, or
/// `InvalidArgument` if the format has no known layout.
pub fn validate_payload(frame: &Frame, settings: &Settings) -> Result<()> {
    let len = frame.data.len();
    let fourcc = settings.format;

    if fourcc.is_compressed() {
        let limit = (settings.width as usize) * (settings.height as usize) * 3;
        if len == 0 || len > limit {
            return Err(CameraError::Device(format!(
                "{fourcc} payload of {len} bytes is outside 1..={limit}"
            )));
        }
        if fourcc == FourCC::MJPG && !frame.data.starts_with(&JPEG_SOI) {
            return Err(CameraError::Device(
                "MJPG payload does not start with a JPEG SOI marker".to_owned(),
            ));
        }
        return Ok(());
    }

    let expected = fourcc
        .image_size(settings.width, settings.height)
        .ok_or_else(|| {
            CameraError::InvalidArgument(format!("no known image layout for {fourcc}"))
        })?;
    if len != expected {
        return Err(CameraError::Device(format!(
            "{fourcc} {}x{} payload is {len} bytes, expected {expected}",
            settings.width, settings.height
        )));
    }

    Ok(())
}

/// Validates that a sequence of frames has incrementing sequence numbers.
///
/// # Errors
///
/// Returns `InvalidArgument` if `frames` is empty, or `Device` if any
/// sequence number doesn't increment by exactly 1 from the previous.
pub fn validate_frame_sequence(frames: &[Frame]) -> Result<()> {
    if frames.is_empty() {
        return Err(CameraError::InvalidArgument(
            "cannot validate empty frame sequence".to_owned(),
        ));
    }

    for (i, pair) in frames.windows(2).enumerate() {
        let prev_seq = pair[0].metadata.sequence;
        let curr_seq = pair[1].metadata.sequence;

        if curr_seq != prev_seq.wrapping_add(1) {
            return Err(CameraError::Device(format!(
                "frame sequence gap at index {}: expected {}, got {curr_seq}",
                i + 1,
                prev_seq.wrapping_add(1)
            )));
        }
    }

    Ok(())
}
