//! V4L2 camera capture.
//!
//! [`Camera`] owns one open video device node. It enumerates the device's
//! pixel formats, frame sizes, frame rates and hardware controls, stores the
//! desired capture settings, and streams frames through a small ring of
//! memory-mapped buffers.
//!
//! The device backend sits behind the [`CameraDevice`] and [`CaptureStream`]
//! traits, so the state machine can be exercised without hardware.
//!
//! ```no_run
//! use v4l2_camera::Camera;
//!
//! # fn main() -> v4l2_camera::Result<()> {
//! let mut camera = Camera::open("/dev/video0")?;
//! camera.set_format("YUYV")?;
//! camera.set_image_width(640)?;
//! camera.set_image_height(480)?;
//! camera.set_framerate(30)?;
//!
//! let frame = camera.start_with(|camera| camera.capture())?;
//! println!("{} bytes", frame.data.len());
//! # Ok(())
//! # }
//! ```

pub mod camera;
pub mod catalog;
pub mod config;
pub mod controls;
pub mod device;
pub mod error;
pub mod stream;
pub mod traits;
pub mod validation;
pub mod value;

#[cfg(test)]
pub mod mock;

pub use camera::{Camera, Settings, State, StreamGuard};
pub use controls::{BooleanControl, Control, ControlValue, IntegerControl, MenuControl, MenuItem};
pub use device::{DeviceNode, V4L2Device, V4L2Stream};
pub use error::{CameraError, Result};
pub use traits::{
    CameraDevice, CaptureStream, DeviceCapabilities, Format, FormatDescription, FourCC, Frame,
    FrameCapability, FrameMetadata, Interval,
};
pub use value::{Symbol, Value};
