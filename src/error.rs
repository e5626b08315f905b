//! Error type shared by every camera operation.

use thiserror::Error;

use crate::camera::State;

/// Error type for camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The device node could not be opened, is held elsewhere, or reported a fault.
    #[error("device error: {0}")]
    Device(String),
    /// The camera has been closed.
    #[error("camera is closed")]
    Closed,
    /// The operation is not valid in the current state.
    #[error("cannot {operation} while {state}")]
    State {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the camera was in.
        state: State,
    },
    /// The value has a kind that cannot be interpreted for this field.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// The value has the right kind but an unusable magnitude.
    #[error("value out of range: {0}")]
    OutOfRange(String),
    /// The device does not accept the configured format/size/interval.
    #[error("configuration rejected: {0}")]
    Configuration(String),
    /// A query named something the device does not support.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CameraError {
    pub(crate) fn state(operation: &'static str, state: State) -> Self {
        Self::State { operation, state }
    }
}

/// Result type for camera operations.
pub type Result<T, E = CameraError> = core::result::Result<T, E>;
