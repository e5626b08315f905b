//! The camera facade: one owned handle over an open device.
//!
//! A `Camera` moves through `Idle` and `Streaming` while open and ends in
//! `Closed`. Format, size and frame rate are plain stored settings while
//! idle; they are checked against the device's capability set only when
//! streaming starts.
//!
//! A `Camera` can be moved to another thread but not shared between
//! threads; hand captured frames around instead.
//!
//! ```compile_fail
//! fn shared<T: Sync>() {}
//! shared::<v4l2_camera::Camera>();
//! ```

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use num_rational::Ratio;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::controls::{Control, ControlRegistry, ControlValue};
use crate::device::V4L2Device;
use crate::error::{CameraError, Result};
use crate::stream::StreamEngine;
use crate::traits::{
    CameraDevice, Format, FormatDescription, FourCC, Frame, FrameCapability, Interval,
};
use crate::value::Value;

/// Number of memory-mapped buffers allocated by `start`.
pub const BUFFER_COUNT: u32 = 3;

/// Format selected on open.
pub const DEFAULT_FORMAT: FourCC = FourCC::MJPG;
/// Width selected on open.
pub const DEFAULT_WIDTH: u32 = 640;
/// Height selected on open.
pub const DEFAULT_HEIGHT: u32 = 480;
/// Frame rate selected on open, in frames per second.
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Lifecycle state of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The device has been released.
    Closed,
    /// Open and configurable.
    Idle,
    /// Buffers allocated and frames being produced.
    Streaming,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Idle => "idle",
            Self::Streaming => "streaming",
        };
        f.write_str(name)
    }
}

/// Capture configuration applied at `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Pixel format.
    pub format: FourCC,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Frame interval in seconds per frame.
    pub interval: Interval,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            interval: Ratio::new(1, DEFAULT_FRAME_RATE),
        }
    }
}

fn initial_settings<D: CameraDevice>(device: &D) -> Settings {
    let defaults = Settings::default();
    if catalog::validate(device, &defaults).is_ok() {
        return defaults;
    }

    match (device.format(), device.frame_interval()) {
        (Ok(format), Ok(interval)) => {
            let current = Settings {
                format: format.fourcc,
                width: format.width,
                height: format.height,
                interval,
            };
            debug!(?current, "device does not offer the default settings, using its current ones");
            current
        }
        (Err(err), _) | (_, Err(err)) => {
            warn!(%err, "could not read the current format, keeping the defaults");
            defaults
        }
    }
}

/// An open camera.
pub struct Camera<D: CameraDevice = V4L2Device> {
    path: PathBuf,
    device: Option<D>,
    settings: Settings,
    engine: StreamEngine<D::Stream>,
    registry: ControlRegistry,
    _not_sync: PhantomData<Cell<()>>,
}

impl Camera<V4L2Device> {
    /// Open the V4L2 device node at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let device = V4L2Device::open(path)?;
        Self::from_device(path, device)
    }
}

impl<D: CameraDevice> Camera<D> {
    /// Wrap an already opened device.
    ///
    /// Settings start at MJPG 640x480, 30 fps when the device offers that.
    /// Otherwise they start from whatever the driver currently has selected.
    ///
    /// Fails with `Device` if the device cannot both capture and stream.
    pub fn from_device<P: AsRef<Path>>(path: P, device: D) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let caps = device.capabilities();
        if !(caps.can_capture && caps.can_stream) {
            return Err(CameraError::Device(format!(
                "{} is not a streaming video capture device",
                path.display()
            )));
        }

        info!(
            path = %path.display(),
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        Ok(Self {
            path,
            device: Some(device),
            settings: initial_settings(&device),
            engine: StreamEngine::default(),
            registry: ControlRegistry::new(),
            _not_sync: PhantomData,
        })
    }

    /// Device node this camera was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        if self.device.is_none() {
            State::Closed
        } else if self.engine.is_streaming() {
            State::Streaming
        } else {
            State::Idle
        }
    }

    fn device(&self) -> Result<&D> {
        self.device.as_ref().ok_or(CameraError::Closed)
    }

    fn require_idle(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            State::Closed => Err(CameraError::Closed),
            State::Idle => Ok(()),
            state @ State::Streaming => Err(CameraError::state(operation, state)),
        }
    }

    /// Card name reported by the driver.
    pub fn name(&self) -> Result<&str> {
        Ok(&self.device()?.capabilities().card)
    }

    /// Driver name.
    pub fn driver(&self) -> Result<&str> {
        Ok(&self.device()?.capabilities().driver)
    }

    /// Bus address of the device.
    pub fn bus(&self) -> Result<&str> {
        Ok(&self.device()?.capabilities().bus_info)
    }

    /// Pixel formats the device supports, in driver order.
    pub fn supported_formats(&self) -> Result<Vec<FormatDescription>> {
        catalog::supported_formats(self.device()?)
    }

    /// Frame sizes and intervals supported for `format`.
    ///
    /// `format` is a 4-character code or a symbolic name such as `MJPEG`.
    pub fn frame_capabilities<V: Into<Value>>(&self, format: V) -> Result<Vec<FrameCapability>> {
        let device = self.device()?;
        let fourcc = format.into().to_fourcc()?;
        catalog::frame_capabilities(device, fourcc)
    }

    /// Current capture settings.
    pub fn settings(&self) -> Result<&Settings> {
        self.device()?;
        Ok(&self.settings)
    }

    /// Selected pixel format.
    pub fn format(&self) -> Result<FourCC> {
        Ok(self.settings()?.format)
    }

    /// Select the pixel format. Only text or symbols are accepted.
    pub fn set_format<V: Into<Value>>(&mut self, value: V) -> Result<()> {
        self.require_idle("set format")?;
        let fourcc = value.into().to_fourcc()?;
        debug!(%fourcc, "format selected");
        self.settings.format = fourcc;
        Ok(())
    }

    /// Selected image width.
    pub fn image_width(&self) -> Result<u32> {
        Ok(self.settings()?.width)
    }

    /// Set the image width from any real, non-negative number.
    pub fn set_image_width<V: Into<Value>>(&mut self, value: V) -> Result<()> {
        self.require_idle("set image width")?;
        self.settings.width = value.into().to_dimension()?;
        Ok(())
    }

    /// Selected image height.
    pub fn image_height(&self) -> Result<u32> {
        Ok(self.settings()?.height)
    }

    /// Set the image height from any real, non-negative number.
    pub fn set_image_height<V: Into<Value>>(&mut self, value: V) -> Result<()> {
        self.require_idle("set image height")?;
        self.settings.height = value.into().to_dimension()?;
        Ok(())
    }

    /// Selected frame interval, in seconds per frame.
    ///
    /// Note the units: this reads back the interval, not the rate passed to
    /// [`set_framerate`](Self::set_framerate). After `set_framerate(10)`
    /// this returns `1/10`.
    pub fn framerate(&self) -> Result<Interval> {
        Ok(self.settings()?.interval)
    }

    /// Set the frame rate in frames per second.
    ///
    /// The reciprocal is stored as the frame interval.
    pub fn set_framerate<V: Into<Value>>(&mut self, value: V) -> Result<()> {
        self.require_idle("set framerate")?;
        let rate = value.into().to_rate()?;
        self.settings.interval = rate.recip();
        Ok(())
    }

    /// Controls the device exposes, in driver order.
    pub fn controls(&mut self) -> Result<&[Control]> {
        let device = self.device.as_ref().ok_or(CameraError::Closed)?;
        self.registry.controls(device)
    }

    /// Read a control.
    pub fn get_control(&mut self, id: u32) -> Result<ControlValue> {
        let device = self.device.as_ref().ok_or(CameraError::Closed)?;
        self.registry.get(device, id)
    }

    /// Write a control. Integers and booleans are accepted.
    pub fn set_control<V: Into<Value>>(&mut self, id: u32, value: V) -> Result<()> {
        let device = self.device.as_mut().ok_or(CameraError::Closed)?;
        self.registry.set(device, id, &value.into())
    }

    /// Apply the settings, allocate buffers and begin streaming.
    pub fn start(&mut self) -> Result<()> {
        self.require_idle("start")?;
        if self.engine.is_faulted() {
            return Err(CameraError::Device(
                "device reported a fault; reopen it before streaming".to_owned(),
            ));
        }

        let device = self.device.as_mut().ok_or(CameraError::Closed)?;
        let settings = &self.settings;
        catalog::validate(device, settings)?;

        let requested = Format::new(settings.width, settings.height, settings.format);
        let actual = device.set_format(&requested).map_err(|err| {
            CameraError::Configuration(format!(
                "driver rejected {} {}x{}: {err}",
                requested.fourcc, requested.width, requested.height
            ))
        })?;
        if actual != requested {
            return Err(CameraError::Configuration(format!(
                "driver substituted {} {}x{} for {} {}x{}",
                actual.fourcc,
                actual.width,
                actual.height,
                requested.fourcc,
                requested.width,
                requested.height
            )));
        }

        let interval = device
            .set_frame_interval(settings.interval)
            .map_err(|err| {
                CameraError::Configuration(format!(
                    "driver rejected frame interval {}: {err}",
                    settings.interval
                ))
            })?;
        if interval != settings.interval {
            warn!(
                requested = %settings.interval,
                actual = %interval,
                "driver adjusted frame interval"
            );
        }

        let stream = device.create_stream(BUFFER_COUNT)?;
        self.engine.begin(stream, BUFFER_COUNT);

        info!(
            format = %self.settings.format,
            width = self.settings.width,
            height = self.settings.height,
            interval = %self.settings.interval,
            "capture started"
        );
        Ok(())
    }

    /// Start streaming and return a guard that stops it when dropped.
    pub fn streaming(&mut self) -> Result<StreamGuard<'_, D>> {
        self.start()?;
        Ok(StreamGuard {
            camera: self,
            armed: true,
        })
    }

    /// Start streaming, run `f`, then stop on every exit path.
    ///
    /// The stream is stopped even if `f` fails or panics. An error from `f`
    /// takes precedence over an error from stopping.
    pub fn start_with<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let mut guard = self.streaming()?;
        let result = f(&mut *guard);
        let stopped = guard.finish();
        let value = result?;
        stopped?;
        Ok(value)
    }

    /// Halt streaming and release the buffer pool.
    pub fn stop(&mut self) -> Result<()> {
        match self.state() {
            State::Closed => Err(CameraError::Closed),
            state @ State::Idle => Err(CameraError::state("stop", state)),
            State::Streaming => {
                self.engine.end();
                info!("capture stopped");
                Ok(())
            }
        }
    }

    /// Block until the next frame arrives and return it.
    pub fn capture(&mut self) -> Result<Frame> {
        match self.state() {
            State::Closed => Err(CameraError::Closed),
            state @ State::Idle => Err(CameraError::state("capture", state)),
            State::Streaming => self.engine.capture(),
        }
    }

    /// Whether the camera is streaming.
    pub fn is_ready(&self) -> bool {
        self.state() == State::Streaming
    }

    /// Whether the driver reports the device as in use.
    pub fn is_busy(&self) -> Result<bool> {
        let device = self.device()?;
        let format = Format::new(self.settings.width, self.settings.height, self.settings.format);
        device.is_busy(&format)
    }

    /// Whether a capture failure has faulted the device.
    pub fn is_error(&self) -> Result<bool> {
        self.device()?;
        Ok(self.engine.is_faulted())
    }

    /// Release the device. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.device.is_none() {
            return;
        }

        self.engine.end();
        self.device = None;
        info!(path = %self.path.display(), "closed camera");
    }
}

impl<D: CameraDevice> Drop for Camera<D> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Streaming scope returned by [`Camera::streaming`].
///
/// Dereferences to the camera. Stops streaming when dropped unless the
/// stream was already stopped.
pub struct StreamGuard<'a, D: CameraDevice> {
    camera: &'a mut Camera<D>,
    armed: bool,
}

impl<D: CameraDevice> StreamGuard<'_, D> {
    /// Stop streaming now, reporting any error.
    pub fn finish(mut self) -> Result<()> {
        self.armed = false;
        if self.camera.is_ready() {
            self.camera.stop()
        } else {
            Ok(())
        }
    }
}

impl<D: CameraDevice> Deref for StreamGuard<'_, D> {
    type Target = Camera<D>;

    fn deref(&self) -> &Self::Target {
        self.camera
    }
}

impl<D: CameraDevice> DerefMut for StreamGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.camera
    }
}

impl<D: CameraDevice> Drop for StreamGuard<'_, D> {
    fn drop(&mut self) {
        if self.armed && self.camera.is_ready() {
            if let Err(err) = self.camera.stop() {
                warn!(%err, "failed to stop stream");
            }
        }
    }
}
