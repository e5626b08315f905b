//! V4L2 device implementation using the v4l crate.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use num_rational::Ratio;
use tracing::{debug, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::control::{self, MenuItem};
use v4l::frameinterval::FrameIntervalEnum;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as V4lCaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, Fraction};

use crate::error::{CameraError, Result};
use crate::traits::{
    CameraDevice, CaptureStream, ControlDescriptor, ControlKind, DeviceCapabilities, Format,
    FormatDescription, FourCC, Frame, FrameInterval, FrameMetadata, FrameSize, Interval,
};

/// V4L2 device implementation wrapping the v4l crate.
pub struct V4L2Device {
    device: Device,
    capabilities: DeviceCapabilities,
}

impl V4L2Device {
    /// Open the device node at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::with_path(path)
            .map_err(|err| CameraError::Device(format!("{}: {err}", path.display())))?;
        Self::from_device(device)
    }

    /// Open a V4L2 device by index (e.g., 0 for /dev/video0).
    pub fn open_index(index: u32) -> Result<Self> {
        let device = Device::new(index as usize)
            .map_err(|err| CameraError::Device(format!("/dev/video{index}: {err}")))?;
        Self::from_device(device)
    }

    fn from_device(device: Device) -> Result<Self> {
        let caps = device
            .query_caps()
            .map_err(|err| CameraError::Device(format!("capability query failed: {err}")))?;

        let capabilities = DeviceCapabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps.capabilities.contains(Flags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(Flags::STREAMING),
        };

        Ok(Self {
            device,
            capabilities,
        })
    }
}

/// Enumeration ioctls fail with `EINVAL` when there is nothing to list.
fn empty_on_invalid<T>(result: io::Result<Vec<T>>) -> Result<Vec<T>> {
    match result {
        Ok(items) => Ok(items),
        Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

fn interval(fraction: &Fraction) -> Option<Interval> {
    (fraction.numerator > 0 && fraction.denominator > 0)
        .then(|| Ratio::new(fraction.numerator, fraction.denominator))
}

/// Step of an interval range. Continuous ranges come back from `v4l` as
/// stepwise ones with a unit step that spans the whole range; those get a
/// zero step.
fn interval_step(min: Interval, max: Interval, fraction: &Fraction) -> Interval {
    if fraction.denominator == 0 {
        return Ratio::from_integer(0);
    }
    let step = Ratio::new(fraction.numerator, fraction.denominator);
    if max <= min || step > max - min {
        Ratio::from_integer(0)
    } else {
        step
    }
}

fn control_kind(typ: control::Type) -> ControlKind {
    match typ {
        control::Type::Integer | control::Type::Integer64 => ControlKind::Integer,
        control::Type::Boolean => ControlKind::Boolean,
        control::Type::Menu => ControlKind::Menu,
        control::Type::IntegerMenu => ControlKind::IntegerMenu,
        other => ControlKind::Other(format!("{other:?}")),
    }
}

impl CameraDevice for V4L2Device {
    type Stream = V4L2Stream;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn enum_formats(&self) -> Result<Vec<FormatDescription>> {
        let formats = empty_on_invalid(Capture::enum_formats(&self.device))?;
        Ok(formats
            .into_iter()
            .map(|desc| FormatDescription {
                fourcc: desc.fourcc.into(),
                description: desc.description,
            })
            .collect())
    }

    fn enum_framesizes(&self, fourcc: FourCC) -> Result<Vec<FrameSize>> {
        let sizes = empty_on_invalid(Capture::enum_framesizes(&self.device, fourcc.into()))?;
        Ok(sizes
            .into_iter()
            .map(|size| match size.size {
                FrameSizeEnum::Discrete(d) => FrameSize::Discrete {
                    width: d.width,
                    height: d.height,
                },
                FrameSizeEnum::Stepwise(s) => FrameSize::Stepwise {
                    min_width: s.min_width,
                    max_width: s.max_width,
                    step_width: s.step_width,
                    min_height: s.min_height,
                    max_height: s.max_height,
                    step_height: s.step_height,
                },
            })
            .collect())
    }

    fn enum_frameintervals(
        &self,
        fourcc: FourCC,
        width: u32,
        height: u32,
    ) -> Result<Vec<FrameInterval>> {
        let intervals = empty_on_invalid(Capture::enum_frameintervals(
            &self.device,
            fourcc.into(),
            width,
            height,
        ))?;

        let mut result = Vec::with_capacity(intervals.len());
        for entry in intervals {
            match entry.interval {
                FrameIntervalEnum::Discrete(fraction) => match interval(&fraction) {
                    Some(value) => result.push(FrameInterval::Discrete(value)),
                    None => debug!(?fraction, "dropping degenerate frame interval"),
                },
                FrameIntervalEnum::Stepwise(range) => {
                    if let (Some(min), Some(max)) = (interval(&range.min), interval(&range.max)) {
                        result.push(FrameInterval::Stepwise {
                            min,
                            max,
                            step: interval_step(min, max, &range.step),
                        });
                    } else {
                        debug!(
                            min = ?range.min,
                            max = ?range.max,
                            "dropping degenerate interval range"
                        );
                    }
                }
            }
        }
        Ok(result)
    }

    fn query_controls(&self) -> Result<Vec<ControlDescriptor>> {
        let controls = empty_on_invalid(self.device.query_controls())?;
        Ok(controls
            .into_iter()
            .map(|desc| ControlDescriptor {
                id: desc.id,
                kind: control_kind(desc.typ),
                name: desc.name,
                minimum: desc.minimum,
                maximum: desc.maximum,
                step: desc.step,
                default: desc.default,
                items: desc
                    .items
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(index, item)| {
                        let name = match item {
                            MenuItem::Name(name) => name,
                            MenuItem::Value(value) => value.to_string(),
                        };
                        (index, name)
                    })
                    .collect(),
            })
            .collect())
    }

    fn control(&self, id: u32) -> Result<i64> {
        let ctrl = self.device.control(id)?;
        match ctrl.value {
            control::Value::Integer(value) => Ok(value),
            control::Value::Boolean(value) => Ok(i64::from(value)),
            _ => Err(CameraError::Device(format!(
                "control {id:#x} does not hold a scalar value"
            ))),
        }
    }

    fn set_control(&mut self, id: u32, value: i64) -> Result<()> {
        self.device.set_control(control::Control {
            id,
            value: control::Value::Integer(value),
        })?;
        Ok(())
    }

    fn format(&self) -> Result<Format> {
        let fmt = Capture::format(&self.device)?;
        Ok(Format::new(fmt.width, fmt.height, FourCC::from(fmt.fourcc)))
    }

    fn frame_interval(&self) -> Result<Interval> {
        let params = Capture::params(&self.device)?;
        interval(&params.interval)
            .ok_or_else(|| CameraError::Device("driver reported no frame interval".to_owned()))
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        let mut fmt = Capture::format(&self.device)?;

        fmt.width = format.width;
        fmt.height = format.height;
        fmt.fourcc = format.fourcc.into();

        let fmt = Capture::set_format(&self.device, &fmt)?;

        Ok(Format::new(fmt.width, fmt.height, FourCC::from(fmt.fourcc)))
    }

    fn set_frame_interval(&mut self, requested: Interval) -> Result<Interval> {
        let params = Parameters::new(Fraction::new(*requested.numer(), *requested.denom()));
        let params = Capture::set_params(&self.device, &params)?;
        Ok(interval(&params.interval).unwrap_or(requested))
    }

    fn is_busy(&self, format: &Format) -> Result<bool> {
        let fmt = v4l::Format::new(format.width, format.height, format.fourcc.into());
        match Capture::set_format(&self.device, &fmt) {
            Ok(_) => Ok(false),
            Err(err) if err.kind() == io::ErrorKind::ResourceBusy => Ok(true),
            Err(err) => Err(err.into()),
        }
    }

    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream> {
        let stream: Stream<'static> =
            Stream::with_buffers(&self.device, Type::VideoCapture, buffer_count)
                .map_err(|err| CameraError::Device(format!("buffer allocation failed: {err}")))?;

        Ok(V4L2Stream { stream })
    }
}

/// V4L2 capture stream wrapping mmap-based streaming.
///
/// The driver starts streaming on the first dequeue and stops when the
/// stream is dropped, which also unmaps the buffers.
pub struct V4L2Stream {
    stream: Stream<'static>,
}

impl CaptureStream for V4L2Stream {
    fn next_frame(&mut self) -> Result<Frame> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|err| CameraError::Device(format!("dequeue failed: {err}")))?;

        let used = (meta.bytesused as usize).min(buf.len());
        let data = buf.get(..used).unwrap_or(buf).to_vec();

        // V4L2 timestamps are non-negative in practice
        #[allow(clippy::cast_sign_loss)]
        let secs = meta.timestamp.sec.max(0) as u64;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let nanos = (meta.timestamp.usec.max(0) as u32).saturating_mul(1000);

        Ok(Frame {
            data,
            metadata: FrameMetadata {
                sequence: meta.sequence,
                timestamp: Duration::new(secs, nanos),
                bytes_used: meta.bytesused,
                buffer: 0,
            },
        })
    }
}

/// A video device node found on the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNode {
    /// Node index, as in `/dev/video<index>`.
    pub index: usize,
    /// Path to the device node.
    pub path: PathBuf,
    /// Name reported through sysfs, if any.
    pub name: Option<String>,
}

/// List the video device nodes present on the system, sorted by index.
#[must_use]
pub fn enumerate() -> Vec<DeviceNode> {
    let mut nodes: Vec<DeviceNode> = v4l::context::enum_devices()
        .into_iter()
        .map(|node| DeviceNode {
            index: node.index(),
            path: node.path().to_path_buf(),
            name: node.name(),
        })
        .collect();
    nodes.sort_by_key(|node| node.index);

    if nodes.is_empty() {
        warn!("no video device nodes found");
    }
    nodes
}
