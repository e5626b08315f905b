//! Core traits and types for V4L2 camera abstraction.

use std::fmt;
use std::time::Duration;

use num_rational::Ratio;

use crate::error::Result;

/// Exact frame interval in seconds per frame.
pub type Interval = Ratio<u32>;

/// Pixel format representation (e.g., YUYV, MJPG, RGB3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// MJPEG pixel format (Motion JPEG).
    pub const MJPG: Self = Self::new(b"MJPG");
    /// RGB3 pixel format (24-bit RGB).
    pub const RGB3: Self = Self::new(b"RGB3");
    /// NV12 pixel format (4:2:0 semi-planar).
    pub const NV12: Self = Self::new(b"NV12");
    /// NV21 pixel format (4:2:0 semi-planar, swapped chroma).
    pub const NV21: Self = Self::new(b"NV21");
    /// NV16 pixel format (4:2:2 semi-planar).
    pub const NV16: Self = Self::new(b"NV16");
    /// YU12 pixel format (4:2:0 planar, a.k.a. YUV420).
    pub const YU12: Self = Self::new(b"YU12");
    /// YV12 pixel format (4:2:0 planar, a.k.a. YVU420).
    pub const YV12: Self = Self::new(b"YV12");
    /// RGBP pixel format (RGB565).
    pub const RGBP: Self = Self::new(b"RGBP");
    /// H.264 elementary stream.
    pub const H264: Self = Self::new(b"H264");

    /// Flag bit of the last byte marking the big-endian variant of a format.
    const BIG_ENDIAN: u8 = 0x80;

    /// Resolve a format name.
    ///
    /// Accepts the symbolic aliases (`MJPEG`, `YUV422`, `YUV420`, `YVU420`,
    /// `RGB565`), any exactly-4-byte code, and a 4-byte code with a `-BE`
    /// suffix for big-endian variants.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let alias = match name {
            "YUV422" => Some(Self::YUYV),
            "YUV420" => Some(Self::YU12),
            "YVU420" => Some(Self::YV12),
            "RGB565" => Some(Self::RGBP),
            "MJPEG" => Some(Self::MJPG),
            _ => None,
        };
        if alias.is_some() {
            return alias;
        }

        if let Some(base) = name.strip_suffix("-BE") {
            let [a, b, c, d] = <[u8; 4]>::try_from(base.as_bytes()).ok()?;
            return (d & Self::BIG_ENDIAN == 0).then_some(Self([a, b, c, d | Self::BIG_ENDIAN]));
        }

        <[u8; 4]>::try_from(name.as_bytes()).ok().map(Self)
    }

    /// Whether the big-endian flag is set.
    #[must_use]
    pub const fn is_big_endian(self) -> bool {
        let [_, _, _, last] = self.0;
        last & Self::BIG_ENDIAN != 0
    }

    /// The code as text: four characters, plus `-BE` for big-endian variants.
    #[must_use]
    pub fn to_code(self) -> String {
        let [a, b, c, d] = self.0;
        let mut code: String = [a, b, c, d & !Self::BIG_ENDIAN]
            .into_iter()
            .map(char::from)
            .collect();
        if self.is_big_endian() {
            code.push_str("-BE");
        }
        code
    }

    /// Whether payloads in this format have a variable, content-dependent length.
    #[must_use]
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::MJPG | Self::H264)
    }

    /// Nominal image size in bytes for the given dimensions.
    ///
    /// For compressed formats this is the upper bound the capture buffer is
    /// sized for, not the length of any particular frame. Returns `None` for
    /// formats without a known layout.
    #[must_use]
    pub fn image_size(self, width: u32, height: u32) -> Option<usize> {
        let pixels = (width as usize).checked_mul(height as usize)?;

        match self {
            Self::NV12 | Self::NV21 | Self::YU12 | Self::YV12 => {
                pixels.checked_mul(3).map(|n| n / 2)
            }
            Self::YUYV | Self::NV16 | Self::RGBP => pixels.checked_mul(2),
            Self::RGB3 | Self::H264 => pixels.checked_mul(3),
            Self::MJPG => Some(pixels),
            _ => None,
        }
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_code())
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Video format specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
}

impl Format {
    /// Create a new format specification.
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        Self {
            width,
            height,
            fourcc,
        }
    }
}

/// Device identity and capability flags.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming.
    pub can_stream: bool,
}

/// A pixel format reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescription {
    /// Pixel format code.
    pub fourcc: FourCC,
    /// Human-readable description from the driver.
    pub description: String,
}

impl FormatDescription {
    /// The format code as text, as accepted by the format setter.
    #[must_use]
    pub fn fcc(&self) -> String {
        self.fourcc.to_code()
    }
}

/// A supported frame size together with its supported frame intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCapability {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Supported intervals, seconds per frame, in driver order.
    pub intervals: Vec<Interval>,
}

impl FrameCapability {
    /// Supported rates in frames per second (reciprocals of `intervals`).
    ///
    /// These are the values the `framerate` setter expects.
    #[must_use]
    pub fn rates(&self) -> Vec<Ratio<u32>> {
        self.intervals.iter().map(Ratio::recip).collect()
    }
}

/// Raw frame size record as enumerated by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSize {
    /// A single supported size.
    Discrete {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// A range of sizes.
    Stepwise {
        /// Minimum width.
        min_width: u32,
        /// Maximum width.
        max_width: u32,
        /// Width increment.
        step_width: u32,
        /// Minimum height.
        min_height: u32,
        /// Maximum height.
        max_height: u32,
        /// Height increment.
        step_height: u32,
    },
}

impl FrameSize {
    /// Whether the driver accepts `width` x `height` under this record.
    #[must_use]
    pub fn contains(&self, width: u32, height: u32) -> bool {
        match *self {
            Self::Discrete {
                width: w,
                height: h,
            } => (w, h) == (width, height),
            Self::Stepwise {
                min_width,
                max_width,
                step_width,
                min_height,
                max_height,
                step_height,
            } => {
                on_grid(width, min_width, max_width, step_width)
                    && on_grid(height, min_height, max_height, step_height)
            }
        }
    }
}

fn on_grid(value: u32, min: u32, max: u32, step: u32) -> bool {
    (min..=max).contains(&value) && (step <= 1 || (value - min) % step == 0)
}

/// Raw frame interval record as enumerated by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameInterval {
    /// A single supported interval.
    Discrete(Interval),
    /// A range of intervals; a zero step means any value in the range.
    Stepwise {
        /// Shortest interval.
        min: Interval,
        /// Longest interval.
        max: Interval,
        /// Increment.
        step: Interval,
    },
}

impl FrameInterval {
    /// Whether the driver accepts `interval` under this record.
    #[must_use]
    pub fn contains(&self, interval: Interval) -> bool {
        match *self {
            Self::Discrete(value) => value == interval,
            Self::Stepwise { min, max, step } => {
                if interval < min || interval > max {
                    return false;
                }
                if *step.numer() == 0 {
                    return true;
                }
                let widen = |r: Interval| Ratio::new(u64::from(*r.numer()), u64::from(*r.denom()));
                ((widen(interval) - widen(min)) / widen(step)).is_integer()
            }
        }
    }
}

/// Kind of a driver control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    /// Signed integer range.
    Integer,
    /// On/off switch.
    Boolean,
    /// Menu with named entries.
    Menu,
    /// Menu whose entries are integer values.
    IntegerMenu,
    /// Any other control type, named for diagnostics.
    Other(String),
}

/// Raw control record as enumerated by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlDescriptor {
    /// Control id.
    pub id: u32,
    /// Control kind.
    pub kind: ControlKind,
    /// Control name.
    pub name: String,
    /// Minimum value.
    pub minimum: i64,
    /// Maximum value.
    pub maximum: i64,
    /// Step size.
    pub step: u64,
    /// Default value.
    pub default: i64,
    /// Menu entries as `(index, label)` for menu controls.
    pub items: Vec<(u32, String)>,
}

/// Metadata for a captured frame.
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Frame sequence number.
    pub sequence: u32,
    /// Capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
    /// Slot of the buffer pool the frame was read from.
    ///
    /// This is the stream engine's own accounting of which pooled buffer
    /// was handed out, not an index reported by the driver.
    pub buffer: usize,
}

/// A captured video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw frame data.
    pub data: Vec<u8>,
    /// Frame metadata.
    pub metadata: FrameMetadata,
}

/// Abstraction over camera device operations.
pub trait CameraDevice {
    /// The stream type returned by `create_stream`.
    type Stream: CaptureStream;

    /// Get device capabilities.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Enumerate pixel formats in driver order.
    fn enum_formats(&self) -> Result<Vec<FormatDescription>>;

    /// Enumerate frame sizes for a pixel format in driver order.
    fn enum_framesizes(&self, fourcc: FourCC) -> Result<Vec<FrameSize>>;

    /// Enumerate frame intervals for a pixel format and size in driver order.
    fn enum_frameintervals(&self, fourcc: FourCC, width: u32, height: u32)
        -> Result<Vec<FrameInterval>>;

    /// Enumerate controls in driver order.
    fn query_controls(&self) -> Result<Vec<ControlDescriptor>>;

    /// Read the current value of a control.
    fn control(&self, id: u32) -> Result<i64>;

    /// Write a control value.
    fn set_control(&mut self, id: u32, value: i64) -> Result<()>;

    /// Read the format the driver currently has selected.
    fn format(&self) -> Result<Format>;

    /// Read the frame interval the driver currently has selected.
    fn frame_interval(&self) -> Result<Interval>;

    /// Set capture format. Returns the actual format set by the driver.
    fn set_format(&mut self, format: &Format) -> Result<Format>;

    /// Set the frame interval. Returns the interval the driver settled on.
    fn set_frame_interval(&mut self, interval: Interval) -> Result<Interval>;

    /// Whether the driver refuses reconfiguration because it is in use.
    fn is_busy(&self, format: &Format) -> Result<bool>;

    /// Allocate a capture stream with the specified number of buffers.
    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream>;
}

/// Abstraction over capture stream operations.
pub trait CaptureStream {
    /// Block until the next filled buffer is available and copy it out.
    fn next_frame(&mut self) -> Result<Frame>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_names() {
        assert_eq!(FourCC::from_name("MJPEG"), Some(FourCC::MJPG));
        assert_eq!(FourCC::from_name("YUV420"), Some(FourCC::YU12));
        assert_eq!(FourCC::from_name("GREY"), Some(FourCC::new(b"GREY")));
        assert_eq!(FourCC::from_name("TOOLONG"), None);
        assert_eq!(FourCC::YUYV.to_code(), "YUYV");
    }

    #[test]
    fn test_fourcc_big_endian_code() {
        let argb555x = FourCC([b'A', b'R', b'1', b'5' | 0x80]);
        assert!(argb555x.is_big_endian());
        assert!(!FourCC::YUYV.is_big_endian());

        let code = argb555x.to_code();
        assert_eq!(code, "AR15-BE");
        assert!(code.is_ascii());
        assert_eq!(FourCC::from_name(&code), Some(argb555x));
        assert_eq!(FourCC::from_name("AR15"), Some(FourCC::new(b"AR15")));
    }

    #[test]
    fn test_stepwise_size_contains() {
        let size = FrameSize::Stepwise {
            min_width: 160,
            max_width: 1280,
            step_width: 16,
            min_height: 90,
            max_height: 720,
            step_height: 2,
        };
        assert!(size.contains(800, 600));
        assert!(size.contains(1280, 720));
        assert!(size.contains(160, 90));
        assert!(!size.contains(1296, 720));
        assert!(!size.contains(801, 600));
        assert!(!size.contains(800, 601));

        let discrete = FrameSize::Discrete {
            width: 640,
            height: 480,
        };
        assert!(discrete.contains(640, 480));
        assert!(!discrete.contains(640, 360));
    }

    #[test]
    fn test_interval_range_contains() {
        let continuous = FrameInterval::Stepwise {
            min: Ratio::new(1, 60),
            max: Ratio::new(1, 5),
            step: Ratio::from_integer(0),
        };
        assert!(continuous.contains(Ratio::new(1, 15)));
        assert!(continuous.contains(Ratio::new(1, 60)));
        assert!(!continuous.contains(Ratio::new(1, 120)));
        assert!(!continuous.contains(Ratio::new(1, 2)));

        let stepwise = FrameInterval::Stepwise {
            min: Ratio::new(1, 30),
            max: Ratio::new(1, 10),
            step: Ratio::new(1, 30),
        };
        assert!(stepwise.contains(Ratio::new(1, 15)));
        assert!(!stepwise.contains(Ratio::new(1, 20)));
    }
}
