//! Mock device implementation for testing without hardware.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use num_rational::Ratio;

use crate::error::{CameraError, Result};
use crate::traits::{
    CameraDevice, CaptureStream, ControlDescriptor, ControlKind, DeviceCapabilities, Format,
    FormatDescription, FourCC, Frame, FrameInterval, FrameMetadata, FrameSize, Interval,
};

/// Brightness control id (`V4L2_CID_BRIGHTNESS`).
pub const BRIGHTNESS: u32 = 0x0098_0900;
/// Automatic white balance control id (`V4L2_CID_AUTO_WHITE_BALANCE`).
pub const WHITE_BALANCE_AUTO: u32 = 0x0098_090c;
/// Power line frequency control id (`V4L2_CID_POWER_LINE_FREQUENCY`).
pub const POWER_LINE_FREQUENCY: u32 = 0x0098_0918;
/// A button control, which the registry does not surface.
pub const RESET: u32 = 0x0098_0920;

/// Mock device for testing without hardware.
pub struct MockDevice {
    capabilities: DeviceCapabilities,
    formats: Vec<FormatDescription>,
    sizes: HashMap<FourCC, Vec<FrameSize>>,
    intervals: Vec<FrameInterval>,
    controls: Vec<ControlDescriptor>,
    values: HashMap<u32, i64>,
    format: Format,
    interval: Interval,
    pattern: TestPattern,
    fail_after: Option<u32>,
    streaming: Arc<AtomicBool>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a new mock device with default settings.
    #[must_use]
    pub fn new() -> Self {
        let discrete = vec![
            FrameSize::Discrete {
                width: 640,
                height: 480,
            },
            FrameSize::Discrete {
                width: 320,
                height: 240,
            },
        ];

        let controls = vec![
            ControlDescriptor {
                id: BRIGHTNESS,
                kind: ControlKind::Integer,
                name: "Brightness".to_owned(),
                minimum: 0,
                maximum: 255,
                step: 1,
                default: 128,
                items: Vec::new(),
            },
            ControlDescriptor {
                id: WHITE_BALANCE_AUTO,
                kind: ControlKind::Boolean,
                name: "White Balance, Automatic".to_owned(),
                minimum: 0,
                maximum: 1,
                step: 1,
                default: 1,
                items: Vec::new(),
            },
            ControlDescriptor {
                id: POWER_LINE_FREQUENCY,
                kind: ControlKind::Menu,
                name: "Power Line Frequency".to_owned(),
                minimum: 0,
                maximum: 2,
                step: 1,
                default: 1,
                items: vec![
                    (0, "Disabled".to_owned()),
                    (1, "50 Hz".to_owned()),
                    (2, "60 Hz".to_owned()),
                ],
            },
            ControlDescriptor {
                id: RESET,
                kind: ControlKind::Other("Button".to_owned()),
                name: "Reset".to_owned(),
                minimum: 0,
                maximum: 0,
                step: 0,
                default: 0,
                items: Vec::new(),
            },
        ];
        let values = controls.iter().map(|ctrl| (ctrl.id, ctrl.default)).collect();

        Self {
            capabilities: DeviceCapabilities {
                driver: "mock".to_owned(),
                card: "Mock Camera".to_owned(),
                bus_info: "mock:0".to_owned(),
                can_capture: true,
                can_stream: true,
            },
            formats: vec![
                FormatDescription {
                    fourcc: FourCC::YUYV,
                    description: "YUYV 4:2:2".to_owned(),
                },
                FormatDescription {
                    fourcc: FourCC::MJPG,
                    description: "Motion-JPEG".to_owned(),
                },
            ],
            sizes: HashMap::from([(FourCC::YUYV, discrete.clone()), (FourCC::MJPG, discrete)]),
            intervals: vec![
                FrameInterval::Discrete(Ratio::new(1, 30)),
                FrameInterval::Discrete(Ratio::new(1, 15)),
            ],
            controls,
            values,
            format: Format::new(640, 480, FourCC::YUYV),
            interval: Ratio::new(1, 30),
            pattern: TestPattern::ColorBars,
            fail_after: None,
            streaming: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Report a size range instead of discrete sizes for `fourcc`.
    #[must_use]
    pub fn with_stepwise_sizes(mut self, fourcc: FourCC) -> Self {
        self.sizes.insert(
            fourcc,
            vec![FrameSize::Stepwise {
                min_width: 160,
                max_width: 1280,
                step_width: 16,
                min_height: 90,
                max_height: 720,
                step_height: 2,
            }],
        );
        self
    }

    /// Report an interval range instead of discrete intervals. A zero
    /// `step` describes a continuous range.
    #[must_use]
    pub fn with_interval_range(mut self, min: Interval, max: Interval, step: Interval) -> Self {
        self.intervals = vec![FrameInterval::Stepwise { min, max, step }];
        self
    }

    /// Keep only the listed pixel formats.
    #[must_use]
    pub fn with_formats(mut self, fourccs: &[FourCC]) -> Self {
        self.formats.retain(|desc| fourccs.contains(&desc.fourcc));
        self.sizes.retain(|fourcc, _| fourccs.contains(fourcc));
        self
    }

    /// Set the capabilities for this mock device.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the test pattern for frame generation.
    #[must_use]
    pub const fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Make streams fail after delivering `frames` frames.
    #[must_use]
    pub const fn with_failure_after(mut self, frames: u32) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Format last accepted by the driver.
    #[must_use]
    pub const fn current_format(&self) -> &Format {
        &self.format
    }

    /// Interval last accepted by the driver.
    #[must_use]
    pub const fn current_interval(&self) -> Interval {
        self.interval
    }
}

impl CameraDevice for MockDevice {
    type Stream = MockStream;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn enum_formats(&self) -> Result<Vec<FormatDescription>> {
        Ok(self.formats.clone())
    }

    fn enum_framesizes(&self, fourcc: FourCC) -> Result<Vec<FrameSize>> {
        Ok(self.sizes.get(&fourcc).cloned().unwrap_or_default())
    }

    fn enum_frameintervals(
        &self,
        fourcc: FourCC,
        _width: u32,
        _height: u32,
    ) -> Result<Vec<FrameInterval>> {
        if !self.sizes.contains_key(&fourcc) {
            return Ok(Vec::new());
        }
        Ok(self.intervals.clone())
    }

    fn query_controls(&self) -> Result<Vec<ControlDescriptor>> {
        Ok(self.controls.clone())
    }

    fn control(&self, id: u32) -> Result<i64> {
        self.values
            .get(&id)
            .copied()
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput).into())
    }

    fn set_control(&mut self, id: u32, value: i64) -> Result<()> {
        match self.values.get_mut(&id) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(io::Error::from(io::ErrorKind::InvalidInput).into()),
        }
    }

    fn format(&self) -> Result<Format> {
        Ok(self.format.clone())
    }

    fn frame_interval(&self) -> Result<Interval> {
        Ok(self.interval)
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        if self.streaming.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::ResourceBusy).into());
        }
        self.format = format.clone();
        Ok(self.format.clone())
    }

    fn set_frame_interval(&mut self, interval: Interval) -> Result<Interval> {
        self.interval = interval;
        Ok(self.interval)
    }

    fn is_busy(&self, _format: &Format) -> Result<bool> {
        Ok(self.streaming.load(Ordering::SeqCst))
    }

    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream> {
        if self.streaming.swap(true, Ordering::SeqCst) {
            return Err(CameraError::Device("stream already allocated".to_owned()));
        }

        Ok(MockStream {
            format: self.format.clone(),
            interval: self.interval,
            pattern: self.pattern,
            buffers: vec![Vec::new(); buffer_count as usize],
            next_buffer: 0,
            sequence: 0,
            fail_after: self.fail_after,
            streaming: Arc::clone(&self.streaming),
        })
    }
}

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Solid color with specified Y, U, V values.
    Solid(u8, u8, u8),
}

/// Mock capture stream for testing.
pub struct MockStream {
    format: Format,
    interval: Interval,
    pattern: TestPattern,
    buffers: Vec<Vec<u8>>,
    next_buffer: usize,
    sequence: u32,
    fail_after: Option<u32>,
    streaming: Arc<AtomicBool>,
}

impl CaptureStream for MockStream {
    fn next_frame(&mut self) -> Result<Frame> {
        if self.fail_after.is_some_and(|limit| self.sequence >= limit) {
            return Err(CameraError::Device("mock device fault".to_owned()));
        }

        let slot = self.next_buffer;
        let seq = self.sequence;
        let data = generate_test_frame(&self.format, self.pattern, seq);

        let Some(buffer) = self.buffers.get_mut(slot) else {
            return Err(CameraError::Device("mock stream has no buffers".to_owned()));
        };
        buffer.clone_from(&data);

        self.next_buffer = (slot + 1) % self.buffers.len();
        self.sequence += 1;

        let period = Duration::from_secs(u64::from(*self.interval.numer()))
            / (*self.interval.denom()).max(1);
        #[allow(clippy::cast_possible_truncation)]
        let bytes_used = data.len() as u32;

        Ok(Frame {
            data,
            metadata: FrameMetadata {
                sequence: seq,
                timestamp: period * seq,
                bytes_used,
                buffer: slot,
            },
        })
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.streaming.store(false, Ordering::SeqCst);
    }
}

/// Generate test frame data based on pattern.
///
/// The first four payload bytes carry the little-endian sequence number so
/// consecutive frames never compare equal.
fn generate_test_frame(format: &Format, pattern: TestPattern, sequence: u32) -> Vec<u8> {
    let mut data = if format.fourcc == FourCC::MJPG {
        generate_jpeg(format.width, format.height)
    } else {
        let size = format
            .fourcc
            .image_size(format.width, format.height)
            .unwrap_or(0);
        let mut data = vec![0u8; size];

        match pattern {
            TestPattern::ColorBars if format.fourcc == FourCC::YUYV => {
                generate_color_bars(&mut data, format.width, format.height);
            }
            TestPattern::ColorBars => {}
            TestPattern::Solid(y, u, v) => {
                generate_solid(&mut data, y, u, v);
            }
        }
        data
    };

    let offset = usize::from(format.fourcc == FourCC::MJPG) * 2;
    if let Some(stamp) = data.get_mut(offset..offset + 4) {
        stamp.copy_from_slice(&sequence.to_le_bytes());
    }
    data
}

/// Generate a JPEG-shaped payload: SOI marker, filler, EOI marker.
fn generate_jpeg(width: u32, height: u32) -> Vec<u8> {
    let len = ((width as usize) * (height as usize) / 10).max(8);
    let mut data = vec![0x55u8; len];
    data[..2].copy_from_slice(&[0xFF, 0xD8]);
    data[len - 2..].copy_from_slice(&[0xFF, 0xD9]);
    data
}

/// Generate YUYV color bars pattern.
fn generate_color_bars(data: &mut [u8], width: u32, height: u32) {
    // 8 color bars: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
    let bars: [(u8, u8, u8); 8] = [
        (235, 128, 128), // White
        (210, 16, 146),  // Yellow
        (170, 166, 16),  // Cyan
        (145, 54, 34),   // Green
        (106, 202, 222), // Magenta
        (81, 90, 240),   // Red
        (41, 240, 110),  // Blue
        (16, 128, 128),  // Black
    ];

    let bar_width = (width / 8).max(1);

    for y in 0..height {
        for x in (0..width).step_by(2) {
            let bar_idx = (x / bar_width).min(7) as usize;
            let (y_val, u_val, v_val) = bars[bar_idx];

            let offset = ((y * width + x) * 2) as usize;
            if offset + 3 < data.len() {
                data[offset] = y_val;
                data[offset + 1] = u_val;
                data[offset + 2] = y_val;
                data[offset + 3] = v_val;
            }
        }
    }
}

/// Generate solid color YUYV frame.
fn generate_solid(data: &mut [u8], y: u8, u: u8, v: u8) {
    for chunk in data.chunks_exact_mut(4) {
        chunk.copy_from_slice(&[y, u, y, v]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_device_creation() {
        let device = MockDevice::new();
        assert_eq!(device.capabilities().driver, "mock");
        assert!(device.capabilities().can_capture);
        assert!(device.capabilities().can_stream);
    }

    #[test]
    fn test_mock_device_format() {
        let mut device = MockDevice::new();
        assert_eq!(device.current_format().width, 640);

        let new_format = Format::new(320, 240, FourCC::YUYV);
        let actual = device.set_format(&new_format).expect("set_format should succeed");
        assert_eq!(actual, new_format);
    }

    #[test]
    fn test_mock_format_subset() {
        let device = MockDevice::new().with_formats(&[FourCC::YUYV]);
        let formats = device.enum_formats().expect("enum_formats");
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].fourcc, FourCC::YUYV);
        assert!(device.enum_framesizes(FourCC::MJPG).expect("sizes").is_empty());

        assert_eq!(device.format().expect("format"), *device.current_format());
        assert_eq!(device.frame_interval().expect("interval"), Ratio::new(1, 30));
    }

    #[test]
    fn test_mock_busy_while_streaming() {
        let mut device = MockDevice::new();
        let format = device.current_format().clone();
        assert!(!device.is_busy(&format).expect("is_busy"));

        let stream = device.create_stream(2).expect("create_stream should succeed");
        assert!(device.is_busy(&format).expect("is_busy"));
        assert!(device.set_format(&format).is_err());
        assert!(device.create_stream(2).is_err());

        drop(stream);
        assert!(!device.is_busy(&format).expect("is_busy"));
    }

    #[test]
    fn test_mock_stream_capture() {
        let mut device = MockDevice::new();
        let mut stream = device.create_stream(4).expect("create_stream should succeed");

        let frame1 = stream.next_frame().expect("next_frame should succeed");
        assert_eq!(frame1.metadata.sequence, 0);
        assert_eq!(frame1.data.len(), 640 * 480 * 2);

        let frame2 = stream.next_frame().expect("next_frame should succeed");
        assert_eq!(frame2.metadata.sequence, 1);
        assert_ne!(frame1.data, frame2.data);
    }

    #[test]
    fn test_color_bars_pattern() {
        let format = Format::new(640, 480, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::ColorBars, 0);

        assert_eq!(data.len(), 640 * 480 * 2);
        // Past the sequence stamp, the first bar is white (Y=235)
        assert_eq!(data[4], 235);
    }

    #[test]
    fn test_solid_pattern() {
        let format = Format::new(64, 64, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::Solid(128, 64, 192), 0);

        assert_eq!(data[4], 128);
        assert_eq!(data[5], 64);
        assert_eq!(data[6], 128);
        assert_eq!(data[7], 192);
    }

    #[test]
    fn test_jpeg_payload_markers() {
        let format = Format::new(320, 240, FourCC::MJPG);
        let data = generate_test_frame(&format, TestPattern::ColorBars, 7);

        assert_eq!(&data[..2], &[0xFF, 0xD8]);
        assert_eq!(&data[2..6], &7u32.to_le_bytes());
        assert_eq!(&data[data.len() - 2..], &[0xFF, 0xD9]);
    }
}
