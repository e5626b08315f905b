//! Format catalog: pixel formats, frame sizes and frame intervals.
//!
//! Discrete sizes are reported as-is. Devices that advertise a size range
//! instead get a synthesized ladder of common 16:9 and 4:3 sizes inside that
//! range, so callers always see a finite list.

use num_rational::Ratio;
use tracing::debug;

use crate::camera::Settings;
use crate::error::{CameraError, Result};
use crate::traits::{
    CameraDevice, FormatDescription, FourCC, FrameCapability, FrameInterval, FrameSize, Interval,
};

/// Smallest long edge of a synthesized size ladder.
const LADDER_START: u32 = 160;

/// Upper bound on intervals produced from one stepwise range.
const MAX_STEPWISE_INTERVALS: usize = 64;

/// Enumerate the pixel formats the device reports, in driver order.
pub fn supported_formats<D: CameraDevice>(device: &D) -> Result<Vec<FormatDescription>> {
    device.enum_formats()
}

/// Enumerate the frame capabilities of one pixel format.
///
/// Fails with `InvalidArgument` if the device does not report `fourcc`.
pub fn frame_capabilities<D: CameraDevice>(
    device: &D,
    fourcc: FourCC,
) -> Result<Vec<FrameCapability>> {
    let formats = device.enum_formats()?;
    if !formats.iter().any(|desc| desc.fourcc == fourcc) {
        return Err(CameraError::InvalidArgument(format!(
            "pixel format {fourcc} is not supported by this device"
        )));
    }

    let mut caps = Vec::new();
    for size in device.enum_framesizes(fourcc)? {
        match size {
            FrameSize::Discrete { width, height } => {
                caps.push(capability(device, fourcc, width, height)?);
            }
            FrameSize::Stepwise { .. } => {
                for (width, height) in size_ladder(&size) {
                    caps.push(capability(device, fourcc, width, height)?);
                }
                // A range describes the whole size space; nothing follows it.
                break;
            }
        }
    }

    Ok(caps)
}

fn capability<D: CameraDevice>(
    device: &D,
    fourcc: FourCC,
    width: u32,
    height: u32,
) -> Result<FrameCapability> {
    let mut intervals = Vec::new();
    for interval in device.enum_frameintervals(fourcc, width, height)? {
        match interval {
            FrameInterval::Discrete(value) => intervals.push(value),
            FrameInterval::Stepwise { min, max, step } => {
                intervals.extend(expand_intervals(min, max, step));
            }
        }
    }

    Ok(FrameCapability {
        width,
        height,
        intervals,
    })
}

/// Representative sizes inside a stepwise range.
///
/// Starting at 160 along the long edge and doubling while below the
/// maximum, each step yields a 16:9 and a 4:3 size.
fn size_ladder(size: &FrameSize) -> Vec<(u32, u32)> {
    let FrameSize::Stepwise {
        min_width,
        max_width,
        min_height,
        max_height,
        ..
    } = *size
    else {
        return Vec::new();
    };

    let fits = |(w, h): (u32, u32)| {
        (min_width..=max_width).contains(&w) && (min_height..=max_height).contains(&h)
    };

    let mut sizes = Vec::new();
    let landscape = max_width > max_height;
    let limit = if landscape { max_width } else { max_height };

    let mut edge = LADDER_START;
    while edge < limit {
        let wide = edge * 9 / 16;
        let classic = edge * 3 / 4;
        let pair = if landscape {
            [(edge, wide), (edge, classic)]
        } else {
            [(wide, edge), (classic, edge)]
        };
        sizes.extend(pair.into_iter().filter(|&dims| fits(dims)));

        match edge.checked_mul(2) {
            Some(next) => edge = next,
            None => break,
        }
    }

    sizes
}

/// Expand an interval range from `min` to `max` by `step`.
///
/// A zero step (continuous range) yields just the two endpoints.
fn expand_intervals(min: Interval, max: Interval, step: Interval) -> Vec<Interval> {
    if *step.numer() == 0 {
        return if min == max { vec![min] } else { vec![min, max] };
    }

    let widen = |r: Interval| Ratio::new(u64::from(*r.numer()), u64::from(*r.denom()));
    let (min, max, step) = (widen(min), widen(max), widen(step));

    let mut intervals = Vec::new();
    let mut current = min;
    while current <= max && intervals.len() < MAX_STEPWISE_INTERVALS {
        match narrow(current) {
            Some(interval) => intervals.push(interval),
            None => break,
        }
        current += step;
    }

    if intervals.len() == MAX_STEPWISE_INTERVALS {
        debug!(%min, %max, %step, "interval range truncated");
    }
    intervals
}

fn narrow(r: Ratio<u64>) -> Option<Interval> {
    let numer = u32::try_from(*r.numer()).ok()?;
    let denom = u32::try_from(*r.denom()).ok()?;
    Some(Ratio::new(numer, denom))
}

/// Check the configured format, size and interval against what the
/// device enumerates.
///
/// Size and interval ranges are checked directly against their bounds and
/// steps, not against the representative sizes `frame_capabilities` lists.
/// Drivers that do not enumerate sizes (or intervals) for a format are
/// given the benefit of the doubt on that axis.
pub fn validate<D: CameraDevice>(device: &D, settings: &Settings) -> Result<()> {
    let Settings {
        format,
        width,
        height,
        interval,
    } = *settings;

    if !device.enum_formats()?.iter().any(|desc| desc.fourcc == format) {
        return Err(CameraError::Configuration(format!(
            "pixel format {format} is not supported by this device"
        )));
    }

    let sizes = device.enum_framesizes(format)?;
    if !sizes.is_empty() && !sizes.iter().any(|size| size.contains(width, height)) {
        return Err(CameraError::Configuration(format!(
            "{width}x{height} is not supported for {format}"
        )));
    }

    let intervals = device.enum_frameintervals(format, width, height)?;
    if !intervals.is_empty() && !intervals.iter().any(|range| range.contains(interval)) {
        return Err(CameraError::Configuration(format!(
            "frame interval {interval} is not supported for {format} {width}x{height}"
        )));
    }

    Ok(())
}
