//! Loosely-shaped setter input and its coercion rules.
//!
//! Dimension and rate setters accept any number that denotes a real,
//! non-negative magnitude: integers, floats, exact rationals and complex
//! numbers whose imaginary part is zero. Format setters accept text or
//! symbols only. Every setter funnels its input through one of the
//! `to_*` methods here so the accept/reject rules live in one place.

use std::collections::BTreeMap;
use std::fmt;

use num_complex::Complex64;
use num_rational::Ratio;

use crate::error::{CameraError, Result};
use crate::traits::FourCC;

/// Float rates are rounded to this many steps per unit before being made exact.
const FLOAT_RATE_SCALE: f64 = 1000.0;

/// A symbolic name, as opposed to free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol(pub String);

impl Symbol {
    /// Create a symbol.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(name.to_owned())
    }
}

/// A setter argument of any shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Whole number.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Exact rational number.
    Rational(Ratio<i64>),
    /// Complex number.
    Complex(Complex64),
    /// Boolean.
    Boolean(bool),
    /// Free text.
    Text(String),
    /// Symbolic name.
    Symbol(Symbol),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Key/value mapping.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the value's kind, for error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Rational(_) => "rational",
            Self::Complex(_) => "complex",
            Self::Boolean(_) => "boolean",
            Self::Text(_) => "text",
            Self::Symbol(_) => "symbol",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Coerce to an image dimension.
    ///
    /// Fractional parts are truncated toward zero.
    pub fn to_dimension(&self) -> Result<u32> {
        match self {
            Self::Integer(n) => u32::try_from(*n)
                .map_err(|_| CameraError::OutOfRange(format!("{n} is not a valid dimension"))),
            Self::Float(x) => float_to_dimension(*x),
            Self::Rational(r) => {
                let whole = r.to_integer();
                u32::try_from(whole)
                    .map_err(|_| CameraError::OutOfRange(format!("{r} is not a valid dimension")))
            }
            Self::Complex(c) => {
                if c.im != 0.0 {
                    return Err(CameraError::OutOfRange(format!(
                        "{c} has a non-zero imaginary part"
                    )));
                }
                float_to_dimension(c.re)
            }
            other => Err(type_mismatch(other, "a number")),
        }
    }

    /// Coerce to an exact, strictly positive frames-per-second rate.
    pub fn to_rate(&self) -> Result<Ratio<u32>> {
        match self {
            Self::Integer(n) => {
                let n = u32::try_from(*n).map_err(|_| {
                    CameraError::OutOfRange(format!("{n} is not a valid frame rate"))
                })?;
                positive_rate(Ratio::from_integer(n))
            }
            Self::Float(x) => float_to_rate(*x),
            Self::Rational(r) => {
                let numer = u32::try_from(*r.numer());
                let denom = u32::try_from(*r.denom());
                match (numer, denom) {
                    (Ok(numer), Ok(denom)) if denom > 0 => positive_rate(Ratio::new(numer, denom)),
                    _ => Err(CameraError::OutOfRange(format!("{r} is not a valid frame rate"))),
                }
            }
            Self::Complex(c) => {
                if c.im != 0.0 {
                    return Err(CameraError::OutOfRange(format!(
                        "{c} has a non-zero imaginary part"
                    )));
                }
                float_to_rate(c.re)
            }
            other => Err(type_mismatch(other, "a number")),
        }
    }

    /// Coerce to a pixel format code.
    pub fn to_fourcc(&self) -> Result<FourCC> {
        let name = match self {
            Self::Text(text) => text.as_str(),
            Self::Symbol(Symbol(name)) => name.as_str(),
            other => return Err(type_mismatch(other, "text or a symbol")),
        };

        FourCC::from_name(name).ok_or_else(|| {
            CameraError::InvalidArgument(format!("unsupported pixel format {name:?}"))
        })
    }

    /// Coerce to a raw control value.
    ///
    /// Booleans map to 0/1. No other conversion is attempted.
    pub fn to_control_value(&self) -> Result<i64> {
        match self {
            Self::Integer(n) => Ok(*n),
            Self::Boolean(b) => Ok(i64::from(*b)),
            other => Err(type_mismatch(other, "an integer or boolean")),
        }
    }
}

fn type_mismatch(value: &Value, expected: &str) -> CameraError {
    CameraError::TypeMismatch(format!("expected {expected}, got {}", value.kind()))
}

fn float_to_dimension(x: f64) -> Result<u32> {
    let whole = x.trunc();
    if !whole.is_finite() || whole < 0.0 || whole > f64::from(u32::MAX) {
        return Err(CameraError::OutOfRange(format!("{x} is not a valid dimension")));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(whole as u32)
}

fn float_to_rate(x: f64) -> Result<Ratio<u32>> {
    let scaled = (x * FLOAT_RATE_SCALE).round();
    if !scaled.is_finite() || scaled <= 0.0 || scaled > f64::from(u32::MAX) {
        return Err(CameraError::OutOfRange(format!("{x} is not a valid frame rate")));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let numer = scaled as u32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let denom = FLOAT_RATE_SCALE as u32;
    Ok(Ratio::new(numer, denom))
}

fn positive_rate(rate: Ratio<u32>) -> Result<Ratio<u32>> {
    if *rate.numer() == 0 {
        return Err(CameraError::OutOfRange("frame rate must be positive".to_owned()));
    }
    Ok(rate)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Rational(r) => write!(f, "{r}"),
            Self::Complex(c) => write!(f, "{c}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Symbol(Symbol(name)) => write!(f, ":{name}"),
            Self::List(items) => write!(f, "[{} items]", items.len()),
            Self::Map(entries) => write!(f, "{{{} entries}}", entries.len()),
        }
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(n: $ty) -> Self {
                Self::Integer(i64::from(n))
            }
        })*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Self::Float(f64::from(x))
    }
}

impl From<Ratio<i64>> for Value {
    fn from(r: Ratio<i64>) -> Self {
        Self::Rational(r)
    }
}

impl From<Ratio<u32>> for Value {
    fn from(r: Ratio<u32>) -> Self {
        Self::Rational(Ratio::new(i64::from(*r.numer()), i64::from(*r.denom())))
    }
}

impl From<Complex64> for Value {
    fn from(c: Complex64) -> Self {
        Self::Complex(c)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Symbol> for Value {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

impl From<FourCC> for Value {
    fn from(fourcc: FourCC) -> Self {
        Self::Text(fourcc.to_code())
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Self>> for Value {
    fn from(entries: BTreeMap<String, Self>) -> Self {
        Self::Map(entries)
    }
}
