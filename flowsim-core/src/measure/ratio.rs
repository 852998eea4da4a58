use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A validated fraction in the range `[0.0, 1.0]`.
///
/// Used for the read/write split of clients and database routers and for
/// the backpressure admission threshold of load balancers.
///
/// # Example
///
/// ```
/// use flowsim_core::measure::Ratio;
///
/// let reads = Ratio::new(0.7).unwrap();
/// assert_eq!(reads.to_string(), "70%");
/// assert_eq!(reads.complement().value(), 1.0 - 0.7);
///
/// let parsed: Ratio = "70%".parse().unwrap();
/// assert_eq!(parsed, reads);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Ratio(f64);

impl Ratio {
    pub const ZERO: Self = Self(0.0);
    pub const ONE: Self = Self(1.0);

    /// Create a new validated ratio.
    ///
    /// # Errors
    ///
    /// Returns [`RatioError`] if `value` is NaN, negative, or greater
    /// than `1.0`.
    pub fn new(value: f64) -> Result<Self, RatioError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(RatioError(value));
        }
        Ok(Self(value))
    }

    /// Clamp `value` into `[0.0, 1.0]`. NaN becomes `0.0`.
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            Self::ZERO
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    /// Returns the inner `f64` value.
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// `1 - self`.
    #[inline]
    #[must_use = "function does not modify the current value"]
    pub fn complement(self) -> Self {
        Self(1.0 - self.0)
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

impl TryFrom<f64> for Ratio {
    type Error = RatioError;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ratio> for f64 {
    fn from(value: Ratio) -> Self {
        value.0
    }
}

impl fmt::Display for Ratio {
    /// Formats as a percentage with up to 2 decimal places.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = self.0 * 100.0;
        if pct.fract() == 0.0 {
            write!(f, "{}%", pct as u64)
        } else {
            write!(f, "{:.2}%", pct)
        }
    }
}

impl FromStr for Ratio {
    type Err = RatioParseError;

    /// Parses either a percentage (`"70%"`) or a plain fraction (`"0.7"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (num, scale) = match s.strip_suffix('%') {
            Some(num) => (num.trim(), 100.0),
            None => (s, 1.0),
        };
        let value: f64 = num.parse().map_err(|_| RatioParseError::InvalidNumber)?;
        Self::new(value / scale).map_err(RatioParseError::OutOfRange)
    }
}

/// Error returned when constructing a [`Ratio`] outside `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("ratio must be in [0.0, 1.0], got {0}")]
pub struct RatioError(pub f64);

/// Error returned when parsing a [`Ratio`] from a string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RatioParseError {
    #[error("invalid number")]
    InvalidNumber,
    #[error("{0}")]
    OutOfRange(#[from] RatioError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        assert_eq!(Ratio::new(0.0).unwrap(), Ratio::ZERO);
        assert_eq!(Ratio::new(1.0).unwrap(), Ratio::ONE);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(Ratio::new(-0.01).is_err());
        assert!(Ratio::new(1.01).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn clamped() {
        assert_eq!(Ratio::clamped(1.5), Ratio::ONE);
        assert_eq!(Ratio::clamped(-2.0), Ratio::ZERO);
        assert_eq!(Ratio::clamped(f64::NAN), Ratio::ZERO);
        assert_eq!(Ratio::clamped(0.25).value(), 0.25);
    }

    #[test]
    fn display() {
        assert_eq!(Ratio::new(0.05).unwrap().to_string(), "5%");
        assert_eq!(Ratio::new(0.123).unwrap().to_string(), "12.30%");
        assert_eq!(Ratio::ONE.to_string(), "100%");
    }

    #[test]
    fn parse() {
        assert_eq!("30%".parse::<Ratio>().unwrap(), Ratio::new(0.3).unwrap());
        assert_eq!("0.25".parse::<Ratio>().unwrap(), Ratio::new(0.25).unwrap());
        assert!("abc".parse::<Ratio>().is_err());
        assert!("150%".parse::<Ratio>().is_err());
    }

    #[test]
    fn deserialize_validates() {
        let ratio: Ratio = serde_json::from_str("0.7").unwrap();
        assert_eq!(ratio.value(), 0.7);
        assert!(serde_json::from_str::<Ratio>("1.5").is_err());
    }
}
