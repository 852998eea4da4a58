use super::Ratio;
use std::ops::{Add, AddAssign};

/// A request rate (requests per second) split into its read and write
/// tagged parts.
///
/// Clients tag their traffic when it leaves them; every other node carries
/// the tags forward, except database routers which re-split the volume
/// with their own read ratio.
///
/// ```
/// use flowsim_core::measure::{Flow, Ratio};
///
/// let flow = Flow::split(200.0, Ratio::new(0.7).unwrap());
/// assert_eq!(flow.total(), 200.0);
/// assert!((flow.read - 140.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Flow {
    pub read: f64,
    pub write: f64,
}

impl Flow {
    pub const ZERO: Self = Self {
        read: 0.0,
        write: 0.0,
    };

    pub const fn new(read: f64, write: f64) -> Self {
        Self { read, write }
    }

    /// Split `total` into reads and writes according to `read_ratio`.
    pub fn split(total: f64, read_ratio: Ratio) -> Self {
        let read = total * read_ratio.value();
        Self {
            read,
            write: total - read,
        }
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.read + self.write
    }

    /// Multiply both sub-flows by `factor`.
    #[must_use = "function does not modify the current value"]
    pub fn scale(self, factor: f64) -> Self {
        Self {
            read: self.read * factor,
            write: self.write * factor,
        }
    }

    /// Scale the flow down so that its total does not exceed `limit`,
    /// keeping the read/write proportions.
    #[must_use = "function does not modify the current value"]
    pub fn cap(self, limit: f64) -> Self {
        let total = self.total();
        if total <= limit {
            self
        } else if total > 0.0 {
            self.scale(limit.max(0.0) / total)
        } else {
            Self::ZERO
        }
    }
}

impl Add for Flow {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            read: self.read + rhs.read,
            write: self.write + rhs.write,
        }
    }
}

impl AddAssign for Flow {
    fn add_assign(&mut self, rhs: Self) {
        self.read += rhs.read;
        self.write += rhs.write;
    }
}
