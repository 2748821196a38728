//! Fixed-step dense time series
//!
//! This module provides:
//! - `Time`/`Duration` quantised to whole seconds
//! - `TimeSeries`, a pre-allocated window of `f32` samples with NaN as "no data"
//! - Point-wise reducers, counter increase and binary combinators
//! - `Aggregate` for folding an open-ended number of series
//! - Least-squares `LinearRegression`

mod aggregate;
mod funcs;
mod ops;
mod regression;
mod series;

pub use aggregate::Aggregate;
pub use funcs::{any, defined, max, min, nan_sum, nan_to_zero, F};
pub use ops::{aggregate2, div, increase, merge, mul, sub, sum};
pub use regression::LinearRegression;
pub use series::{Iter, TimeSeries};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// The "missing" sample value
pub const NAN: f32 = f32::NAN;

pub const SECOND: Duration = Duration(1);
pub const MINUTE: Duration = Duration(60);
pub const HOUR: Duration = Duration(3600);
pub const DAY: Duration = Duration(86400);

/// Returns true if `v` is the missing-value sentinel
#[inline]
pub fn is_nan(v: f32) -> bool {
    v.is_nan()
}

/// Unix timestamp in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Time(pub i64);

/// Interval in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Duration(pub i64);

impl Time {
    pub fn now() -> Self {
        Time(chrono::Utc::now().timestamp())
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Rounds down to a multiple of `step`
    pub fn truncate(self, step: Duration) -> Self {
        if step.0 <= 0 {
            return self;
        }
        Time(self.0 - self.0.rem_euclid(step.0))
    }
}

impl Duration {
    pub fn as_secs(self) -> i64 {
        self.0
    }
}

impl Add<Duration> for Time {
    type Output = Time;

    fn add(self, rhs: Duration) -> Time {
        Time(self.0 + rhs.0)
    }
}

impl Sub<Duration> for Time {
    type Output = Time;

    fn sub(self, rhs: Duration) -> Time {
        Time(self.0 - rhs.0)
    }
}

impl Sub for Time {
    type Output = Duration;

    fn sub(self, rhs: Time) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl Mul<i64> for Duration {
    type Output = Duration;

    fn mul(self, rhs: i64) -> Duration {
        Duration(self.0 * rhs)
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0 + rhs.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(Time(125).truncate(Duration(60)), Time(120));
        assert_eq!(Time(120).truncate(Duration(60)), Time(120));
        assert_eq!(Time(125).truncate(Duration(0)), Time(125));
    }

    #[test]
    fn test_time_arithmetic() {
        let t = Time(1000);
        assert_eq!(t + MINUTE, Time(1060));
        assert_eq!(t - MINUTE, Time(940));
        assert_eq!(Time(1060) - t, MINUTE);
        assert!(t < Time(1001));
        assert!(Time::default().is_zero());
    }

    #[test]
    fn test_time_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Time(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&HOUR).unwrap(), "3600");
    }
}
