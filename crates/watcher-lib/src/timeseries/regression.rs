//! Ordinary least squares over a series

use super::{Time, TimeSeries};

/// Minimum number of present samples to fit a line
const MIN_SAMPLES: usize = 2;

/// Linear fit `value = slope * (t - t0) + intercept` over the present samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRegression {
    t0: f64,
    slope: f64,
    intercept: f64,
}

impl LinearRegression {
    /// Fit a line ignoring missing samples.
    ///
    /// Returns `None` with fewer than two present samples or when every
    /// present sample shares the same timestamp.
    pub fn new(ts: &TimeSeries) -> Option<Self> {
        let points: Vec<(i64, f32)> = ts
            .iter()
            .filter(|(_, v)| !v.is_nan())
            .map(|(t, v)| (t.0, v))
            .collect();
        if points.len() < MIN_SAMPLES {
            return None;
        }

        // Normalize timestamps to avoid precision issues
        let t0 = points[0].0 as f64;
        let n = points.len() as f64;

        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut sum_xy = 0.0;
        let mut sum_xx = 0.0;

        for (t, v) in &points {
            let x = *t as f64 - t0;
            let y = *v as f64;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_xx += x * x;
        }

        let denominator = n * sum_xx - sum_x * sum_x;
        if denominator.abs() < f64::EPSILON {
            return None;
        }

        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        let intercept = (sum_y - slope * sum_x) / n;

        Some(Self {
            t0,
            slope,
            intercept,
        })
    }

    /// Change in value per second
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Extrapolate the fitted value at `t`
    pub fn calc(&self, t: Time) -> f32 {
        (self.slope * (t.0 as f64 - self.t0) + self.intercept) as f32
    }
}
