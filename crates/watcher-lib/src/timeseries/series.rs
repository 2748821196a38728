//! Dense fixed-step series

use super::{Duration, Time, F, NAN};
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use std::fmt;

/// Dense series of samples anchored at `from` with a fixed `step`.
///
/// Index `i` holds the sample for `from + i * step`. The window is allocated
/// up front and never grows; `set` and `fill` silently ignore anything that
/// falls outside of it.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    from: Time,
    step: Duration,
    data: Vec<f32>,
}

impl TimeSeries {
    /// Create a series of `count` missing samples
    pub fn new(from: Time, count: usize, step: Duration) -> Self {
        Self::with_data(from, step, vec![NAN; count])
    }

    pub fn with_data(from: Time, step: Duration, data: Vec<f32>) -> Self {
        Self { from, step, data }
    }

    pub fn from(&self) -> Time {
        self.from
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Exclusive end of the window
    pub fn to(&self) -> Time {
        self.from + self.step * self.data.len() as i64
    }

    /// Same start, step and length
    pub fn same_shape(&self, other: &TimeSeries) -> bool {
        self.from == other.from && self.step == other.step && self.data.len() == other.data.len()
    }

    fn index_of(&self, t: Time) -> Option<usize> {
        if self.step.0 <= 0 {
            return None;
        }
        let t = t.truncate(self.step);
        if t < self.from {
            return None;
        }
        let idx = ((t - self.from).0 / self.step.0) as usize;
        (idx < self.data.len()).then_some(idx)
    }

    /// Sample at `t` (truncated to the step), NaN outside the window
    pub fn get(&self, t: Time) -> f32 {
        self.index_of(t).map(|i| self.data[i]).unwrap_or(NAN)
    }

    /// Store `v` at `t` truncated to the step; no-op outside the window
    pub fn set(&mut self, t: Time, v: f32) {
        if let Some(idx) = self.index_of(t) {
            self.data[idx] = v;
        }
    }

    /// Merge an external series into this one wherever the windows overlap.
    ///
    /// Walks `data` forward only: once a slot has been written the cursor
    /// moves to the next slot, and input samples that fall before it are
    /// skipped. A present value is never replaced by a missing one.
    /// Returns true if any present value was written.
    pub fn fill(&mut self, from: Time, step: Duration, data: &[f32]) -> bool {
        if self.data.is_empty() || step.0 <= 0 || self.step.0 <= 0 {
            return false;
        }
        let last = self.from + self.step * (self.data.len() as i64 - 1);
        let mut changed = false;
        let mut cursor: Option<(usize, Time)> = None;

        for (i, &v) in data.iter().enumerate() {
            let t = from + step * i as i64;
            if t > last {
                break;
            }
            if t < self.from {
                continue;
            }
            let idx = match cursor {
                Some((idx, next)) => {
                    if t < next {
                        continue;
                    }
                    idx
                }
                None => ((t - self.from).0 / self.step.0) as usize,
            };
            if idx >= self.data.len() {
                break;
            }
            if !v.is_nan() || self.data[idx].is_nan() {
                self.data[idx] = v;
            }
            if !v.is_nan() {
                changed = true;
            }
            let slot = self.from + self.step * idx as i64;
            cursor = Some((idx + 1, slot + self.step));
        }
        changed
    }

    /// Chronological `(time, value)` pairs, missing samples included
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            from: self.from,
            step: self.step,
            data: &self.data,
            idx: 0,
        }
    }

    pub fn last(&self) -> f32 {
        self.data.last().copied().unwrap_or(NAN)
    }

    /// Most recent present sample
    pub fn last_not_null(&self) -> Option<(Time, f32)> {
        self.iter().filter(|(_, v)| !v.is_nan()).last()
    }

    /// Left fold starting from a missing accumulator
    pub fn reduce(&self, f: F) -> f32 {
        self.iter().fold(NAN, |acc, (t, v)| f(t, acc, v))
    }

    pub fn map(&self, f: impl Fn(Time, f32) -> f32) -> TimeSeries {
        let data = self.iter().map(|(t, v)| f(t, v)).collect();
        Self::with_data(self.from, self.step, data)
    }

    /// Same window, every sample set to `v`
    pub fn with_new_value(&self, v: f32) -> TimeSeries {
        Self::with_data(self.from, self.step, vec![v; self.data.len()])
    }
}

/// Single-pass iterator over a series; obtain a fresh one from `TimeSeries::iter`
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    from: Time,
    step: Duration,
    data: &'a [f32],
    idx: usize,
}

impl Iterator for Iter<'_> {
    type Item = (Time, f32);

    fn next(&mut self) -> Option<Self::Item> {
        let v = *self.data.get(self.idx)?;
        let t = self.from + self.step * self.idx as i64;
        self.idx += 1;
        Some((t, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.data.len() - self.idx;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl Serialize for TimeSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.data.is_empty() {
            return serializer.serialize_none();
        }
        let mut seq = serializer.serialize_seq(Some(self.data.len()))?;
        for v in &self.data {
            if v.is_finite() {
                seq.serialize_element(v)?;
            } else {
                seq.serialize_element(&Option::<f32>::None)?;
            }
        }
        seq.end()
    }
}

impl fmt::Display for TimeSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.data.iter().map(|v| format!("{v}")).collect();
        write!(
            f,
            "TimeSeries({}, {}, {}, [{}])",
            self.from,
            self.data.len(),
            self.step,
            values.join(" ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::nan_sum;

    fn series(values: &[f32]) -> TimeSeries {
        TimeSeries::with_data(Time(100), Duration(10), values.to_vec())
    }

    #[test]
    fn test_new_is_all_missing() {
        let ts = TimeSeries::new(Time(0), 5, Duration(10));
        assert_eq!(ts.len(), 5);
        assert!(ts.iter().all(|(_, v)| v.is_nan()));
        assert_eq!(ts.to(), Time(50));
    }

    #[test]
    fn test_set_then_get_truncates_to_step() {
        let mut ts = TimeSeries::new(Time(100), 5, Duration(10));
        ts.set(Time(127), 3.0);
        assert_eq!(ts.get(Time(120)), 3.0);
        assert_eq!(ts.get(Time(129)), 3.0);
        assert!(ts.get(Time(130)).is_nan());
    }

    #[test]
    fn test_set_outside_window_is_noop() {
        let mut ts = TimeSeries::new(Time(100), 3, Duration(10));
        ts.set(Time(90), 1.0);
        ts.set(Time(130), 1.0);
        ts.set(Time(1000), 1.0);
        assert!(ts.iter().all(|(_, v)| v.is_nan()));
    }

    #[test]
    fn test_fill_overlapping_window() {
        let mut ts = TimeSeries::new(Time(100), 4, Duration(10));
        let changed = ts.fill(Time(80), Duration(10), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert!(changed);
        assert_eq!(ts.data(), &[3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_fill_never_writes_outside_bounds() {
        let mut ts = TimeSeries::new(Time(100), 2, Duration(10));
        assert!(!ts.fill(Time(0), Duration(10), &[1.0, 2.0, 3.0]));
        assert!(!ts.fill(Time(200), Duration(10), &[1.0, 2.0, 3.0]));
        assert!(ts.iter().all(|(_, v)| v.is_nan()));
    }

    #[test]
    fn test_fill_keeps_present_values() {
        let mut ts = TimeSeries::new(Time(100), 3, Duration(10));
        assert!(ts.fill(Time(100), Duration(10), &[1.0, NAN, 3.0]));
        assert!(ts.fill(Time(100), Duration(10), &[NAN, 2.0, NAN]));
        assert_eq!(ts.data(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_fill_only_missing_reports_unchanged() {
        let mut ts = TimeSeries::new(Time(100), 3, Duration(10));
        assert!(!ts.fill(Time(100), Duration(10), &[NAN, NAN]));
    }

    #[test]
    fn test_fill_finer_input_takes_first_sample_per_slot() {
        let mut ts = TimeSeries::new(Time(100), 2, Duration(10));
        ts.fill(Time(100), Duration(5), &[1.0, 1.5, 2.0, 2.5]);
        assert_eq!(ts.data(), &[1.0, 2.0]);
    }

    #[test]
    fn test_iter_yields_missing_values() {
        let ts = series(&[1.0, NAN, 3.0]);
        let items: Vec<(Time, f32)> = ts.iter().collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], (Time(100), 1.0));
        assert_eq!(items[1].0, Time(110));
        assert!(items[1].1.is_nan());
        assert_eq!(items[2], (Time(120), 3.0));
        // restartable
        assert_eq!(ts.iter().count(), 3);
    }

    #[test]
    fn test_last_and_last_not_null() {
        let ts = series(&[1.0, 2.0, NAN]);
        assert!(ts.last().is_nan());
        assert_eq!(ts.last_not_null(), Some((Time(110), 2.0)));
        assert_eq!(series(&[NAN, NAN]).last_not_null(), None);
    }

    #[test]
    fn test_reduce_nan_sum() {
        assert_eq!(series(&[NAN, 2.0, NAN, 3.0]).reduce(nan_sum), 5.0);
        assert!(series(&[NAN, NAN]).reduce(nan_sum).is_nan());
    }

    #[test]
    fn test_map_and_with_new_value() {
        let ts = series(&[1.0, NAN]);
        let doubled = ts.map(|_, v| v * 2.0);
        assert_eq!(doubled.get(Time(100)), 2.0);
        assert!(doubled.get(Time(110)).is_nan());
        assert_eq!(ts.with_new_value(7.0).data(), &[7.0, 7.0]);
    }

    #[test]
    fn test_serialize_missing_as_null() {
        let ts = series(&[1.5, NAN, 2.0]);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "[1.5,null,2.0]");
        let empty = TimeSeries::new(Time(0), 0, Duration(10));
        assert_eq!(serde_json::to_string(&empty).unwrap(), "null");
    }
}
