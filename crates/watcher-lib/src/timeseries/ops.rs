//! Series-level combinators

use super::{TimeSeries, F, NAN};

/// Per-step increase of a monotonic counter, gated by a liveness series.
///
/// * both samples present: `curr - prev`, or `curr` alone if the counter
///   went backwards (reset from zero)
/// * previous sample missing while `status` was exactly 1 at the previous
///   step: `curr` (first value after start counts in full)
/// * otherwise missing
///
/// `status` is aligned with `x` by index.
pub fn increase(x: &TimeSeries, status: &TimeSeries) -> TimeSeries {
    let status = status.data();
    let mut data = Vec::with_capacity(x.len());
    let mut prev = NAN;
    let mut prev_status = NAN;

    for (i, (_, v)) in x.iter().enumerate() {
        let d = if !v.is_nan() && !prev.is_nan() {
            if v - prev >= 0.0 {
                v - prev
            } else {
                v
            }
        } else if prev.is_nan() && prev_status == 1.0 {
            v
        } else {
            NAN
        };
        prev = v;
        prev_status = status.get(i).copied().unwrap_or(NAN);
        data.push(d);
    }

    TimeSeries::with_data(x.from(), x.step(), data)
}

/// Fold `ts` into `dest` with a reducer, taking `ts` as-is when `dest` is absent.
///
/// A series with a different window leaves `dest` unchanged.
pub fn merge(dest: &mut Option<TimeSeries>, ts: &TimeSeries, f: F) {
    match dest {
        None => *dest = Some(ts.clone()),
        Some(d) if d.same_shape(ts) => {
            let data = d
                .iter()
                .zip(ts.data())
                .map(|((t, a), &b)| f(t, a, b))
                .collect();
            *d = TimeSeries::with_data(d.from(), d.step(), data);
        }
        Some(_) => {}
    }
}

/// Point-wise binary combination of two series with identical windows.
///
/// Returns `None` when either side is absent or the windows differ.
pub fn aggregate2(
    x: Option<&TimeSeries>,
    y: Option<&TimeSeries>,
    f: impl Fn(f32, f32) -> f32,
) -> Option<TimeSeries> {
    let (x, y) = (x?, y?);
    if !x.same_shape(y) {
        return None;
    }
    let data = x
        .data()
        .iter()
        .zip(y.data())
        .map(|(&a, &b)| f(a, b))
        .collect();
    Some(TimeSeries::with_data(x.from(), x.step(), data))
}

pub fn mul(x: Option<&TimeSeries>, y: Option<&TimeSeries>) -> Option<TimeSeries> {
    aggregate2(x, y, |a, b| a * b)
}

/// `0 / 0` and missing operands resolve to NaN
pub fn div(x: Option<&TimeSeries>, y: Option<&TimeSeries>) -> Option<TimeSeries> {
    aggregate2(x, y, |a, b| a / b)
}

pub fn sub(x: Option<&TimeSeries>, y: Option<&TimeSeries>) -> Option<TimeSeries> {
    aggregate2(x, y, |a, b| a - b)
}

pub fn sum(x: Option<&TimeSeries>, y: Option<&TimeSeries>) -> Option<TimeSeries> {
    aggregate2(x, y, |a, b| a + b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::{Duration, Time};

    fn series(values: &[f32]) -> TimeSeries {
        TimeSeries::with_data(Time(0), Duration(15), values.to_vec())
    }

    fn assert_series(ts: &TimeSeries, expected: &[f32]) {
        assert_eq!(ts.len(), expected.len());
        for (got, want) in ts.data().iter().zip(expected) {
            if want.is_nan() {
                assert!(got.is_nan(), "expected NaN, got {got}");
            } else {
                assert_eq!(got, want);
            }
        }
    }

    #[test]
    fn test_increase_with_counter_reset() {
        let x = series(&[10.0, 15.0, 12.0, 14.0]);
        let status = series(&[1.0, 1.0, 1.0, 1.0]);
        assert_series(&increase(&x, &status), &[NAN, 5.0, 12.0, 2.0]);
    }

    #[test]
    fn test_increase_first_value_after_start_counts() {
        // the instance was already up at step 1 but the counter appeared at step 2
        let x = series(&[NAN, NAN, 3.0, 4.0]);
        let status = series(&[0.0, 1.0, 1.0, 1.0]);
        assert_series(&increase(&x, &status), &[NAN, NAN, 3.0, 1.0]);
    }

    #[test]
    fn test_increase_gap_without_liveness_is_missing() {
        let x = series(&[5.0, NAN, 7.0]);
        let status = series(&[1.0, 0.0, 1.0]);
        assert_series(&increase(&x, &status), &[NAN, NAN, NAN]);
    }

    #[test]
    fn test_increase_short_status() {
        let x = series(&[1.0, 2.0, 4.0]);
        let status = series(&[1.0]);
        assert_series(&increase(&x, &status), &[NAN, 1.0, 2.0]);
    }

    #[test]
    fn test_binary_ops() {
        let x = series(&[4.0, 6.0, NAN]);
        let y = series(&[2.0, 0.0, 1.0]);
        let (x, y) = (Some(&x), Some(&y));
        assert_series(&mul(x, y).unwrap(), &[8.0, 0.0, NAN]);
        assert_series(&sub(x, y).unwrap(), &[2.0, 6.0, NAN]);
        assert_series(&sum(x, y).unwrap(), &[6.0, 6.0, NAN]);
        let d = div(x, y).unwrap();
        assert_eq!(d.data()[0], 2.0);
        assert!(d.data()[1].is_infinite());
        assert!(d.data()[2].is_nan());
    }

    #[test]
    fn test_merge() {
        let mut dest = None;
        merge(&mut dest, &series(&[NAN, 2.0]), crate::timeseries::any);
        merge(&mut dest, &series(&[1.0, 5.0]), crate::timeseries::any);
        assert_series(dest.as_ref().unwrap(), &[1.0, 2.0]);
        merge(&mut dest, &series(&[9.0]), crate::timeseries::any);
        assert_series(dest.as_ref().unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_aggregate2_requires_same_shape() {
        let x = series(&[1.0, 2.0]);
        let shorter = series(&[1.0]);
        let other_step = TimeSeries::with_data(Time(0), Duration(30), vec![1.0, 2.0]);
        assert!(sum(Some(&x), Some(&shorter)).is_none());
        assert!(sum(Some(&x), Some(&other_step)).is_none());
    }

    #[test]
    fn test_aggregate2_absent_side() {
        let x = series(&[1.0, 2.0]);
        assert!(mul(Some(&x), None).is_none());
        assert!(div(None, Some(&x)).is_none());
        assert!(aggregate2(None, None, |a, b| a + b).is_none());
    }
}
