//! Point-wise reducers
//!
//! Reducers are folds over `(time, accumulator, value)` and treat NaN as
//! "no data" rather than as a number.

use super::{Time, NAN};

/// Reducer signature
pub type F = fn(Time, f32, f32) -> f32;

/// Prefers the first present operand
pub fn any(_t: Time, v1: f32, v2: f32) -> f32 {
    if !v1.is_nan() {
        v1
    } else {
        v2
    }
}

/// Sums present operands; missing only when both operands are missing
pub fn nan_sum(_t: Time, sum: f32, v: f32) -> f32 {
    match (sum.is_nan(), v.is_nan()) {
        (true, true) => NAN,
        (true, false) => v,
        (false, true) => sum,
        (false, false) => sum + v,
    }
}

pub fn max(_t: Time, max: f32, v: f32) -> f32 {
    if max.is_nan() {
        return v;
    }
    if v.is_nan() || v <= max {
        return max;
    }
    v
}

pub fn min(_t: Time, min: f32, v: f32) -> f32 {
    if min.is_nan() {
        return v;
    }
    if v.is_nan() || v >= min {
        return min;
    }
    v
}

/// 1 where a sample is present, 0 where it is missing
pub fn defined(_t: Time, v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        1.0
    }
}

pub fn nan_to_zero(_t: Time, v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v
    }
}
