//! Series-level preprocessing shared by the controller and the evaluators.
//!
//! Values are z-normalised per series (NaNs are treated as missing and left
//! in place) and prefixes are cut proportionally for truncated or early
//! classification runs.

use statrs::statistics::Statistics;

/// Standard deviations below this are treated as a constant series.
const MIN_STD: f64 = 1e-8;

/// Z-normalise a single series using the population standard deviation of
/// its observed values. Constant series map to zeros.
pub fn z_normalise(values: &[f64]) -> Vec<f64> {
    let observed: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if observed.is_empty() {
        return values.to_vec();
    }

    let mean = observed.iter().mean();
    let std = observed.iter().population_std_dev();

    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                v
            } else if std < MIN_STD {
                0.0
            } else {
                (v - mean) / std
            }
        })
        .collect()
}

/// Number of leading points kept when truncating a series of `length` to
/// `proportion` of its length. Never less than one point for a non-empty
/// series and never more than `length`.
pub fn truncated_length(length: usize, proportion: f64) -> usize {
    if length == 0 {
        return 0;
    }
    let kept = (proportion * length as f64).round() as usize;
    kept.clamp(1, length)
}
