//! Bucket ranges
//!
//! Variation `i` owns `[c_i * coverage, c_{i+1} * coverage)` where `c_i` is
//! the cumulative weight of the variations before it. Fractions at or above
//! `coverage` fall outside every range.

use crate::domain::errors::BucketingError;
use crate::domain::value_objects::BucketRange;

const DEFAULT_WEIGHT_TOLERANCE: f64 = 0.01;

/// Build the ranges for `weights` scaled into `[0, coverage)`.
pub fn bucket_ranges(
    weights: &[f64],
    coverage: f64,
    tolerance: f64,
) -> Result<Vec<BucketRange>, BucketingError> {
    if weights.is_empty() {
        return Err(BucketingError::NoVariations);
    }
    if !(0.0..=1.0).contains(&coverage) {
        return Err(BucketingError::InvalidCoverage { coverage });
    }
    let sum: f64 = weights.iter().sum();
    if weights.iter().any(|w| *w < 0.0) || (sum - 1.0).abs() > tolerance {
        return Err(BucketingError::InvalidWeights { sum });
    }

    let mut cumulative = 0.0;
    let ranges = weights
        .iter()
        .map(|weight| {
            let start = cumulative * coverage;
            cumulative += weight / sum;
            BucketRange::new(start, cumulative * coverage)
        })
        .collect();
    Ok(ranges)
}

/// Index of the range containing `fraction`, if any.
pub fn choose_variation_in_ranges(fraction: f64, ranges: &[BucketRange]) -> Option<usize> {
    ranges.iter().position(|range| range.contains(fraction))
}

/// Variation for `fraction` with full coverage. Invalid weights choose nothing.
pub fn choose_variation(fraction: f64, weights: &[f64]) -> Option<usize> {
    let ranges = bucket_ranges(weights, 1.0, DEFAULT_WEIGHT_TOLERANCE).ok()?;
    choose_variation_in_ranges(fraction, &ranges)
}
