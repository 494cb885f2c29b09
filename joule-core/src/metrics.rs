// SPDX-License-Identifier: MIT

//! Metrics aggregation (C9).
//!
//! One pure function: turn a nonempty vector of sample durations into
//! mean/p95/p99/max, leaving the input vector untouched. Quantiles use
//! linear interpolation between order statistics, computed on a sorted
//! copy so the caller's data is never mutated.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("cannot aggregate metrics over an empty sample set")]
    EmptySamples,
}

/// Linearly interpolated order statistic at quantile `q` (`0.0..=1.0`) over
/// `sorted` (already ascending). `sorted` must be nonempty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}

/// Aggregate `samples` into `mean`/`p95`/`p99`/`max`, keyed by those exact
/// names. `samples` is read, not mutated — the sort happens on an internal
/// copy.
///
/// # Errors
/// [`MetricsError::EmptySamples`] if `samples` is empty.
pub fn aggregate(samples: &[f64]) -> Result<BTreeMap<String, f64>, MetricsError> {
    if samples.is_empty() {
        return Err(MetricsError::EmptySamples);
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let p95 = quantile(&sorted, 0.95);
    let p99 = quantile(&sorted, 0.99);
    let max = *sorted.last().unwrap();

    let mut out = BTreeMap::new();
    out.insert("mean".to_string(), mean);
    out.insert("p95".to_string(), p95);
    out.insert("p99".to_string(), p99);
    out.insert("max".to_string(), max);
    Ok(out)
}
