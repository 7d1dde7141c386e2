//! Nth percentile of a rate series

use crate::series::{RatePoint, Series};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PercentileError {
    #[error("cannot take a percentile of an empty series")]
    EmptySeries,
    #[error("percentile {0} outside (0, 100]")]
    OutOfRange(f64),
}

pub fn check_rank(n: f64) -> Result<(), PercentileError> {
    if n > 0.0 && n <= 100.0 {
        Ok(())
    } else {
        Err(PercentileError::OutOfRange(n))
    }
}

/// Depth in the descending order: `floor(count * (1 - n/100))`
pub fn percentile_index(count: usize, n: f64) -> usize {
    (count as f64 * (100.0 - n) / 100.0).floor() as usize
}

/// The point exceeded by only `100 - n` percent of the series.
pub fn nth_percentile(series: &Series, n: f64) -> Result<RatePoint, PercentileError> {
    check_rank(n)?;
    if series.is_empty() {
        return Err(PercentileError::EmptySeries);
    }

    let mut sorted = series.points().to_vec();
    // stable: equal rates keep time order
    sorted.sort_by(|a, b| b.rate.total_cmp(&a.rate));

    let idx = percentile_index(sorted.len(), n).min(sorted.len() - 1);
    Ok(sorted[idx])
}
