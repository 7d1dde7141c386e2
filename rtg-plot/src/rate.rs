//! Rate computation
//!
//! Derivative mode turns counters into per-second rates, replacing rates
//! from badly spaced samples (poll skew) with the previous accepted one.
//! Gauge mode passes `counter * factor` through.

use crate::series::{RateStats, Series};
use rtg_kernel::RtgConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How stored counters relate to each other
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterEncoding {
    /// Monotonic device counter; a sample's increment is the difference
    /// with its predecessor
    #[default]
    Cumulative,
    /// Each sample already holds the increment since the previous poll
    Delta,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateParams {
    pub factor: f64,
    /// Nominal poll interval, seconds
    pub interval: f64,
    pub high_skew_slop: f64,
    pub low_skew_slop: f64,
    pub encoding: CounterEncoding,
}

impl RateParams {
    pub fn from_config(cfg: &RtgConfig, factor: f64, encoding: CounterEncoding) -> Self {
        Self {
            factor,
            interval: cfg.interval_secs as f64,
            high_skew_slop: cfg.high_skew_slop,
            low_skew_slop: cfg.low_skew_slop,
            encoding,
        }
    }

    fn skewed(&self, elapsed: u64) -> bool {
        let elapsed = elapsed as f64;
        elapsed <= 0.0
            || elapsed > self.high_skew_slop * self.interval
            || elapsed < self.low_skew_slop * self.interval
    }
}

/// Derivative rates. Needs at least two samples; shorter series get
/// all-zero stats.
pub fn compute_rate(series: &mut Series, params: &RateParams) -> RateStats {
    let mut stats = RateStats::default();
    let points = series.points_mut();
    if points.is_empty() {
        return stats;
    }

    let mut last_rate = 0.0;
    let mut derived = 0usize;
    let mut sum = 0.0;
    points[0].rate = 0.0;

    for i in 1..points.len() {
        let (prev, cur) = (points[i - 1], points[i]);
        let elapsed = cur.timestamp.saturating_sub(prev.timestamp);
        let increment = match params.encoding {
            CounterEncoding::Cumulative => (cur.counter as i128 - prev.counter as i128) as f64,
            CounterEncoding::Delta => cur.counter as f64,
        };

        let mut rate = if elapsed > 0 {
            increment * params.factor / elapsed as f64
        } else {
            last_rate
        };
        if params.skewed(elapsed) {
            info!(
                elapsed,
                interval = params.interval,
                "poll skew, keeping previous rate"
            );
            rate = last_rate;
        }
        debug!(counter = cur.counter, ts = cur.timestamp, elapsed, rate, "rate");
        if rate < 0.0 {
            warn!(ts = cur.timestamp, rate, "negative rate");
        }

        derived += 1;
        sum += rate;
        stats.total += increment;
        if rate > stats.max {
            stats.max = rate;
        }
        points[i].rate = rate;
        last_rate = rate;
    }

    if derived > 0 {
        stats.cur = last_rate;
        stats.avg = sum / derived as f64;
        // no predecessor for the first point: reuse the second rate
        points[0].rate = points[1].rate;
    }
    stats
}

/// Gauge/impulse values: `counter * factor` per sample, no derivative.
pub fn compute_total(series: &mut Series, factor: f64) -> RateStats {
    let mut stats = RateStats::default();
    let points = series.points_mut();
    if points.is_empty() {
        return stats;
    }

    for p in points.iter_mut() {
        p.rate = p.counter as f64 * factor;
        stats.total += p.rate;
        stats.cur = p.rate;
        if p.rate > stats.max {
            stats.max = p.rate;
        }
    }
    stats.avg = stats.total / points.len() as f64;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtg_devkit::samples;

    fn params(interval: f64, high: f64, low: f64) -> RateParams {
        RateParams {
            factor: 8.0,
            interval,
            high_skew_slop: high,
            low_skew_slop: low,
            encoding: CounterEncoding::Cumulative,
        }
    }

    #[test]
    fn test_empty_series_is_noop() {
        let mut s = Series::new("empty", &[]);
        assert_eq!(compute_rate(&mut s, &params(60.0, 1.5, 0.5)), RateStats::default());
        assert_eq!(compute_total(&mut s, 8.0), RateStats::default());
    }

    #[test]
    fn test_single_sample_has_zero_stats() {
        let mut s = Series::new("one", &samples(&[(1_000, 123_456)]));
        let stats = compute_rate(&mut s, &params(60.0, 1.5, 0.5));
        assert_eq!(stats, RateStats::default());
        assert_eq!(s.points()[0].rate, 0.0);
    }

    #[test]
    fn test_two_samples_derivative_and_first_point() {
        let mut s = Series::new("pair", &samples(&[(1_000, 1_000), (1_060, 2_000)]));
        let stats = compute_rate(&mut s, &params(60.0, 1.5, 0.5));

        let expected = (2_000.0 - 1_000.0) * 8.0 / 60.0;
        assert!((s.points()[1].rate - expected).abs() < 1e-9);
        assert!((expected - 133.333_333).abs() < 1e-3);
        assert_eq!(s.points()[0].rate, s.points()[1].rate);
        assert_eq!(stats.max, s.points()[1].rate);
        assert_eq!(stats.cur, s.points()[1].rate);
        assert_eq!(stats.avg, s.points()[1].rate);
        assert_eq!(stats.total, 1_000.0);
    }

    #[test]
    fn test_delta_encoding() {
        let mut s = Series::new("delta", &samples(&[(0, 500), (60, 600)]));
        let p = RateParams {
            encoding: CounterEncoding::Delta,
            ..params(60.0, 1.5, 0.5)
        };
        compute_rate(&mut s, &p);
        assert!((s.points()[1].rate - 600.0 * 8.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_high_skew_carries_previous_rate() {
        // 60s then 400s: 400 > 3 * 60, the second rate is not derived
        let mut s = Series::new("skew", &samples(&[(0, 0), (60, 600), (460, 100_000)]));
        let stats = compute_rate(&mut s, &params(60.0, 3.0, 0.5));

        let carried = 600.0 * 8.0 / 60.0;
        assert_eq!(s.rates(), vec![carried, carried, carried]);
        assert_eq!(stats.max, carried);
    }

    #[test]
    fn test_skewed_first_pair_uses_zero() {
        let mut s = Series::new("skew", &samples(&[(0, 0), (400, 600)]));
        let stats = compute_rate(&mut s, &params(60.0, 3.0, 0.5));
        assert_eq!(s.rates(), vec![0.0, 0.0]);
        assert_eq!(stats.max, 0.0);
    }

    #[test]
    fn test_low_skew_carries_previous_rate() {
        let mut s = Series::new("skew", &samples(&[(0, 0), (60, 600), (70, 5_000)]));
        compute_rate(&mut s, &params(60.0, 1.5, 0.5));
        assert_eq!(s.points()[2].rate, s.points()[1].rate);
    }

    #[test]
    fn test_negative_rate_is_propagated() {
        // counter reset
        let mut s = Series::new("reset", &samples(&[(0, 10_000), (60, 100)]));
        let stats = compute_rate(&mut s, &params(60.0, 1.5, 0.5));
        assert!(s.points()[1].rate < 0.0);
        assert_eq!(stats.max, 0.0);
        assert!(stats.avg < 0.0);
    }

    #[test]
    fn test_gauge_total() {
        let mut s = Series::new("gauge", &samples(&[(0, 10), (60, 30), (120, 20)]));
        let stats = compute_total(&mut s, 2.0);
        assert_eq!(s.rates(), vec![20.0, 60.0, 40.0]);
        assert_eq!(stats.total, 120.0);
        assert_eq!(stats.avg, 40.0);
        assert_eq!(stats.max, 60.0);
        assert_eq!(stats.cur, 40.0);
    }
}
