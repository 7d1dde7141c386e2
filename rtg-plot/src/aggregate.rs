//! Aggregation: sums several normalized series into one
//!
//! Points are matched on pixel x, not timestamps, so series polled at
//! slightly different offsets still line up on the canvas.

use crate::graph::Graph;
use crate::series::{RateStats, Series};
use std::cmp::Ordering;

/// Folds `addend` into `base`. Both must already be normalized.
///
/// Walking both series in x order:
/// - addend behind base: skip the addend point
/// - addend ahead of base: base point takes the last merged rate
/// - same x: rates are summed
///
/// Sums raise the graph ceiling, with gauge headroom when `headroom` is
/// set. The addend's avg and total are then added to the base stats.
pub fn aggregate(
    base: &mut Series,
    addend: &Series,
    base_stats: &mut RateStats,
    addend_stats: &RateStats,
    graph: &mut Graph,
    headroom: bool,
) {
    tracing::debug!(base = %base.label, addend = %addend.label, "aggregate");
    let other = addend.points();
    let points = base.points_mut();
    let mut last_rate = points.first().map(|p| p.rate).unwrap_or(0.0);
    let (mut i, mut j) = (0, 0);

    while i < points.len() && j < other.len() {
        match other[j].x.cmp(&points[i].x) {
            Ordering::Less => j += 1,
            Ordering::Greater => {
                points[i].rate = last_rate;
                i += 1;
            }
            Ordering::Equal => {
                let sum = points[i].rate + other[j].rate;
                points[i].rate = sum;
                last_rate = sum;
                graph.offer_max(sum, headroom);
                if sum > base_stats.max {
                    base_stats.max = sum;
                }
                base_stats.cur = sum;
                i += 1;
                j += 1;
            }
        }
    }

    base_stats.avg += addend_stats.avg;
    base_stats.total += addend_stats.total;
}
