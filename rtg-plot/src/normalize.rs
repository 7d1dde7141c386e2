//! Normalization: rates and timestamps to plot pixels
//!
//! Must run after every line's rates are known, so that `ymax` is the
//! global maximum and all lines share one scale.

use crate::graph::Graph;
use crate::series::Series;
use serde::Serialize;

pub const MINUTE: u64 = 60;
pub const HOUR: u64 = 60 * MINUTE;
pub const DAY: u64 = 24 * HOUR;
pub const WEEK: u64 = 7 * DAY;

pub const KILO: f64 = 1e3;
pub const MEGA: f64 = 1e6;
pub const GIGA: f64 = 1e9;
pub const TERA: f64 = 1e12;

/// Label granularity of the x axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Hour,
    Day,
    Week,
    Month,
}

impl TimeUnit {
    pub fn for_span(secs: u64) -> Self {
        match secs {
            s if s <= HOUR => TimeUnit::Hour,
            s if s <= DAY => TimeUnit::Day,
            s if s <= WEEK => TimeUnit::Week,
            _ => TimeUnit::Month,
        }
    }
}

/// Cosmetic divisor for y axis labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Magnitude {
    Unit,
    Kilo,
    Mega,
    Giga,
}

impl Magnitude {
    pub fn for_ymax(ymax: f64) -> Self {
        match ymax {
            y if y < KILO => Magnitude::Unit,
            y if y < MEGA => Magnitude::Kilo,
            y if y < GIGA => Magnitude::Mega,
            _ => Magnitude::Giga,
        }
    }

    pub fn divisor(self) -> f64 {
        match self {
            Magnitude::Unit => 1.0,
            Magnitude::Kilo => KILO,
            Magnitude::Mega => MEGA,
            Magnitude::Giga => GIGA,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Magnitude::Unit => "",
            Magnitude::Kilo => "K",
            Magnitude::Mega => "M",
            Magnitude::Giga => "G",
        }
    }
}

/// Human form of a value: `1.5 M`, `12.0 K`, `3.25`
pub fn format_magnitude(val: f64) -> String {
    if val > TERA {
        format!("{:.1} T", val / TERA)
    } else if val > GIGA {
        format!("{:.1} G", val / GIGA)
    } else if val > MEGA {
        format!("{:.1} M", val / MEGA)
    } else if val > KILO {
        format!("{:.1} K", val / KILO)
    } else {
        format!("{val:.2}")
    }
}

/// Picks the label units from the current `xmax`/`ymax`.
pub fn choose_units(graph: &mut Graph) {
    graph.time_unit = TimeUnit::for_span(graph.xmax);
    graph.magnitude = Magnitude::for_ymax(graph.ymax);
}

/// Sets each point's pixel coordinates and the graph's display units.
pub fn normalize(series: &mut Series, graph: &mut Graph) {
    let pps = graph.pixels_per_sec();
    let ppu = graph.pixels_per_unit();
    choose_units(graph);

    let offset = graph.data_begin as i64;
    tracing::trace!(
        xmax = graph.xmax,
        ymax = graph.ymax,
        pps,
        ppu,
        offset,
        series = %series.label,
        "normalize"
    );
    for p in series.points_mut() {
        p.x = ((p.timestamp as i64 - offset) as f64 * pps).round() as i32;
        p.y = (p.rate * ppu).round() as i32;
    }
}
