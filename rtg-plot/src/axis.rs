//! Axis ticks, legends and line colors

use crate::chart::ChartMode;
use crate::graph::Graph;
use crate::normalize::{format_magnitude, TimeUnit};
use crate::series::RateStats;
use chrono::DateTime;
use serde::Serialize;

pub const XTICKS: u32 = 10;
pub const YTICKS: u32 = 5;
const LEGEND_NAME_WIDTH: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color { r, g, b }
}

/// Line colors, reused in order when there are more lines than entries
pub const PALETTE: [Color; 10] = [
    rgb(0, 235, 12),
    rgb(0, 94, 255),
    rgb(255, 0, 0),
    rgb(255, 255, 0),
    rgb(255, 185, 15),
    rgb(255, 52, 179),
    rgb(138, 43, 226),
    rgb(95, 158, 160),
    rgb(173, 255, 47),
    rgb(139, 121, 94),
];

pub fn line_color(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub pixel: i32,
    pub label: String,
}

pub fn x_ticks(graph: &Graph) -> Vec<Tick> {
    let xplot = graph.geometry.xplot;
    let step = (xplot / XTICKS).max(1) as usize;
    let pps = graph.pixels_per_sec();
    let format = match graph.time_unit {
        TimeUnit::Hour | TimeUnit::Day => "%-H:%M",
        TimeUnit::Week | TimeUnit::Month => "%m/%d",
    };

    (0..=xplot)
        .step_by(step)
        .map(|px| {
            let secs = if pps > 0.0 { (px as f64 / pps).round() as u64 } else { 0 };
            let at = i64::try_from(graph.xoffset + secs).unwrap_or(i64::MAX);
            let label = DateTime::from_timestamp(at, 0)
                .map(|t| t.format(format).to_string())
                .unwrap_or_default();
            Tick {
                pixel: px as i32,
                label,
            }
        })
        .collect()
}

/// Rate labels in the chosen magnitude; the zero line gets no label.
pub fn y_ticks(graph: &Graph) -> Vec<Tick> {
    let yplot = graph.geometry.yplot;
    let step = (yplot / YTICKS).max(1) as usize;
    let ppu = graph.pixels_per_unit();
    if ppu <= 0.0 {
        return Vec::new();
    }
    let divisor = graph.magnitude.divisor();
    let small = graph.ymax / divisor < 10.0;

    (0..=yplot)
        .step_by(step)
        .filter_map(|px| {
            let rate = px as f64 / ppu;
            if rate <= 0.0 {
                return None;
            }
            let value = rate / divisor;
            let label = if small {
                format!("{value:.1}")
            } else {
                format!("{value:.0}")
            };
            Some(Tick {
                pixel: px as i32,
                label,
            })
        })
        .collect()
}

/// One legend row, laid out per chart mode.
pub fn legend(label: &str, stats: &RateStats, mode: ChartMode, units: &str) -> String {
    let name: String = label.chars().take(LEGEND_NAME_WIDTH).collect();
    let (max, avg, cur) = (
        format_magnitude(stats.max),
        format_magnitude(stats.avg),
        format_magnitude(stats.cur),
    );
    match mode {
        ChartMode::Gauge => {
            format!("{name:<17} Max: {max:>7}{units} Avg: {avg:>7}{units} Cur: {cur:>7}{units}")
        }
        ChartMode::Impulses => format!("{name} Total: {:.0} Max: {:.1}", stats.total, stats.max),
        ChartMode::Rate => format!(
            "{name:<17} Max: {max:>7}{units} Avg: {avg:>7}{units} Cur: {cur:>7}{units} [{:>7}]",
            format_magnitude(stats.total)
        ),
    }
}
