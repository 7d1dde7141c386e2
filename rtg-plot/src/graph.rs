//! Graph context: canvas geometry, time range and y ceiling shared by
//! every line of one chart.

use crate::normalize::{Magnitude, TimeUnit};
use serde::{Deserialize, Serialize};

pub const XPLOT_AREA: u32 = 500;
pub const YPLOT_AREA: u32 = 150;
pub const BORDER_T: u32 = 20;
pub const BORDER_B: u32 = 70;
pub const BORDER_L: u32 = 50;
pub const BORDER_R: u32 = 20;

/// Headroom so gauge lines do not trace the top of the plot
pub const GAUGE_HEADROOM: f64 = 1.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    pub xplot: u32,
    pub yplot: u32,
    pub border_t: u32,
    pub border_b: u32,
    pub border_l: u32,
    pub border_r: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            xplot: XPLOT_AREA,
            yplot: YPLOT_AREA,
            border_t: BORDER_T,
            border_b: BORDER_B,
            border_l: BORDER_L,
            border_r: BORDER_R,
        }
    }
}

impl Geometry {
    pub fn image_width(&self) -> u32 {
        self.xplot + self.border_l + self.border_r
    }

    pub fn image_height(&self) -> u32 {
        self.yplot + self.border_t + self.border_b
    }
}

#[derive(Debug, Clone)]
pub struct Graph {
    pub geometry: Geometry,
    /// Requested range, `(begin, end]`
    pub begin: u64,
    pub end: u64,
    /// Range actually covered by data when `scale_x` is on
    pub data_begin: u64,
    pub data_end: u64,
    pub scale_x: bool,
    pub xmax: u64,
    pub xoffset: u64,
    pub ymax: f64,
    /// Pinned ceiling (e.g. interface speed); never grows
    pub ymax_fixed: bool,
    pub time_unit: TimeUnit,
    pub magnitude: Magnitude,
    pub units: String,
    pub datapoints: usize,
}

impl Graph {
    pub fn new(begin: u64, end: u64, geometry: Geometry, units: impl Into<String>) -> Self {
        Self {
            geometry,
            begin,
            end,
            data_begin: end,
            data_end: 0,
            scale_x: false,
            xmax: 0,
            xoffset: 0,
            ymax: 0.0,
            ymax_fixed: false,
            time_unit: TimeUnit::Hour,
            magnitude: Magnitude::Unit,
            units: units.into(),
            datapoints: 0,
        }
    }

    pub fn with_scale_x(mut self, on: bool) -> Self {
        self.scale_x = on;
        self
    }

    pub fn with_fixed_ymax(mut self, ymax: f64) -> Self {
        self.ymax = ymax;
        self.ymax_fixed = true;
        self
    }

    /// Registers the time span of one populated series.
    pub fn observe(&mut self, first: u64, last: u64, count: usize) {
        self.datapoints += count;
        if self.scale_x {
            if first > self.begin && first <= self.data_begin {
                self.data_begin = first;
            }
            self.data_end = self.data_end.max(last);
        }
    }

    /// Fixes data range, `xmax` and `xoffset` once every series is populated.
    pub fn settle_range(&mut self) {
        if !self.scale_x {
            self.data_begin = self.begin;
            self.data_end = self.end;
        } else if self.data_end == 0 {
            self.data_end = self.end;
        }
        self.xmax = self.data_end.saturating_sub(self.data_begin);
        self.xoffset = self.data_begin;
    }

    /// Raises the y ceiling to a line's maximum unless it is pinned.
    pub fn offer_max(&mut self, max: f64, headroom: bool) {
        if self.ymax_fixed || max <= self.ymax {
            return;
        }
        self.ymax = if headroom { max * GAUGE_HEADROOM } else { max };
    }

    pub fn pixels_per_sec(&self) -> f64 {
        if self.xmax > 0 {
            self.geometry.xplot as f64 / self.xmax as f64
        } else {
            0.0
        }
    }

    pub fn pixels_per_unit(&self) -> f64 {
        if self.ymax > 0.0 {
            self.geometry.yplot as f64 / self.ymax
        } else {
            0.0
        }
    }

    /// Axis label, e.g. `Mbps`
    pub fn axis_label(&self) -> String {
        format!("{}{}", self.magnitude.prefix(), self.units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_without_scale_x() {
        let mut g = Graph::new(1_000, 4_600, Geometry::default(), "bps");
        g.observe(1_300, 4_000, 10);
        g.settle_range();
        assert_eq!((g.data_begin, g.data_end, g.xmax), (1_000, 4_600, 3_600));
    }

    #[test]
    fn test_range_with_scale_x() {
        let mut g = Graph::new(1_000, 10_000, Geometry::default(), "bps").with_scale_x(true);
        g.observe(1_600, 5_000, 5);
        g.observe(1_300, 4_000, 5);
        // fallback sample before the requested range does not move data_begin
        g.observe(900, 900, 1);
        g.settle_range();
        assert_eq!(g.data_begin, 1_300);
        assert_eq!(g.data_end, 5_000);
        assert_eq!(g.xmax, 3_700);
        assert_eq!(g.xoffset, 1_300);
        assert_eq!(g.datapoints, 11);
    }

    #[test]
    fn test_ymax_growth() {
        let mut g = Graph::new(0, 60, Geometry::default(), "bps");
        g.offer_max(100.0, false);
        g.offer_max(50.0, false);
        assert_eq!(g.ymax, 100.0);
        g.offer_max(200.0, true);
        assert!((g.ymax - 210.0).abs() < 1e-9);

        let mut pinned = Graph::new(0, 60, Geometry::default(), "bps").with_fixed_ymax(1e9);
        pinned.offer_max(5e9, false);
        assert_eq!(pinned.ymax, 1e9);
    }

    #[test]
    fn test_image_size() {
        let g = Geometry::default();
        assert_eq!(g.image_width(), 570);
        assert_eq!(g.image_height(), 240);
    }
}
