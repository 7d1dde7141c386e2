//! Rate series: raw samples with their derived rate and pixel position

use rtg_kernel::Sample;
use serde::Serialize;

/// One sample plus what the engine derives from it.
/// `x`/`y` are only meaningful after normalization against one graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatePoint {
    pub counter: u64,
    pub timestamp: u64,
    pub rate: f64,
    pub x: i32,
    pub y: i32,
}

impl From<Sample> for RatePoint {
    fn from(s: Sample) -> Self {
        Self {
            counter: s.counter,
            timestamp: s.timestamp,
            rate: 0.0,
            x: 0,
            y: 0,
        }
    }
}

/// Summary of a series, computed once per render
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RateStats {
    pub total: f64,
    pub max: f64,
    pub avg: f64,
    pub cur: f64,
}

/// Time-ordered points of one target over the query range
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub label: String,
    points: Vec<RatePoint>,
}

impl Series {
    pub fn new(label: impl Into<String>, samples: &[Sample]) -> Self {
        Self {
            label: label.into(),
            points: samples.iter().copied().map(RatePoint::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[RatePoint] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [RatePoint] {
        &mut self.points
    }

    pub fn first_timestamp(&self) -> Option<u64> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.points.last().map(|p| p.timestamp)
    }

    pub fn rates(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.rate).collect()
    }

    pub fn coords(&self) -> Vec<(i32, i32)> {
        self.points.iter().map(|p| (p.x, p.y)).collect()
    }
}
