//! Rendering output contract
//!
//! A renderer receives a fully built [`Chart`]: per line the ordered pixel
//! coordinates, stats and legend, plus units and ticks. Rasterization and
//! image encoding belong to the renderer.

use crate::chart::{Chart, ChartError};
use std::io::Write;

pub trait Renderer {
    fn render(&mut self, chart: &Chart) -> Result<(), ChartError>;
}

/// Writes the chart as one JSON document.
pub struct JsonRenderer<W: Write> {
    out: W,
    pretty: bool,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, pretty: false }
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn render(&mut self, chart: &Chart) -> Result<(), ChartError> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.out, chart)?;
        } else {
            serde_json::to_writer(&mut self.out, chart)?;
        }
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
