/**
 * CHART - Assemblage d'un graphe complet à partir du store
 *
 * RÔLE :
 * Transforme une requête (groupes × interfaces, intervalle, mode) en un
 * `Chart` : coordonnées pixel de chaque ligne, stats, unités, graduations
 * et légendes. Le dessin lui-même est laissé au `Renderer`.
 *
 * FONCTIONNEMENT :
 * 1. populate + calcul des taux pour TOUTES les séries (ymax global)
 * 2. agrégation optionnelle, par groupe
 * 3. normalisation de chaque ligne avec le ymax final
 * 4. percentile sur la première ligne de chaque groupe
 * 5. graduations, légendes, couleurs
 */

use crate::aggregate::aggregate;
use crate::axis::{self, Color, Tick};
use crate::graph::{Geometry, Graph};
use crate::normalize::{choose_units, normalize, Magnitude, TimeUnit};
use crate::percentile::{check_rank, nth_percentile, PercentileError};
use crate::populate::populate;
use crate::rate::{compute_rate, compute_total, CounterEncoding, RateParams};
use crate::series::{RateStats, Series};
use rtg_kernel::{RtgConfig, SampleStore, StoreError, TargetKey};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("invalid chart request: {0}")]
    InvalidRequest(String),
    #[error("chart request parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Percentile(#[from] PercentileError),
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How values are plotted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartMode {
    /// Per-second derivative of the counters
    #[default]
    Rate,
    /// Stored values as-is (`counter * factor`)
    Gauge,
    /// Like gauge, drawn as bars
    Impulses,
}

/// One chart to build. Lines are every `group` × `id` combination,
/// group-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartRequest {
    pub groups: Vec<String>,
    pub ids: Vec<u32>,
    pub begin: u64,
    pub end: u64,
    pub factor: f64,
    pub mode: ChartMode,
    pub encoding: CounterEncoding,
    /// Sum the lines of each group into one
    pub aggregate: bool,
    pub percentile: Option<f64>,
    pub scale_x: bool,
    /// Pinned y ceiling
    pub ymax: Option<f64>,
    pub units: String,
    pub filled: bool,
    pub geometry: Geometry,
    pub output: Option<PathBuf>,
}

impl Default for ChartRequest {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            ids: Vec::new(),
            begin: 0,
            end: 0,
            factor: 1.0,
            mode: ChartMode::Rate,
            encoding: CounterEncoding::Cumulative,
            aggregate: false,
            percentile: None,
            scale_x: false,
            ymax: None,
            units: "bps".into(),
            filled: false,
            geometry: Geometry::default(),
            output: None,
        }
    }
}

impl ChartRequest {
    pub fn validate(&self) -> Result<(), ChartError> {
        let invalid = |msg: &str| Err(ChartError::InvalidRequest(msg.into()));
        if self.groups.is_empty() {
            return invalid("at least one group is required");
        }
        if self.ids.is_empty() {
            return invalid("at least one interface id is required");
        }
        if self.end <= self.begin {
            return invalid("end must be after begin");
        }
        if !self.factor.is_finite() || self.factor <= 0.0 {
            return invalid("factor must be a positive number");
        }
        if matches!(self.ymax, Some(y) if y.is_nan() || y <= 0.0) {
            return invalid("a pinned ymax must be positive");
        }
        if self.geometry.xplot == 0 || self.geometry.yplot == 0 {
            return invalid("plot area must not be empty");
        }
        if let Some(n) = self.percentile {
            check_rank(n)?;
        }
        Ok(())
    }

    pub fn from_toml(txt: &str) -> Result<Self, ChartError> {
        let req: Self = toml::from_str(txt)?;
        req.validate()?;
        Ok(req)
    }

    pub fn load(path: &Path) -> Result<Self, ChartError> {
        let txt = std::fs::read_to_string(path)?;
        Self::from_toml(&txt)
    }

    fn keys(&self) -> impl Iterator<Item = (usize, TargetKey)> + '_ {
        self.groups.iter().enumerate().flat_map(move |(g, group)| {
            self.ids.iter().map(move |&id| (g, TargetKey::new(group.clone(), id)))
        })
    }
}

/// One plotted line, in canvas pixels (origin bottom-left of the plot area)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub label: String,
    pub color: Color,
    pub filled: bool,
    pub points: Vec<[i32; 2]>,
    pub stats: RateStats,
    pub legend: String,
}

/// Horizontal reference line at the nth percentile of a group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileLine {
    pub group: String,
    pub rank: f64,
    pub rate: f64,
    pub y: i32,
    pub label: String,
}

/// Everything a renderer needs to draw one chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub width: u32,
    pub height: u32,
    pub geometry: Geometry,
    pub begin: u64,
    pub end: u64,
    pub data_begin: u64,
    pub data_end: u64,
    pub xmax: u64,
    pub ymax: f64,
    pub time_unit: TimeUnit,
    pub magnitude: Magnitude,
    pub units: String,
    pub axis_label: String,
    pub mode: ChartMode,
    pub datapoints: usize,
    pub lines: Vec<Line>,
    pub percentiles: Vec<PercentileLine>,
    pub x_ticks: Vec<Tick>,
    pub y_ticks: Vec<Tick>,
}

impl Chart {
    pub fn line(&self, label: &str) -> Option<&Line> {
        self.lines.iter().find(|l| l.label == label)
    }
}

struct Plotted {
    series: Series,
    stats: RateStats,
}

/// Builds a chart from stored samples.
pub fn build_chart(store: &dyn SampleStore, req: &ChartRequest, cfg: &RtgConfig) -> Result<Chart, ChartError> {
    req.validate()?;

    let mut graph = Graph::new(req.begin, req.end, req.geometry, req.units.clone()).with_scale_x(req.scale_x);
    if let Some(ymax) = req.ymax {
        graph = graph.with_fixed_ymax(ymax);
    }
    let params = RateParams::from_config(cfg, req.factor, req.encoding);
    let headroom = req.mode != ChartMode::Rate;

    // Rates for every series before any normalization: ymax must be global
    let mut groups: Vec<Vec<Plotted>> = req.groups.iter().map(|_| Vec::new()).collect();
    for (g, key) in req.keys() {
        let mut series = populate(store, &key, &mut graph)?;
        let stats = match req.mode {
            ChartMode::Rate => compute_rate(&mut series, &params),
            ChartMode::Gauge | ChartMode::Impulses => compute_total(&mut series, req.factor),
        };
        graph.offer_max(stats.max, headroom);
        groups[g].push(Plotted { series, stats });
    }
    graph.settle_range();
    debug!(
        xmax = graph.xmax,
        ymax = graph.ymax,
        datapoints = graph.datapoints,
        "series populated"
    );

    if req.aggregate {
        for (group, lines) in req.groups.iter().zip(groups.iter_mut()) {
            for line in lines.iter_mut() {
                normalize(&mut line.series, &mut graph);
            }
            let mut rest = std::mem::take(lines).into_iter();
            if let Some(mut base) = rest.next() {
                for addend in rest {
                    aggregate(
                        &mut base.series,
                        &addend.series,
                        &mut base.stats,
                        &addend.stats,
                        &mut graph,
                        headroom,
                    );
                }
                base.series.label = format!("{group}AGGR");
                lines.push(base);
            }
        }
    }

    // Final pixels with the final ymax
    choose_units(&mut graph);
    for line in groups.iter_mut().flatten() {
        normalize(&mut line.series, &mut graph);
    }

    let mut percentiles = Vec::new();
    if let Some(rank) = req.percentile {
        for (group, lines) in req.groups.iter().zip(&groups) {
            let Some(first) = lines.first() else { continue };
            match nth_percentile(&first.series, rank) {
                Ok(point) => percentiles.push(PercentileLine {
                    group: group.clone(),
                    rank,
                    rate: point.rate,
                    y: point.y,
                    label: format!("{rank}th Percentile"),
                }),
                Err(PercentileError::EmptySeries) => {
                    warn!(group = %group, "no data for percentile line");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    let mut lines = Vec::new();
    for (index, plotted) in groups.into_iter().flatten().enumerate() {
        // an empty series still takes its palette slot
        if plotted.series.is_empty() {
            debug!(label = %plotted.series.label, "no data, line skipped");
            continue;
        }
        let legend = axis::legend(&plotted.series.label, &plotted.stats, req.mode, &graph.units);
        lines.push(Line {
            color: axis::line_color(index),
            filled: req.filled && (req.aggregate || index == 0),
            points: plotted.series.coords().into_iter().map(|(x, y)| [x, y]).collect(),
            stats: plotted.stats,
            legend,
            label: plotted.series.label,
        });
    }

    info!(
        lines = lines.len(),
        percentiles = percentiles.len(),
        axis = %graph.axis_label(),
        "chart built"
    );

    Ok(Chart {
        width: graph.geometry.image_width(),
        height: graph.geometry.image_height(),
        geometry: graph.geometry,
        begin: graph.begin,
        end: graph.end,
        data_begin: graph.data_begin,
        data_end: graph.data_end,
        xmax: graph.xmax,
        ymax: graph.ymax,
        time_unit: graph.time_unit,
        magnitude: graph.magnitude,
        axis_label: graph.axis_label(),
        mode: req.mode,
        datapoints: graph.datapoints,
        x_ticks: axis::x_ticks(&graph),
        y_ticks: axis::y_ticks(&graph),
        units: graph.units,
        lines,
        percentiles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChartRequest {
        ChartRequest {
            groups: vec!["ifInOctets".into()],
            ids: vec![1, 2],
            begin: 0,
            end: 3_600,
            ..Default::default()
        }
    }

    #[test]
    fn test_request_from_toml() {
        let req = ChartRequest::from_toml(
            r#"
            groups = ["ifInOctets", "ifOutOctets"]
            ids = [3, 4]
            begin = 1000
            end = 4600
            factor = 8.0
            mode = "gauge"
            percentile = 95.0

            [geometry]
            xplot = 600
            "#,
        )
        .unwrap();
        assert_eq!(req.mode, ChartMode::Gauge);
        assert_eq!(req.encoding, CounterEncoding::Cumulative);
        assert_eq!(req.units, "bps");
        assert_eq!(req.geometry.xplot, 600);
        assert_eq!(req.geometry.yplot, crate::graph::YPLOT_AREA);
        assert_eq!(req.keys().count(), 4);
    }

    #[test]
    fn test_request_validation() {
        assert!(request().validate().is_ok());

        let no_groups = ChartRequest { groups: vec![], ..request() };
        assert!(matches!(no_groups.validate(), Err(ChartError::InvalidRequest(_))));

        let reversed = ChartRequest { begin: 10, end: 10, ..request() };
        assert!(matches!(reversed.validate(), Err(ChartError::InvalidRequest(_))));

        let bad_rank = ChartRequest { percentile: Some(0.0), ..request() };
        assert!(matches!(
            bad_rank.validate(),
            Err(ChartError::Percentile(PercentileError::OutOfRange(_)))
        ));

        let bad_ymax = ChartRequest { ymax: Some(0.0), ..request() };
        assert!(bad_ymax.validate().is_err());
    }

    #[test]
    fn test_malformed_request_is_a_parse_error() {
        let err = ChartRequest::from_toml("groups = 3").unwrap_err();
        assert!(matches!(err, ChartError::Parse(_)));
    }

    #[test]
    fn test_load_request_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.toml");
        std::fs::write(&path, "groups = [\"ifInOctets\"]\nids = [1]\nend = 60\n").unwrap();
        assert_eq!(ChartRequest::load(&path).unwrap().ids, vec![1]);

        let missing = ChartRequest::load(&dir.path().join("none.toml"));
        assert!(matches!(missing, Err(ChartError::Io(_))));
    }

    #[test]
    fn test_keys_are_group_major() {
        let req = ChartRequest {
            groups: vec!["a".into(), "b".into()],
            ids: vec![1, 2],
            ..request()
        };
        let keys: Vec<String> = req.keys().map(|(_, k)| k.to_string()).collect();
        assert_eq!(keys, vec!["a:1", "a:2", "b:1", "b:2"]);
    }
}
