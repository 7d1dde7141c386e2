/**
 * RTG PLOT - Moteur de courbes de débit
 *
 * RÔLE :
 * Convertit les historiques de compteurs du store en séries de débit
 * comparables, les agrège, en extrait des percentiles et les projette
 * sur un canevas pixel de taille fixe.
 *
 * PIPELINE :
 * store → populate → rate → aggregate (option) → normalize → percentile
 * (option) → Renderer
 */

pub mod aggregate;
pub mod axis;
pub mod chart;
pub mod graph;
pub mod normalize;
pub mod percentile;
pub mod populate;
pub mod rate;
pub mod render;
pub mod series;

pub use aggregate::aggregate;
pub use chart::{build_chart, Chart, ChartError, ChartMode, ChartRequest, Line, PercentileLine};
pub use graph::{Geometry, Graph};
pub use normalize::{normalize, Magnitude, TimeUnit};
pub use percentile::{nth_percentile, PercentileError};
pub use populate::populate;
pub use rate::{compute_rate, compute_total, CounterEncoding, RateParams};
pub use render::{JsonRenderer, Renderer};
pub use series::{RatePoint, RateStats, Series};
