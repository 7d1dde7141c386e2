//! Series population from the sample store

use crate::graph::Graph;
use crate::series::Series;
use rtg_kernel::{SampleStore, StoreError, TargetKey};

/// Reads `(graph.begin, graph.end]` for one target, falling back to the
/// latest known sample when the range is empty, and registers the data
/// span with the graph.
pub fn populate(store: &dyn SampleStore, key: &TargetKey, graph: &mut Graph) -> Result<Series, StoreError> {
    let samples = store.read_range_or_latest(key, graph.begin, graph.end)?;
    let series = Series::new(key.to_string(), &samples);

    if let (Some(first), Some(last)) = (series.first_timestamp(), series.last_timestamp()) {
        graph.observe(first, last, series.len());
    }
    tracing::debug!(target_key = %key, points = series.len(), "populated");
    Ok(series)
}
