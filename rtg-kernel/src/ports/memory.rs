use super::{SampleStore, StoreError};
use crate::models::{Sample, TargetKey};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};

/// Séries indexées par cible puis par timestamp (ordre garanti par le BTreeMap)
pub(crate) type SeriesMap = BTreeMap<TargetKey, BTreeMap<u64, u64>>;

/// Store entièrement en mémoire
#[derive(Default)]
pub struct MemoryStore {
    series: RwLock<SeriesMap>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_map(map: SeriesMap) -> Self {
        Self {
            series: RwLock::new(map),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn snapshot(&self) -> SeriesMap {
        self.series.read().clone()
    }

    /// Nombre total d'échantillons, toutes cibles confondues
    pub fn len(&self) -> usize {
        self.series.read().values().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl SampleStore for MemoryStore {
    fn append(&self, key: &TargetKey, counter: u64, timestamp: u64) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        let mut series = self.series.write();
        let samples = series.entry(key.clone()).or_default();
        if samples.contains_key(&timestamp) {
            return Err(StoreError::DuplicateTimestamp { key: key.clone(), timestamp });
        }
        samples.insert(timestamp, counter);
        Ok(())
    }

    fn read_range(&self, key: &TargetKey, begin: u64, end: u64) -> Result<Vec<Sample>, StoreError> {
        if end <= begin {
            return Ok(Vec::new());
        }
        let series = self.series.read();
        let Some(samples) = series.get(key) else {
            return Ok(Vec::new());
        };
        Ok(samples
            .range((Bound::Excluded(begin), Bound::Included(end)))
            .map(|(&ts, &counter)| Sample::new(counter, ts))
            .collect())
    }

    fn read_latest(&self, key: &TargetKey) -> Result<Option<Sample>, StoreError> {
        let series = self.series.read();
        Ok(series
            .get(key)
            .and_then(|s| s.iter().next_back())
            .map(|(&ts, &counter)| Sample::new(counter, ts)))
    }

    fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
