/*!
Test Harness for RTG pollers

Bundles the doubles a polling test needs (store, scripted query, target
source) and offers assertions on what ended up in the store.
*/

use crate::fixtures::{targets, SwappableTargets};
use crate::query_stub::ScriptedQuery;
use anyhow::Result;
use rtg_kernel::ports::MemoryStore;
use rtg_kernel::{SampleStore, TargetKey};
use std::sync::Arc;

/// Installs a test-friendly subscriber once; later calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub struct PollHarness {
    pub store: Arc<MemoryStore>,
    pub query: Arc<ScriptedQuery>,
    pub source: Arc<SwappableTargets>,
}

impl PollHarness {
    /// `n` targets in group `ifInOctets`, counters growing by 1000 per poll.
    pub fn new(n: u32) -> Self {
        init_test_logging();
        Self {
            store: Arc::new(MemoryStore::new()),
            query: Arc::new(ScriptedQuery::new(1_000)),
            source: Arc::new(SwappableTargets::new(targets("ifInOctets", n))),
        }
    }

    pub fn with_query(mut self, query: ScriptedQuery) -> Self {
        self.query = Arc::new(query);
        self
    }

    pub fn samples_for(&self, key: &TargetKey) -> usize {
        self.store
            .read_range(key, 0, u64::MAX)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Every key in `1..=n` of group `ifInOctets` has exactly `expected` samples.
    pub fn assert_samples_per_target(&self, n: u32, expected: usize) -> Result<()> {
        for id in 1..=n {
            let key = TargetKey::new("ifInOctets", id);
            let actual = self.samples_for(&key);
            if actual != expected {
                anyhow::bail!("target {key}: expected {expected} samples, got {actual}");
            }
        }
        tracing::info!(targets = n, expected, "sample expectations verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtg_kernel::DeviceQuery;

    #[test]
    fn test_harness_basic_functionality() {
        let harness = PollHarness::new(3);
        let t = crate::fixtures::target("ifInOctets", 1);
        let counter = harness.query.poll(&t).unwrap();
        harness.store.append(&t.key(), counter, 60).unwrap();

        assert_eq!(harness.samples_for(&t.key()), 1);
        assert!(harness.assert_samples_per_target(3, 1).is_err());
    }
}
