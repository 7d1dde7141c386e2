/*!
Fixtures: targets, target sources and sample series for tests
*/

use parking_lot::Mutex;
use rtg_kernel::targets::TargetError;
use rtg_kernel::{Sample, SampleStore, Target, TargetKey, TargetSource};

pub fn target(group: &str, id: u32) -> Target {
    Target {
        host: format!("device-{id}.lan"),
        community: "public".into(),
        oid: format!("ifHCInOctets.{id}"),
        group: group.into(),
        id,
    }
}

/// `n` targets in one group, ids `1..=n`.
pub fn targets(group: &str, n: u32) -> Vec<Target> {
    (1..=n).map(|id| target(group, id)).collect()
}

/// In-memory target source whose content tests can swap between loads.
#[derive(Default)]
pub struct SwappableTargets {
    targets: Mutex<Vec<Target>>,
    broken: Mutex<bool>,
    loads: Mutex<usize>,
}

impl SwappableTargets {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets: Mutex::new(targets),
            ..Default::default()
        }
    }

    pub fn replace(&self, targets: Vec<Target>) {
        *self.targets.lock() = targets;
    }

    /// Next loads fail as if the file were unreadable.
    pub fn break_source(&self, broken: bool) {
        *self.broken.lock() = broken;
    }

    pub fn loads(&self) -> usize {
        *self.loads.lock()
    }
}

impl TargetSource for SwappableTargets {
    fn load(&self) -> Result<Vec<Target>, TargetError> {
        *self.loads.lock() += 1;
        if *self.broken.lock() {
            return Err(TargetError::Read {
                path: "swappable".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "source broken"),
            });
        }
        Ok(self.targets.lock().clone())
    }

    fn describe(&self) -> String {
        "swappable targets".into()
    }
}

/// Cumulative counter samples: start at `start`, one every `step_secs`,
/// counter growing by `per_sample`.
pub fn cumulative(start: u64, step_secs: u64, per_sample: &[u64]) -> Vec<Sample> {
    let mut counter = 0;
    per_sample
        .iter()
        .enumerate()
        .map(|(i, inc)| {
            counter += inc;
            Sample::new(counter, start + i as u64 * step_secs)
        })
        .collect()
}

/// Samples from explicit `(timestamp, counter)` pairs.
pub fn samples(points: &[(u64, u64)]) -> Vec<Sample> {
    points.iter().map(|&(ts, counter)| Sample::new(counter, ts)).collect()
}

/// Loads samples into a store for one key.
pub fn seed(store: &dyn SampleStore, key: &TargetKey, samples: &[Sample]) -> anyhow::Result<()> {
    for s in samples {
        store.append(key, s.counter, s.timestamp)?;
    }
    Ok(())
}
