/*!
Scripted DeviceQuery for tests without real devices

Every target gets its own monotonically increasing counter. Polls can be
slowed down (fixed or random delay), made to fail, or held behind a gate
so a test can act while a round is in flight.
*/

use parking_lot::{Condvar, Mutex};
use rand::Rng;
use rtg_kernel::{DeviceQuery, PollError, Target, TargetKey};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub enum Delay {
    None,
    Fixed(Duration),
    /// Uniform random delay in `[min, max]`
    Random(Duration, Duration),
}

#[derive(Default)]
struct Gate {
    closed: bool,
}

#[derive(Default)]
struct Progress {
    started: usize,
    completed: usize,
    order: Vec<TargetKey>,
}

pub struct ScriptedQuery {
    step: u64,
    delay: Mutex<Delay>,
    counters: Mutex<HashMap<TargetKey, u64>>,
    failing: Mutex<HashSet<TargetKey>>,
    gate: Mutex<Gate>,
    gate_cv: Condvar,
    progress: Mutex<Progress>,
    progress_cv: Condvar,
}

impl ScriptedQuery {
    /// Counters grow by `step` on every poll.
    pub fn new(step: u64) -> Self {
        Self {
            step,
            delay: Mutex::new(Delay::None),
            counters: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            gate: Mutex::new(Gate::default()),
            gate_cv: Condvar::new(),
            progress: Mutex::new(Progress::default()),
            progress_cv: Condvar::new(),
        }
    }

    pub fn with_delay(self, delay: Delay) -> Self {
        *self.delay.lock() = delay;
        self
    }

    pub fn fail_target(&self, key: TargetKey) {
        self.failing.lock().insert(key);
    }

    pub fn heal_target(&self, key: &TargetKey) {
        self.failing.lock().remove(key);
    }

    /// Polls block once started until [`ScriptedQuery::release`].
    pub fn hold(&self) {
        self.gate.lock().closed = true;
    }

    pub fn release(&self) {
        self.gate.lock().closed = false;
        self.gate_cv.notify_all();
    }

    pub fn started(&self) -> usize {
        self.progress.lock().started
    }

    pub fn completed(&self) -> usize {
        self.progress.lock().completed
    }

    /// Keys in completion order.
    pub fn completion_order(&self) -> Vec<TargetKey> {
        self.progress.lock().order.clone()
    }

    /// Waits until at least `n` polls have started; false on timeout.
    pub fn wait_started(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut progress = self.progress.lock();
        while progress.started < n {
            if self.progress_cv.wait_until(&mut progress, deadline).timed_out() {
                return progress.started >= n;
            }
        }
        true
    }

    fn pause(&self) {
        let delay = *self.delay.lock();
        let d = match delay {
            Delay::None => return,
            Delay::Fixed(d) => d,
            Delay::Random(min, max) if max > min => rand::rng().random_range(min..=max),
            Delay::Random(min, _) => min,
        };
        std::thread::sleep(d);
    }
}

impl DeviceQuery for ScriptedQuery {
    fn poll(&self, target: &Target) -> Result<u64, PollError> {
        let key = target.key();
        {
            self.progress.lock().started += 1;
            self.progress_cv.notify_all();
        }

        {
            let mut gate = self.gate.lock();
            while gate.closed {
                self.gate_cv.wait(&mut gate);
            }
        }
        self.pause();

        let result = if self.failing.lock().contains(&key) {
            Err(PollError::Unreachable(target.host.clone()))
        } else {
            let mut counters = self.counters.lock();
            let counter = counters.entry(key.clone()).or_insert(0);
            *counter += self.step;
            Ok(*counter)
        };

        let mut progress = self.progress.lock();
        progress.completed += 1;
        progress.order.push(key);
        self.progress_cv.notify_all();
        result
    }
}
