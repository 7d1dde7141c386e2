//! Round-based polling crew
//!
//! One coordinator (the caller of [`Crew::run_round`] / [`Crew::run_forever`])
//! and a fixed pool of worker threads share one lock and two conditions:
//!
//! - dispatch: under the lock, the registry is snapshotted, the outstanding
//!   job count is set to its size and the round generation is bumped, then
//!   `go` is broadcast
//! - workers claim targets one by one until the snapshot is exhausted,
//!   decrementing the job count after each poll and signalling `done`
//! - drain: the coordinator waits on `done` until the job count is zero,
//!   then applies a deferred reload and flushes the store, and only then
//!   sleeps out what is left of the interval
//!
//! A poll failure stays local to its target and still counts toward
//! round completion, including a poll that panics.

use crate::registry::{Registry, TargetSlot, TargetStatus};
use crate::stats::{PollStats, StatsSnapshot};
use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::{Condvar, Mutex};
use rtg_kernel::{DeviceQuery, RtgConfig, SampleStore, StoreError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone)]
pub struct CrewConfig {
    pub threads: usize,
    pub interval: Duration,
    /// false = poll without inserting
    pub store_enabled: bool,
}

impl From<&RtgConfig> for CrewConfig {
    fn from(cfg: &RtgConfig) -> Self {
        Self {
            threads: cfg.threads,
            interval: cfg.interval(),
            store_enabled: cfg.store.enabled,
        }
    }
}

/// Shared round state, only touched under the crew lock
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CrewState {
    pub work_count: usize,
    pub generation: u64,
    pub in_round: bool,
    pub reload_pending: bool,
    pub shutdown: bool,
    /// How many times a worker brought `work_count` down to zero
    pub drain_events: u64,
}

/// What to do after a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    Sleep(Duration),
    Slow,
}

/// Remaining time in the interval, or `Slow` when the round used it all.
pub fn pacing(interval: Duration, elapsed: Duration) -> Pacing {
    match interval.checked_sub(elapsed) {
        Some(rest) if !rest.is_zero() => Pacing::Sleep(rest),
        _ => Pacing::Slow,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Applied(usize),
    Deferred,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: u64,
    pub jobs: usize,
    pub elapsed: Duration,
    pub pacing: Pacing,
    /// Set when a deferred reload was applied at the end of this round
    pub reload: Option<ReloadOutcome>,
}

struct Inner {
    state: CrewState,
    registry: Registry,
}

struct Shared {
    inner: Mutex<Inner>,
    go: Condvar,
    done: Condvar,
    query: Arc<dyn DeviceQuery>,
    store: Arc<dyn SampleStore>,
    stats: Arc<PollStats>,
    config: CrewConfig,
}

/// Cloneable access to the crew state for the control router.
#[derive(Clone)]
pub struct CrewHandle {
    shared: Arc<Shared>,
}

pub struct Crew {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl Crew {
    /// Spawns the worker pool; workers park until the first dispatch.
    pub fn start(
        config: CrewConfig,
        registry: Registry,
        query: Arc<dyn DeviceQuery>,
        store: Arc<dyn SampleStore>,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: CrewState::default(),
                registry,
            }),
            go: Condvar::new(),
            done: Condvar::new(),
            query,
            store,
            stats: Arc::new(PollStats::new()),
            config,
        });

        info!(threads = shared.config.threads, "starting poll workers");
        let mut crew = Crew {
            shared,
            workers: Vec::new(),
        };
        for index in 0..crew.shared.config.threads.max(1) {
            let shared = crew.shared.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("rtg-worker-{index}"))
                .spawn(move || worker_loop(shared, index));
            match spawned {
                Ok(handle) => crew.workers.push(handle),
                Err(e) => {
                    crew.stop_workers();
                    return Err(e);
                }
            }
        }
        Ok(crew)
    }

    pub fn handle(&self) -> CrewHandle {
        CrewHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// One dispatch + drain. Returns once every job of the round is done.
    pub fn run_round(&self) -> RoundReport {
        let shared = &self.shared;
        let started = Instant::now();

        let (round, jobs) = {
            let mut inner = shared.inner.lock();
            let jobs = inner.registry.begin_round();
            inner.state.work_count = jobs;
            inner.state.in_round = true;
            inner.state.generation += 1;
            (inner.state.generation, jobs)
        };
        debug!(round, jobs, "queue ready, broadcasting go");
        shared.go.notify_all();

        let reload = {
            let mut inner = shared.inner.lock();
            while inner.state.work_count > 0 {
                shared.done.wait(&mut inner);
            }
            inner.registry.end_round();
            inner.state.in_round = false;

            if inner.state.reload_pending {
                inner.state.reload_pending = false;
                debug!("processing pending reload");
                Some(apply_reload(&mut inner.registry))
            } else {
                None
            }
        };

        // the flush is part of the round's cost
        if shared.config.store_enabled {
            if let Err(e) = shared.store.flush() {
                warn!("store flush failed: {e}");
            }
        }

        let elapsed = started.elapsed();
        let pacing = pacing(shared.config.interval, elapsed);
        shared.stats.record_round(elapsed, pacing == Pacing::Slow);

        info!(
            round,
            jobs,
            elapsed = %humantime::format_duration(elapsed),
            "poll round complete"
        );
        shared.stats.snapshot().log_summary();
        if pacing == Pacing::Slow {
            info!(round, interval = ?shared.config.interval, "slow round, starting next immediately");
        }

        RoundReport {
            round,
            jobs,
            elapsed,
            pacing,
            reload,
        }
    }

    /// Polls round after round until `stop` delivers a message.
    /// Returns the number of rounds completed.
    pub fn run_forever(&self, stop: &Receiver<()>) -> u64 {
        let mut rounds = 0;
        loop {
            let report = self.run_round();
            rounds += 1;

            match report.pacing {
                Pacing::Sleep(rest) => match stop.recv_timeout(rest) {
                    Ok(()) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => std::thread::sleep(rest),
                },
                Pacing::Slow => {
                    if stop.try_recv().is_ok() {
                        break;
                    }
                }
            }
        }
        info!(rounds, "poll loop stopped");
        rounds
    }

    /// Stops the workers after their current poll, then closes the store.
    pub fn shutdown(mut self) -> Result<StatsSnapshot, StoreError> {
        self.stop_workers();
        let stats = self.stats();
        self.shared.store.close()?;
        info!("sample store closed");
        Ok(stats)
    }

    fn stop_workers(&mut self) {
        self.shared.inner.lock().state.shutdown = true;
        self.shared.go.notify_all();
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "worker panicked");
            }
        }
    }
}

impl CrewHandle {
    pub fn state(&self) -> CrewState {
        self.shared.inner.lock().state
    }

    pub fn registry_len(&self) -> usize {
        self.shared.inner.lock().registry.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Reloads now when idle; during a round, defers to the round boundary.
    pub fn request_reload(&self) -> ReloadOutcome {
        let mut inner = self.shared.inner.lock();
        if inner.state.in_round {
            inner.state.reload_pending = true;
            debug!("round in progress, reload deferred");
            return ReloadOutcome::Deferred;
        }
        inner.state.reload_pending = false;
        apply_reload(&mut inner.registry)
    }

    /// Runs `f` on the target slots under the crew lock.
    pub fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        f(&self.shared.inner.lock().registry)
    }
}

fn apply_reload(registry: &mut Registry) -> ReloadOutcome {
    match registry.reload() {
        Ok(n) => ReloadOutcome::Applied(n),
        Err(e) => {
            error!("error updating target list, keeping current set: {e}");
            ReloadOutcome::Failed(e.to_string())
        }
    }
}

fn worker_loop(shared: Arc<Shared>, index: usize) {
    trace!(index, "worker ready");
    let mut seen = 0u64;
    loop {
        let slot = {
            let mut inner = shared.inner.lock();
            loop {
                if inner.state.shutdown {
                    trace!(index, "worker exiting");
                    return;
                }
                if inner.state.generation != seen {
                    match inner.registry.claim_next() {
                        Some(slot) => break slot,
                        None => seen = inner.state.generation,
                    }
                }
                shared.go.wait(&mut inner);
            }
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| poll_target(&shared, &slot))) {
            let reason = panic_reason(payload.as_ref());
            error!(target = %slot.target.key(), "poll panicked: {reason}");
            shared.stats.record_poll(false);
            slot.set_status(TargetStatus::Failed {
                reason: format!("poll panicked: {reason}"),
                at: Utc::now(),
            });
        }

        let mut inner = shared.inner.lock();
        inner.state.work_count -= 1;
        if inner.state.work_count == 0 {
            inner.state.drain_events += 1;
        }
        shared.done.notify_one();
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

fn poll_target(shared: &Shared, slot: &TargetSlot) {
    let target = &slot.target;
    let key = target.key();
    let at = Utc::now();

    match shared.query.poll(target) {
        Ok(counter) => {
            shared.stats.record_poll(true);
            trace!(target = %key, counter, "polled");
            slot.set_status(TargetStatus::Ok { counter, at });

            if shared.config.store_enabled {
                let timestamp = u64::try_from(at.timestamp()).unwrap_or(0);
                match shared.store.append(&key, counter, timestamp) {
                    Ok(()) => shared.stats.record_insert(true),
                    Err(e) => {
                        shared.stats.record_insert(false);
                        warn!(target = %key, "insert failed: {e}");
                    }
                }
            }
        }
        Err(e) => {
            shared.stats.record_poll(false);
            debug!(target = %key, host = %target.host, "poll failed: {e}");
            slot.set_status(TargetStatus::Failed {
                reason: e.to_string(),
                at,
            });
        }
    }
}
