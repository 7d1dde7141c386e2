//! Poll statistics shared by the coordinator and the workers
//!
//! Workers bump the counters lock-free; the coordinator takes a
//! [`StatsSnapshot`] after each round and logs it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct PollStats {
    rounds: AtomicU64,
    slow_rounds: AtomicU64,
    polls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    inserts: AtomicU64,
    store_errors: AtomicU64,
    last_round_ms: AtomicU64,
}

/// Point-in-time copy of [`PollStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub rounds: u64,
    pub slow_rounds: u64,
    pub polls: u64,
    pub successes: u64,
    pub failures: u64,
    pub inserts: u64,
    pub store_errors: u64,
    pub last_round: Duration,
}

impl PollStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_poll(&self, ok: bool) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        if ok {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_insert(&self, ok: bool) {
        let counter = if ok { &self.inserts } else { &self.store_errors };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_round(&self, elapsed: Duration, slow: bool) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
        if slow {
            self.slow_rounds.fetch_add(1, Ordering::Relaxed);
        }
        self.last_round_ms
            .store(elapsed.as_millis().min(u64::MAX as u128) as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rounds: self.rounds.load(Ordering::Relaxed),
            slow_rounds: self.slow_rounds.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            last_round: Duration::from_millis(self.last_round_ms.load(Ordering::Relaxed)),
        }
    }
}

impl StatsSnapshot {
    pub fn log_summary(&self) {
        tracing::info!(
            rounds = self.rounds,
            slow = self.slow_rounds,
            polls = self.polls,
            ok = self.successes,
            failed = self.failures,
            inserts = self.inserts,
            store_errors = self.store_errors,
            round_time = %humantime::format_duration(self.last_round),
            "poll statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = PollStats::new();
        stats.record_poll(true);
        stats.record_poll(false);
        stats.record_insert(true);
        stats.record_round(Duration::from_millis(1500), true);
        stats.record_round(Duration::from_millis(200), false);

        let snap = stats.snapshot();
        assert_eq!(snap.polls, 2);
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.inserts, 1);
        assert_eq!(snap.rounds, 2);
        assert_eq!(snap.slow_rounds, 1);
        assert_eq!(snap.last_round, Duration::from_millis(200));
    }
}
