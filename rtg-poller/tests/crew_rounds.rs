use crossbeam_channel::unbounded;
use rtg_devkit::{targets, Delay, PollHarness, ScriptedQuery};
use rtg_kernel::logging::Verbosity;
use rtg_kernel::ports::MemoryStore;
use rtg_kernel::{DeviceQuery, PollError, Sample, SampleStore, StoreError, Target, TargetKey};
use rtg_poller::{
    ControlIntent, ControlOutcome, ControlRouter, Crew, CrewConfig, Pacing, Registry, ReloadOutcome,
    TargetStatus,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn start_crew(h: &PollHarness, threads: usize, interval: Duration, store_enabled: bool) -> Crew {
    let registry = Registry::load(h.source.clone()).unwrap();
    let config = CrewConfig {
        threads,
        interval,
        store_enabled,
    };
    Crew::start(config, registry, h.query.clone(), h.store.clone()).unwrap()
}

#[test]
fn test_round_barrier_with_random_delays() {
    let h = PollHarness::new(12).with_query(
        ScriptedQuery::new(1_000).with_delay(Delay::Random(Duration::from_millis(1), Duration::from_millis(25))),
    );
    let crew = start_crew(&h, 4, Duration::from_secs(30), true);

    let report = crew.run_round();

    // run_round only returns after the drain: everything is already done
    assert_eq!(h.query.completed(), 12);
    let finished: HashSet<TargetKey> = h.query.completion_order().into_iter().collect();
    let expected: HashSet<TargetKey> = (1..=12).map(|id| TargetKey::new("ifInOctets", id)).collect();
    assert_eq!(finished, expected);
    assert_eq!(report.jobs, 12);
    assert!(matches!(report.pacing, Pacing::Sleep(_)));

    let state = crew.handle().state();
    assert_eq!(state.work_count, 0);
    assert_eq!(state.drain_events, 1);
    assert!(!state.in_round);
    h.assert_samples_per_target(12, 1).unwrap();

    crew.shutdown().unwrap();
    assert!(h.store.is_closed());
}

#[test]
fn test_each_round_drains_exactly_once() {
    let h = PollHarness::new(9).with_query(
        ScriptedQuery::new(1).with_delay(Delay::Random(Duration::ZERO, Duration::from_millis(10))),
    );
    let crew = start_crew(&h, 3, Duration::from_secs(30), false);

    for round in 1..=4u64 {
        let report = crew.run_round();
        assert_eq!(report.round, round);
        assert_eq!(h.query.completed(), 9 * round as usize);
        assert_eq!(crew.handle().state().drain_events, round);
    }

    let stats = crew.shutdown().unwrap();
    assert_eq!(stats.rounds, 4);
    assert_eq!(stats.polls, 36);
    assert_eq!(stats.inserts, 0, "store disabled");
    assert!(h.store.is_empty());
}

#[test]
fn test_reload_mid_round_is_deferred() {
    let h = PollHarness::new(4);
    let crew = start_crew(&h, 2, Duration::from_secs(30), false);
    let handle = crew.handle();
    h.query.hold();

    std::thread::scope(|s| {
        let round = s.spawn(|| crew.run_round());

        assert!(h.query.wait_started(2, Duration::from_secs(5)));
        h.source.replace(targets("ifInOctets", 9));
        assert_eq!(handle.request_reload(), ReloadOutcome::Deferred);
        assert!(handle.state().reload_pending);
        assert_eq!(handle.registry_len(), 4);

        h.query.release();
        let report = round.join().unwrap();
        assert_eq!(report.jobs, 4);
        assert_eq!(report.reload, Some(ReloadOutcome::Applied(9)));
    });

    assert_eq!(h.query.completed(), 4);
    assert!(!handle.state().reload_pending);
    assert_eq!(crew.run_round().jobs, 9);
    crew.shutdown().unwrap();
}

#[test]
fn test_reload_between_rounds_applies_immediately() {
    let h = PollHarness::new(3);
    let crew = start_crew(&h, 2, Duration::from_secs(30), false);

    h.source.replace(targets("ifInOctets", 5));
    assert_eq!(crew.handle().request_reload(), ReloadOutcome::Applied(5));
    assert_eq!(crew.run_round().jobs, 5);

    h.source.break_source(true);
    assert!(matches!(crew.handle().request_reload(), ReloadOutcome::Failed(_)));
    assert_eq!(crew.run_round().jobs, 5);
    crew.shutdown().unwrap();
}

#[test]
fn test_slow_round_skips_sleep() {
    let h = PollHarness::new(2)
        .with_query(ScriptedQuery::new(1).with_delay(Delay::Fixed(Duration::from_millis(40))));
    let crew = start_crew(&h, 2, Duration::from_millis(10), false);

    let report = crew.run_round();
    assert_eq!(report.pacing, Pacing::Slow);
    assert!(report.elapsed >= Duration::from_millis(40));

    let stats = crew.shutdown().unwrap();
    assert_eq!(stats.slow_rounds, 1);
}

#[test]
fn test_run_forever_stops_on_terminate() {
    let h = PollHarness::new(2);
    let crew = start_crew(&h, 2, Duration::from_secs(3600), false);
    let (tx, rx) = unbounded();
    tx.send(()).unwrap();

    // the pending stop interrupts the hour-long sleep after the first round
    assert_eq!(crew.run_forever(&rx), 1);
    crew.shutdown().unwrap();
}

#[test]
fn test_poll_failure_is_contained() {
    let h = PollHarness::new(5);
    let bad = TargetKey::new("ifInOctets", 3);
    h.query.fail_target(bad.clone());
    let crew = start_crew(&h, 2, Duration::from_secs(30), true);

    let report = crew.run_round();
    assert_eq!(report.jobs, 5);

    let stats = crew.stats();
    assert_eq!(stats.polls, 5);
    assert_eq!(stats.successes, 4);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.inserts, 4);
    assert_eq!(h.samples_for(&bad), 0);
    assert_eq!(h.samples_for(&TargetKey::new("ifInOctets", 4)), 1);

    let status = crew.handle().with_registry(|r| r.find(&bad).map(|s| s.status()));
    assert!(matches!(status, Some(TargetStatus::Failed { .. })));
    crew.shutdown().unwrap();
}

#[test]
fn test_control_router_intents() {
    let h = PollHarness::new(3);
    let crew = start_crew(&h, 1, Duration::from_secs(30), false);
    let (tx, rx) = unbounded();
    let router = ControlRouter::new(crew.handle(), Verbosity::detached(1), tx);

    assert_eq!(router.handle(ControlIntent::IncreaseVerbosity), ControlOutcome::Verbosity(2));
    assert_eq!(router.handle(ControlIntent::DecreaseVerbosity), ControlOutcome::Verbosity(1));
    assert_eq!(router.handle(ControlIntent::DecreaseVerbosity), ControlOutcome::Verbosity(0));
    assert_eq!(router.handle(ControlIntent::DecreaseVerbosity), ControlOutcome::Verbosity(0));

    h.source.replace(targets("ifInOctets", 6));
    assert_eq!(
        router.handle(ControlIntent::ReloadTargets),
        ControlOutcome::Reload(ReloadOutcome::Applied(6))
    );

    assert_eq!(router.handle(ControlIntent::Terminate), ControlOutcome::Terminating);
    assert_eq!(router.handle(ControlIntent::Terminate), ControlOutcome::Terminating);
    assert_eq!(rx.try_iter().count(), 2);
    crew.shutdown().unwrap();
}

/// Panics on one target, delegates the rest.
struct PanicOn {
    id: u32,
    inner: ScriptedQuery,
}

impl DeviceQuery for PanicOn {
    fn poll(&self, target: &Target) -> Result<u64, PollError> {
        if target.id == self.id {
            panic!("driver bug on {}", target.key());
        }
        self.inner.poll(target)
    }
}

#[test]
fn test_panicking_poll_still_completes_round() {
    let h = PollHarness::new(3);
    let registry = Registry::load(h.source.clone()).unwrap();
    let config = CrewConfig {
        threads: 2,
        interval: Duration::from_secs(30),
        store_enabled: true,
    };
    let query = Arc::new(PanicOn {
        id: 2,
        inner: ScriptedQuery::new(1),
    });
    let crew = Crew::start(config, registry, query, h.store.clone()).unwrap();

    let (tx, rx) = unbounded();
    std::thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..2 {
                let _ = tx.send(crew.run_round());
            }
        });
        for _ in 0..2 {
            let report = rx.recv_timeout(Duration::from_secs(5)).expect("round stuck on a panicking poll");
            assert_eq!(report.jobs, 3);
        }
    });

    let stats = crew.stats();
    assert_eq!(stats.polls, 6);
    assert_eq!(stats.successes, 4);
    assert_eq!(stats.failures, 2);

    let bad = TargetKey::new("ifInOctets", 2);
    let status = crew.handle().with_registry(|r| r.find(&bad).map(|s| s.status()));
    assert!(matches!(status, Some(TargetStatus::Failed { reason, .. }) if reason.contains("driver bug")));
    assert_eq!(h.samples_for(&TargetKey::new("ifInOctets", 3)), 2);
    crew.shutdown().unwrap();
}

/// Memory store whose flush takes a while, like a large JSON rewrite.
struct SlowFlush {
    inner: MemoryStore,
    delay: Duration,
}

impl SampleStore for SlowFlush {
    fn append(&self, key: &TargetKey, counter: u64, timestamp: u64) -> Result<(), StoreError> {
        self.inner.append(key, counter, timestamp)
    }

    fn read_range(&self, key: &TargetKey, begin: u64, end: u64) -> Result<Vec<Sample>, StoreError> {
        self.inner.read_range(key, begin, end)
    }

    fn read_latest(&self, key: &TargetKey) -> Result<Option<Sample>, StoreError> {
        self.inner.read_latest(key)
    }

    fn flush(&self) -> Result<(), StoreError> {
        std::thread::sleep(self.delay);
        Ok(())
    }
}

#[test]
fn test_store_flush_counts_toward_round_time() {
    let h = PollHarness::new(2);
    let registry = Registry::load(h.source.clone()).unwrap();
    let config = CrewConfig {
        threads: 2,
        interval: Duration::from_millis(20),
        store_enabled: true,
    };
    let store = Arc::new(SlowFlush {
        inner: MemoryStore::new(),
        delay: Duration::from_millis(50),
    });
    let crew = Crew::start(config, registry, h.query.clone(), store).unwrap();

    let report = crew.run_round();
    assert!(report.elapsed >= Duration::from_millis(50));
    assert_eq!(report.pacing, Pacing::Slow);
    assert_eq!(crew.shutdown().unwrap().slow_rounds, 1);
}
