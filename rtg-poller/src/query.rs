//! Device query implementations
//!
//! - [`LocalInterfaceQuery`]: reads interface counters of this host via
//!   sysinfo. Targets name the counter as `<counter>:<interface>`, e.g.
//!   `rx_bytes:eth0`.
//! - [`TimeoutQuery`]: bounds any query so a hung device cannot stall the
//!   round drain.

use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use rtg_kernel::{DeviceQuery, PollError, Target, TargetKey};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::Networks;

/// Interface counters exposed by sysinfo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceCounter {
    RxBytes,
    TxBytes,
    RxPackets,
    TxPackets,
}

impl std::str::FromStr for InterfaceCounter {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rx_bytes" => Ok(Self::RxBytes),
            "tx_bytes" => Ok(Self::TxBytes),
            "rx_packets" => Ok(Self::RxPackets),
            "tx_packets" => Ok(Self::TxPackets),
            other => Err(PollError::Malformed(format!("unknown counter '{other}'"))),
        }
    }
}

/// Splits `rx_bytes:eth0` into counter and interface name
pub fn parse_oid(oid: &str) -> Result<(InterfaceCounter, &str), PollError> {
    let (counter, iface) = oid
        .split_once(':')
        .ok_or_else(|| PollError::Malformed(format!("oid '{oid}' is not <counter>:<interface>")))?;
    if iface.is_empty() {
        return Err(PollError::Malformed(format!("oid '{oid}' has no interface")));
    }
    Ok((counter.parse()?, iface))
}

pub struct LocalInterfaceQuery {
    hostname: String,
}

impl LocalInterfaceQuery {
    pub fn new() -> Self {
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();
        tracing::debug!(%hostname, "local interface query ready");
        Self { hostname }
    }

    pub fn is_local(&self, host: &str) -> bool {
        matches!(host, "localhost" | "127.0.0.1" | "::1") || host.eq_ignore_ascii_case(&self.hostname)
    }
}

impl Default for LocalInterfaceQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceQuery for LocalInterfaceQuery {
    fn poll(&self, target: &Target) -> Result<u64, PollError> {
        if !self.is_local(&target.host) {
            return Err(PollError::Unsupported(format!(
                "no transport for remote host {}",
                target.host
            )));
        }
        let (counter, iface) = parse_oid(&target.oid)?;

        let networks = Networks::new_with_refreshed_list();
        for (name, data) in &networks {
            if name != iface {
                continue;
            }
            return Ok(match counter {
                InterfaceCounter::RxBytes => data.total_received(),
                InterfaceCounter::TxBytes => data.total_transmitted(),
                InterfaceCounter::RxPackets => data.total_packets_received(),
                InterfaceCounter::TxPackets => data.total_packets_transmitted(),
            });
        }
        Err(PollError::Unreachable(format!("interface {iface} not found")))
    }
}

/// Wraps a query with a per-poll deadline.
///
/// The inner poll runs on a helper thread; past the deadline the result is
/// dropped and the poll counts as failed. A target has at most one helper
/// in flight: while a hung helper is still running, later polls of the same
/// target fail at once without spawning another.
pub struct TimeoutQuery {
    inner: Arc<dyn DeviceQuery>,
    limit: Duration,
    in_flight: Arc<Mutex<HashSet<TargetKey>>>,
}

/// Frees the target's slot when the helper is done with the device, even on panic.
struct InFlight {
    key: TargetKey,
    set: Arc<Mutex<HashSet<TargetKey>>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

impl TimeoutQuery {
    pub fn new(inner: Arc<dyn DeviceQuery>, limit: Duration) -> Self {
        Self {
            inner,
            limit,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Helpers still running, timed out or not.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl DeviceQuery for TimeoutQuery {
    fn poll(&self, target: &Target) -> Result<u64, PollError> {
        let key = target.key();
        if !self.in_flight.lock().insert(key.clone()) {
            tracing::debug!(target = %key, "previous poll still hung, skipping");
            return Err(PollError::Timeout(self.limit));
        }
        let guard = InFlight {
            key,
            set: self.in_flight.clone(),
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        let inner = self.inner.clone();
        let owned = target.clone();
        std::thread::Builder::new()
            .name("rtg-poll".into())
            .spawn(move || {
                let result = inner.poll(&owned);
                drop(guard);
                let _ = tx.send(result);
            })
            .map_err(|e| PollError::Unreachable(format!("cannot start poll: {e}")))?;

        match rx.recv_timeout(self.limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(PollError::Timeout(self.limit)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(PollError::Malformed("poll thread ended without a result".into()))
            }
        }
    }
}

/// Builds the query stack from the configured timeout.
pub fn build_query(timeout: Option<Duration>) -> Arc<dyn DeviceQuery> {
    let local: Arc<dyn DeviceQuery> = Arc::new(LocalInterfaceQuery::new());
    match timeout {
        Some(limit) => Arc::new(TimeoutQuery::new(local, limit)),
        None => local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtg_devkit::{target, Delay, ScriptedQuery};

    #[test]
    fn test_parse_oid() {
        assert_eq!(parse_oid("rx_bytes:eth0").unwrap(), (InterfaceCounter::RxBytes, "eth0"));
        assert_eq!(parse_oid("tx_packets:wlan0").unwrap(), (InterfaceCounter::TxPackets, "wlan0"));
        assert!(matches!(parse_oid("ifInOctets.3"), Err(PollError::Malformed(_))));
        assert!(matches!(parse_oid("rx_bytes:"), Err(PollError::Malformed(_))));
        assert!(matches!(parse_oid("octets:eth0"), Err(PollError::Malformed(_))));
    }

    #[test]
    fn test_remote_host_unsupported() {
        let query = LocalInterfaceQuery::new();
        let mut t = target("ifInOctets", 1);
        t.host = "switch-42.example.net".into();
        assert!(matches!(query.poll(&t), Err(PollError::Unsupported(_))));
    }

    #[test]
    fn test_missing_interface() {
        let query = LocalInterfaceQuery::new();
        let mut t = target("ifInOctets", 1);
        t.host = "localhost".into();
        t.oid = "rx_bytes:rtg-no-such-if0".into();
        assert!(matches!(query.poll(&t), Err(PollError::Unreachable(_))));
    }

    #[test]
    fn test_timeout_bounds_hung_poll() {
        let slow = Arc::new(ScriptedQuery::new(1).with_delay(Delay::Fixed(Duration::from_millis(500))));
        let query = TimeoutQuery::new(slow, Duration::from_millis(20));
        let result = query.poll(&target("ifInOctets", 1));
        assert_eq!(result, Err(PollError::Timeout(Duration::from_millis(20))));
    }

    #[test]
    fn test_timeout_passes_fast_result() {
        let fast = Arc::new(ScriptedQuery::new(7));
        let query = TimeoutQuery::new(fast, Duration::from_secs(5));
        assert_eq!(query.poll(&target("ifInOctets", 1)), Ok(7));
        assert_eq!(query.in_flight(), 0);
    }

    #[test]
    fn test_hung_target_keeps_one_helper() {
        let hung = Arc::new(ScriptedQuery::new(1));
        hung.hold();
        let limit = Duration::from_millis(5);
        let query = TimeoutQuery::new(hung.clone(), limit);
        let t = target("ifInOctets", 1);

        for _ in 0..50 {
            assert_eq!(query.poll(&t), Err(PollError::Timeout(limit)));
        }
        assert!(hung.wait_started(1, Duration::from_secs(5)));
        assert_eq!(hung.started(), 1, "only the first poll reached the device");
        assert_eq!(query.in_flight(), 1);

        // other targets are not blocked by the hung one
        assert_eq!(query.poll(&target("ifInOctets", 2)), Err(PollError::Timeout(limit)));
        assert_eq!(query.in_flight(), 2);

        hung.release();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while query.in_flight() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(query.in_flight(), 0);

        let patient = TimeoutQuery::new(hung.clone(), Duration::from_secs(5));
        assert_eq!(patient.poll(&t), Ok(2));
    }
}
