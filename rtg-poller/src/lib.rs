//! RTG poller - round-based counter collection
//!
//! A fixed crew of worker threads polls every registered target once per
//! interval and appends the counters to the sample store:
//! - [`registry`]: target set with live reload
//! - [`crew`]: dispatch/drain barrier and interval pacing
//! - [`control`]: signal-driven reload, verbosity and terminate
//! - [`query`]: device query implementations and per-poll timeout
//! - [`pidfile`]: single-instance marker
//! - [`stats`]: round and poll counters

pub mod control;
pub mod crew;
pub mod pidfile;
pub mod query;
pub mod registry;
pub mod stats;

pub use control::{ControlIntent, ControlOutcome, ControlRouter};
pub use crew::{pacing, Crew, CrewConfig, CrewHandle, CrewState, Pacing, ReloadOutcome, RoundReport};
pub use pidfile::{PidFile, PidFileError};
pub use query::{build_query, LocalInterfaceQuery, TimeoutQuery};
pub use registry::{Registry, RegistryError, TargetSlot, TargetStatus};
pub use stats::{PollStats, StatsSnapshot};
