//! Logging setup with a verbosity level that can change at runtime.
//!
//! The level is an integer with a floor of 0; each step unlocks one more
//! tracing level. A change applies to the very next log statement.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, Registry};

pub const QUIET: u8 = 0;
pub const LOW: u8 = 1;
pub const HIGH: u8 = 2;
pub const DEBUG: u8 = 3;

type FilterHandle = reload::Handle<LevelFilter, Registry>;

/// Shared verbosity knob; cheap to clone.
#[derive(Clone)]
pub struct Verbosity {
    level: Arc<AtomicU8>,
    handle: Option<FilterHandle>,
}

pub fn level_filter(level: u8) -> LevelFilter {
    match level {
        QUIET => LevelFilter::WARN,
        LOW => LevelFilter::INFO,
        HIGH => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

impl Verbosity {
    /// A knob not wired to any subscriber (tests, embedding).
    pub fn detached(level: u8) -> Self {
        Self {
            level: Arc::new(AtomicU8::new(level)),
            handle: None,
        }
    }

    pub fn level(&self) -> u8 {
        self.level.load(Ordering::Acquire)
    }

    pub fn increase(&self) -> u8 {
        self.shift(|l| l.saturating_add(1))
    }

    /// Lowers the level, never below [`QUIET`].
    pub fn decrease(&self) -> u8 {
        self.shift(|l| l.saturating_sub(1))
    }

    /// Sets an absolute level; no-op when unchanged.
    pub fn set(&self, level: u8) -> u8 {
        if self.level() == level {
            return level;
        }
        self.shift(|_| level)
    }

    fn shift(&self, f: impl Fn(u8) -> u8) -> u8 {
        let prev = self
            .level
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |l| Some(f(l)))
            .unwrap_or_else(|l| l);
        let next = f(prev);
        if let Some(handle) = &self.handle {
            if let Err(e) = handle.modify(|filter| *filter = level_filter(next)) {
                eprintln!("[rtg] cannot update log filter: {e}");
            }
        }
        tracing::warn!(from = prev, to = next, "verbosity changed");
        next
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(level: u8) -> Result<Verbosity, tracing_subscriber::util::TryInitError> {
    let (filter, handle) = reload::Layer::new(level_filter(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_names(true))
        .try_init()?;

    Ok(Verbosity {
        level: Arc::new(AtomicU8::new(level)),
        handle: Some(handle),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrease_is_clamped_at_floor() {
        let v = Verbosity::detached(1);
        assert_eq!(v.decrease(), 0);
        assert_eq!(v.decrease(), 0);
        assert_eq!(v.level(), 0);
    }

    #[test]
    fn test_increase_is_shared_between_clones() {
        let v = Verbosity::detached(0);
        let other = v.clone();
        other.increase();
        other.increase();
        assert_eq!(v.level(), HIGH);
        assert_eq!(level_filter(v.level()), LevelFilter::DEBUG);
        assert_eq!(level_filter(9), LevelFilter::TRACE);
    }

    #[test]
    fn test_set_absolute_level() {
        let v = Verbosity::detached(0);
        assert_eq!(v.set(DEBUG), DEBUG);
        assert_eq!(v.set(DEBUG), DEBUG);
        assert_eq!(level_filter(v.level()), LevelFilter::TRACE);
    }
}
