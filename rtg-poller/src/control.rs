//! Control-signal router
//!
//! Process-control requests arrive as [`ControlIntent`]s, from OS signals
//! or directly from code. Each intent is handled independently:
//!
//! - `ReloadTargets`: applied now when no round runs, otherwise deferred to
//!   the round boundary
//! - verbosity intents: applied at once, floor at 0
//! - `Terminate`: forwarded to the round loop, which stops and tears down
//!
//! The router only takes the crew lock for the reload itself.

use crate::crew::{CrewHandle, ReloadOutcome};
use crossbeam_channel::Sender;
use rtg_kernel::logging::Verbosity;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::iterator::{Handle, Signals};
use std::os::raw::c_int;
use std::thread::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlIntent {
    ReloadTargets,
    IncreaseVerbosity,
    DecreaseVerbosity,
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    Reload(ReloadOutcome),
    Verbosity(u8),
    Terminating,
}

pub const HANDLED_SIGNALS: [c_int; 6] = [SIGHUP, SIGUSR1, SIGUSR2, SIGTERM, SIGINT, SIGQUIT];

/// HUP reloads, USR1/USR2 raise/lower verbosity, TERM/INT/QUIT terminate.
pub fn intent_for(signal: c_int) -> Option<ControlIntent> {
    match signal {
        SIGHUP => Some(ControlIntent::ReloadTargets),
        SIGUSR1 => Some(ControlIntent::IncreaseVerbosity),
        SIGUSR2 => Some(ControlIntent::DecreaseVerbosity),
        SIGTERM | SIGINT | SIGQUIT => Some(ControlIntent::Terminate),
        _ => None,
    }
}

#[derive(Clone)]
pub struct ControlRouter {
    crew: CrewHandle,
    verbosity: Verbosity,
    terminate: Sender<()>,
}

impl ControlRouter {
    pub fn new(crew: CrewHandle, verbosity: Verbosity, terminate: Sender<()>) -> Self {
        Self {
            crew,
            verbosity,
            terminate,
        }
    }

    pub fn handle(&self, intent: ControlIntent) -> ControlOutcome {
        match intent {
            ControlIntent::ReloadTargets => {
                let outcome = self.crew.request_reload();
                match &outcome {
                    ReloadOutcome::Applied(n) => info!(targets = n, "targets reloaded"),
                    ReloadOutcome::Deferred => info!("reload pending until round completes"),
                    ReloadOutcome::Failed(_) => {}
                }
                ControlOutcome::Reload(outcome)
            }
            ControlIntent::IncreaseVerbosity => ControlOutcome::Verbosity(self.verbosity.increase()),
            ControlIntent::DecreaseVerbosity => ControlOutcome::Verbosity(self.verbosity.decrease()),
            ControlIntent::Terminate => {
                if self.terminate.send(()).is_err() {
                    warn!("round loop already gone");
                }
                ControlOutcome::Terminating
            }
        }
    }

    /// Listens for process signals on a dedicated thread.
    /// The returned handle closes the listener.
    pub fn listen_signals(self) -> std::io::Result<(Handle, JoinHandle<()>)> {
        let mut signals = Signals::new(HANDLED_SIGNALS)?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("rtg-signals".into())
            .spawn(move || {
                for signal in signals.forever() {
                    let Some(intent) = intent_for(signal) else {
                        continue;
                    };
                    if intent == ControlIntent::Terminate {
                        info!(signal, "quitting on signal");
                    }
                    self.handle(intent);
                }
            })?;
        Ok((handle, thread))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_mapping() {
        assert_eq!(intent_for(SIGHUP), Some(ControlIntent::ReloadTargets));
        assert_eq!(intent_for(SIGUSR1), Some(ControlIntent::IncreaseVerbosity));
        assert_eq!(intent_for(SIGUSR2), Some(ControlIntent::DecreaseVerbosity));
        for sig in [SIGTERM, SIGINT, SIGQUIT] {
            assert_eq!(intent_for(sig), Some(ControlIntent::Terminate));
        }
        assert_eq!(intent_for(signal_hook::consts::signal::SIGCHLD), None);
    }
}
