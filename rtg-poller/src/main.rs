//! RTG Poller - periodic counter collection daemon
//!
//! Usage: `rtg-poller [-dm] [-vvv] [-c <config>] -t <targets.yaml>`
//! - `-d` poll without inserting into the store
//! - `-m` allow several pollers at once (no pid file)
//! - `-v` raise verbosity, repeatable
//!
//! Signals: HUP reloads targets, USR1/USR2 raise/lower verbosity,
//! TERM/INT/QUIT stop the poller.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use rtg_kernel::ports::MemoryStore;
use rtg_kernel::{logging, open_store, RtgConfig, SampleStore, TargetFile};
use rtg_poller::{build_query, ControlRouter, Crew, CrewConfig, PidFile, Registry};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// RTG counter poller
#[derive(Debug, PartialEq, Parser)]
#[command(name = "rtg-poller", version)]
struct Args {
    /// Specify configuration file
    #[arg(short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Specify target file
    #[arg(short = 't', value_name = "FILE")]
    targets: PathBuf,

    /// Increase verbosity (repeatable)
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,

    /// Disable store inserts
    #[arg(short = 'd')]
    no_store: bool,

    /// Allow multiple instances
    #[arg(short = 'm')]
    allow_multiple: bool,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => return usage_exit(e),
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("rtg-poller: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// `--help`/`--version` exit 0, usage errors exit 2.
fn usage_exit(e: clap::Error) -> ExitCode {
    let _ = e.print();
    if e.use_stderr() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

fn run(args: Args) -> Result<()> {
    let verbosity = logging::init(args.verbose).context("cannot install logger")?;

    let (mut config, origin) = match &args.config {
        Some(path) => (RtgConfig::load_from(path)?, path.clone()),
        None => RtgConfig::load()?,
    };
    config.verbose = config.verbose.saturating_add(args.verbose);
    config.store.enabled &= !args.no_store;
    config.allow_multiple |= args.allow_multiple;
    verbosity.set(config.verbose);
    info!(config = %origin.display(), interval = config.interval_secs, threads = config.threads, "RTG poller starting");

    let _pid = if config.allow_multiple {
        None
    } else {
        Some(PidFile::acquire(&config.pid_file)?)
    };

    let source = Arc::new(TargetFile::new(&args.targets));
    let registry = Registry::load(source).context("error updating target list")?;

    let store: Arc<dyn SampleStore> = if config.store.enabled {
        open_store(&config.store).context("sample store unavailable")?
    } else {
        info!("store inserts disabled");
        Arc::new(MemoryStore::new())
    };

    let query = build_query(config.poll_timeout());
    let crew = Crew::start(CrewConfig::from(&config), registry, query, store)
        .context("cannot start poll workers")?;

    let (stop_tx, stop_rx) = crossbeam_channel::unbounded();
    let router = ControlRouter::new(crew.handle(), verbosity, stop_tx);
    let (signals, listener) = router.listen_signals().context("cannot install signal handlers")?;
    info!("RTG ready");

    crew.run_forever(&stop_rx);

    signals.close();
    if listener.join().is_err() {
        error!("signal listener panicked");
    }
    let stats = crew.shutdown().context("error closing store")?;
    stats.log_summary();
    Ok(())
}
