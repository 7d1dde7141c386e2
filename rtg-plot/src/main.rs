//! RTG Plot - builds a rate chart from stored samples
//!
//! Usage: `rtg-plot [-vvv] [-c <config>] [-o <out.json>] <request.toml>`
//!
//! The chart (pixel coordinates, stats, units, ticks, legends) is written
//! as JSON to `-o`, to the request's `output`, or to stdout.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use rtg_kernel::{logging, open_store, RtgConfig};
use rtg_plot::{build_chart, ChartRequest, JsonRenderer, Renderer};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Builds a rate chart from stored samples
#[derive(Debug, PartialEq, Parser)]
#[command(name = "rtg-plot", version)]
struct Args {
    /// Specify configuration file
    #[arg(short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the chart to FILE instead of stdout
    #[arg(short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// Increase verbosity (repeatable)
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,

    /// Chart request (TOML)
    request: PathBuf,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::from(2) } else { ExitCode::SUCCESS };
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("rtg-plot: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let verbosity = logging::init(args.verbose).context("cannot install logger")?;

    let config = match &args.config {
        Some(path) => RtgConfig::load_from(path)?,
        None => RtgConfig::load()?.0,
    };
    verbosity.set(config.verbose.saturating_add(args.verbose));

    let request = ChartRequest::load(&args.request)
        .with_context(|| format!("cannot read chart request {}", args.request.display()))?;
    let store = open_store(&config.store).context("sample store unavailable")?;

    let chart = build_chart(store.as_ref(), &request, &config)?;

    match args.output.or(request.output) {
        Some(path) => {
            let file = File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
            JsonRenderer::new(BufWriter::new(file)).pretty().render(&chart)?;
            info!(output = %path.display(), lines = chart.lines.len(), "chart written");
        }
        None => JsonRenderer::new(io::stdout().lock()).render(&chart)?,
    }

    store.close().context("error closing store")?;
    Ok(())
}
