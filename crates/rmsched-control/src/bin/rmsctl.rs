//! rmsctl - Rate-monotonic scheduler control
//!
//! Reads protocol commands from stdin or a file and drives an in-process
//! scheduler with them.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

use anyhow::{Context, Result};
use clap::Parser;
use rmsched::{
    HandleResolver, NoopPriorityController, PlatformPriorityController, PlatformResolver,
    PriorityController, RmScheduler, SchedulerConfig,
};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "rmsctl")]
#[command(about = "Drive a rate-monotonic scheduler with R/Y/D/S commands")]
#[command(version)]
#[command(long_about = "
rmsctl runs a rate-monotonic scheduler in-process and applies one command per
input line:

  R, <pid>, <period ms>, <budget ms>.   register a process
  Y, <pid>.                             end the process's current job
  D, <pid>.                             deregister a process
  S                                     print the status report

Dispatched processes are moved into a real-time scheduling class, which needs
CAP_SYS_NICE. Use --no-priority to only track scheduling state.
")]
struct Cli {
    /// Read commands from a file instead of stdin
    #[arg(short, long, env = "RMSCTL_INPUT")]
    input: Option<PathBuf>,

    /// Scheduler configuration (JSON)
    #[arg(short, long, env = "RMSCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Do not change OS scheduling priorities
    #[arg(long)]
    no_priority: bool,

    /// Print a JSON session summary on exit
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rmsctl={0},rmsched={0},rmsched_control={0}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => rmsched_control::load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SchedulerConfig::default(),
    };

    let priority: Arc<dyn PriorityController> = if cli.no_priority {
        Arc::new(NoopPriorityController)
    } else {
        Arc::new(PlatformPriorityController::new())
    };
    let resolver: Arc<dyn HandleResolver> = Arc::new(PlatformResolver::new());

    let scheduler =
        RmScheduler::new(config, resolver, priority).context("failed to create scheduler")?;
    scheduler.start().context("failed to start scheduler")?;

    let stdout = io::stdout();
    let summary = match &cli.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            rmsched_control::run(&scheduler, BufReader::new(file), stdout.lock())?
        }
        None => rmsched_control::run(&scheduler, io::stdin().lock(), stdout.lock())?,
    };

    scheduler.stop();
    info!(
        "session finished: {} applied, {} malformed, {} rejected",
        summary.applied, summary.malformed, summary.rejected
    );
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}
