//! Loading dock simulation CLI.
//!
//! Usage: dock-sim <number_of_trailers (3-10)> [options]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use dock_kernel::{
    validate_trailer_count, DockConfig, DockEvent, EventSink, MAX_TRAILERS, MIN_TRAILERS,
};
use dock_sim::SimulationRunner;

#[derive(Parser)]
#[command(name = "dock-sim")]
#[command(version)]
#[command(about = "Warehouse loading dock simulation")]
struct Cli {
    /// Number of trailers to simulate (3-10)
    #[arg(allow_negative_numbers = true)]
    trailers: String,

    /// Random seed for the delay sequence
    #[arg(long)]
    seed: Option<u64>,

    /// JSON file with a dock configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Length of one time unit in milliseconds
    #[arg(long)]
    time_unit_ms: Option<u64>,

    /// Forklift idle timeout in time units
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Print the run report as JSON at the end
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn usage() -> String {
    format!(
        "Usage: dock-sim <number_of_trailers ({}-{})>",
        MIN_TRAILERS, MAX_TRAILERS
    )
}

/// Why the trailer argument was rejected.
#[derive(Debug, PartialEq, Eq)]
enum TrailerArgError {
    /// Not an integer at all
    Usage,
    /// An integer outside the accepted range
    Range(String),
}

/// Parse the positional trailer count.
///
/// Integers too large for `i64` are still integers, so they get the range
/// error rather than the usage line.
fn parse_trailer_arg(raw: &str) -> std::result::Result<u32, TrailerArgError> {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TrailerArgError::Usage);
    }
    let requested = raw.parse::<i64>().unwrap_or(if raw.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    });
    validate_trailer_count(requested).map_err(|e| TrailerArgError::Range(e.to_string()))
}

fn load_config(path: Option<&Path>) -> Result<DockConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config {}", path.display()))
        }
        None => Ok(DockConfig::default()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => {
            println!("{}", usage());
            return ExitCode::FAILURE;
        }
    };

    let trailers = match parse_trailer_arg(&cli.trailers) {
        Ok(trailers) => trailers,
        Err(TrailerArgError::Usage) => {
            println!("{}", usage());
            return ExitCode::FAILURE;
        }
        Err(TrailerArgError::Range(message)) => {
            println!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .compact()
        .init();

    match run(cli, trailers).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, trailers: u32) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(ms) = cli.time_unit_ms {
        config.time_unit_ms = ms;
    }
    if let Some(units) = cli.idle_timeout {
        config.forklift_idle_timeout_units = units;
    }

    let runner = SimulationRunner::new(config);
    let report = runner.run(i64::from(trailers), cli.seed).await?;

    report.print_summary();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    EventSink::log_only().emit(DockEvent::ProgramTerminates);

    if !report.invariants_hold() {
        anyhow::bail!("run finished with {} invariant violations", report.violations().len());
    }
    Ok(())
}
