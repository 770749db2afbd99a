//! sim_runner - Run a data-driven combat encounter many times and report the results

mod encounter;
mod report;

use clap::Parser;
use encounter::EncounterConfig;
use sim_core::config::{load_toml, ConfigError};
use sim_core::{run_batch, run_sequential, SimError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Run a combat encounter many times and report the results")]
struct Cli {
    /// Encounter description (TOML)
    encounter: PathBuf,

    /// Override the number of iterations
    #[arg(short = 'n', long)]
    iterations: Option<u64>,

    /// Override the base seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Override the encounter length in seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Print the aggregate as JSON
    #[arg(long)]
    json: bool,

    /// Run every iteration on the main thread
    #[arg(long)]
    sequential: bool,

    /// Print the event log of a single iteration instead of running a batch
    #[arg(long, value_name = "ITERATION")]
    trace: Option<u64>,
}

#[derive(Error, Debug)]
enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "run failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), RunnerError> {
    let encounter: EncounterConfig = load_toml(&cli.encounter)?;
    let mut config = encounter.sim.clone();
    if let Some(iterations) = cli.iterations {
        config.iterations = iterations;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(secs) = cli.duration {
        config.duration = Duration::try_from_secs_f64(secs)
            .map_err(|e| ConfigError::ValidationError(format!("invalid duration {secs}: {e}")))?;
    }
    config.validate()?;

    if let Some(iteration) = cli.trace {
        config.record_events = true;
        let mut sim = encounter.build(&config)?;
        let metrics = sim.run_iteration(iteration)?;
        for event in sim.event_log() {
            println!("{event}");
        }
        if cli.json {
            println!("{}", metrics.to_json()?);
        }
        return Ok(());
    }

    info!(
        encounter = %cli.encounter.display(),
        iterations = config.iterations,
        seed = config.seed,
        "starting"
    );
    let started = Instant::now();
    let setup = |config: &sim_core::SimConfig| encounter.build(config);
    let aggregate = if cli.sequential {
        run_sequential(&config, setup)?
    } else {
        run_batch(&config, setup)?
    };
    info!(elapsed = ?started.elapsed(), "finished");

    if cli.json {
        println!("{}", aggregate.to_json()?);
    } else {
        print!("{}", report::render(&aggregate));
    }
    Ok(())
}
