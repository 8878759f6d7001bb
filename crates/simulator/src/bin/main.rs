//! leosim CLI
//!
//! Run a constellation scenario and write the per-node results table.
//!
//! # Example
//!
//! ```bash
//! # Run a scenario with its configured seed
//! leosim scenarios/turkey.toml
//!
//! # Override the seed and the output location
//! leosim scenarios/turkey.toml --seed 7 --output /tmp/run7.sca
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// LEO constellation network simulator
///
/// Deterministic discrete-event simulation: the same scenario and seed
/// produce byte-identical results.
#[derive(Parser, Debug)]
#[command(name = "leosim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario configuration file (TOML)
    scenario: PathBuf,

    /// Result file path. Defaults to the scenario name with a .sca suffix.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the scenario's random seed
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let scenario = match leosim_simulator::scenario::load(&args.scenario) {
        Ok(scenario) => scenario,
        Err(err) => {
            error!(scenario = %args.scenario.display(), "scenario error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let seed = args.seed.unwrap_or(scenario.seed);
    let output = args
        .output
        .unwrap_or_else(|| args.scenario.with_extension("sca"));

    info!(
        scenario = %args.scenario.display(),
        satellites = scenario.satellites.len(),
        ground_stations = scenario.ground_stations.len(),
        horizon_s = scenario.horizon.as_secs_f64(),
        seed,
        "starting simulation"
    );

    let report = leosim_simulator::run(&scenario, seed);

    if let Err(err) = leosim_simulator::report::write(&report, &output) {
        error!(output = %output.display(), "failed to write results: {err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
