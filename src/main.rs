use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use indicatif::{ProgressBar, ProgressStyle};
use spacelink_sim::{
    Ephemeris, RelaySimulator, Report, Result, SimulationConfig, input,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Relay protocol simulator: node -> relay -> ground station -> relay -> node.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Relay ephemeris CSV (Time, x (km), y (km), z (km))
    #[arg(long, env = "SPACELINK_EPHEMERIS")]
    ephemeris: PathBuf,

    /// Node position CSV
    #[arg(long, env = "SPACELINK_NODE")]
    node: PathBuf,

    /// Ground stations CSV (Name_of_Ground_Station, x (km), y (km), z (km))
    #[arg(long, env = "SPACELINK_STATIONS")]
    stations: PathBuf,

    /// Summary format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Worker threads for station runs (0 = one per core)
    #[arg(long, short, env = "SPACELINK_JOBS", default_value_t = 0)]
    jobs: usize,

    #[command(flatten)]
    config: SimulationConfig,
}

fn run(cli: Cli) -> Result<()> {
    cli.config.validate()?;

    if cli.jobs > 0
        && let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(cli.jobs)
            .build_global()
    {
        error!(%e, "Could not size the worker pool, using defaults");
    }

    let rows = input::load_ephemeris(&cli.ephemeris)?;
    let node = input::load_node(&cli.node)?;
    let stations = input::load_ground_stations(&cli.stations)?;

    let ephemeris = Ephemeris::prepare(&rows, node, &cli.config.coverage());
    info!(
        steps = ephemeris.len(),
        stations = stations.len(),
        "Inputs loaded"
    );

    let progress = ProgressBar::new(stations.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} stations {msg}") {
        progress.set_style(style);
    }

    let simulator = RelaySimulator::new(&ephemeris, &cli.config)?;
    let runs = simulator.run_all(&stations, |run| {
        progress.set_message(run.station.clone());
        progress.inc(1);
    });
    progress.finish_and_clear();

    let report = Report::from_runs(&runs);
    match cli.output {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    Ok(())
}

fn main() -> ExitCode {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
