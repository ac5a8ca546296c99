//! CoreBank Simulator
//!
//! Workload harness driving the teller against the in-memory ledger store,
//! with an invariant sweep at the end of every run.

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod report;
mod scenario;

use scenario::Scenario;

/// CoreBank Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "CoreBank workload and invariant-check simulator")]
struct Args {
    /// Scenario to run (baseline, contention, transfer-storm)
    #[arg(short, long, default_value = "baseline")]
    scenario: String,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Number of times to repeat the scenario
    #[arg(long, default_value = "1")]
    rounds: u32,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let scenario = Scenario::load(&args.scenario)?;

    info!("Starting CoreBank Simulator");
    info!(scenario = %scenario.name, rounds = args.rounds, "Configured");

    let base_seed = args.seed.unwrap_or_else(rand::random);

    for round in 0..args.rounds {
        let report = scenario.run(base_seed.wrapping_add(round as u64)).await?;
        report.log();

        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        if !report.invariants.holds() {
            anyhow::bail!("invariant violation in scenario {}", scenario.name);
        }
    }

    info!("Simulation complete");
    Ok(())
}
