use anyhow::{Context, Result};
use clap::Parser;
use plasma_pic::{Config, Snapshot};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(version, about = "2D electrostatic particle-in-cell plasma simulation")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: String,

    /// Override the number of steps from the config
    #[arg(short, long)]
    steps: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "plasma_pic=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_file(&args.config)?;
    config.print_summary();

    let mut sim = config
        .build_simulation()
        .context("Failed to configure simulation")?;
    let steps = args.steps.unwrap_or(config.simulation.steps);

    let mut sink = |snapshot: &Snapshot| -> Result<()> {
        let max_e = snapshot.ex.max_abs().max(snapshot.ey.max_abs());
        match &snapshot.energy {
            Some(e) => info!(
                step = snapshot.step,
                time = snapshot.time,
                max_e,
                kinetic = e.kinetic,
                field = e.field,
                total = e.total,
                "dump"
            ),
            None => info!(step = snapshot.step, time = snapshot.time, max_e, "dump"),
        }
        Ok(())
    };
    sim.run(steps, &mut sink)?;

    sim.finalize()?;
    if let Some(drift) = sim.energy_drift() {
        info!(
            initial = drift.initial_total,
            last = drift.last_total,
            relative_drift = drift.relative_drift,
            "energy summary"
        );
    }
    Ok(())
}
