//! # sim_app
//!
//! Loads a world description and runs it in real time.
//!
//! ## Startup Sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `sim_app=info`).
//! 2. Register built-in and math components, then the demo systems.
//! 3. Build the runner from the world description.
//! 4. Drive the runner on a blocking thread; Ctrl-C requests a stop.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use sim_component::{ComponentFactory, register_builtin_components};
use sim_runner::SimulationRunner;
use sim_system::{SystemManager, SystemRegistry};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("sim_app=info".parse()?)
                .add_directive("sim_runner=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.runner_config()?;
    let world = args.world()?;
    info!(world = %world.name, path = %args.world.display(), "world description loaded");

    let mut factory = ComponentFactory::new();
    register_builtin_components(&mut factory)?;
    sim_math::register_components(&mut factory)?;

    let mut registry = SystemRegistry::new();
    demo_systems::register_demo_systems(&mut registry)?;

    let runner = Arc::new(
        SimulationRunner::new(&world, SystemManager::new(registry), factory, config)
            .context("failed to create simulation runner")?,
    );
    runner.set_paused(args.paused);

    let stop = runner.stop_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, stopping");
                stop.stop();
            }
            Err(err) => warn!(error = %err, "failed to listen for ctrl-c"),
        }
    });

    let iterations = args.iterations;
    let completed = tokio::task::spawn_blocking({
        let runner = Arc::clone(&runner);
        move || runner.run(iterations)
    })
    .await?;

    if !completed && iterations > 0 {
        warn!(requested = iterations, ran = runner.iteration_count(), "run ended early");
    }
    info!(
        iterations = runner.iteration_count(),
        sim_time_ms = runner.sim_time().as_millis() as u64,
        real_time_ms = runner.real_time().as_millis() as u64,
        "simulation finished"
    );
    Ok(())
}
