//! Command-line arguments and configuration loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use sim_runner::{RunnerConfig, WorldDescription};

#[derive(Debug, Parser)]
#[command(name = "sim_app", about = "Run a world description in real time")]
pub struct Args {
    /// Path to a JSON world description
    pub world: PathBuf,

    /// Number of iterations to run (0 runs until interrupted)
    #[arg(short, long, default_value_t = 0)]
    pub iterations: u64,

    /// Update period in milliseconds, overriding the config file
    #[arg(short = 'p', long)]
    pub update_period_ms: Option<f64>,

    /// Worker threads, overriding the config file
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Path to a JSON runner configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Start paused
    #[arg(long)]
    pub paused: bool,
}

impl Args {
    /// The runner configuration: defaults, then the config file, then flags.
    pub fn runner_config(&self) -> Result<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::from_json_str(&read(path)?)
                .with_context(|| format!("in {}", path.display()))?,
            None => RunnerConfig::default(),
        };
        if let Some(period) = self.update_period_ms {
            config.update_period_ms = period;
        }
        if let Some(workers) = self.workers {
            config.worker_threads = workers;
        }
        Ok(config)
    }

    pub fn world(&self) -> Result<WorldDescription> {
        WorldDescription::from_json_str(&read(&self.world)?)
            .with_context(|| format!("in {}", self.world.display()))
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
