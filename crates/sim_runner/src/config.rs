//! Runner configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RunnerError;

/// Tunables for a [`SimulationRunner`](crate::SimulationRunner).
///
/// Every field has a default, so a partial JSON document is valid:
///
/// ```rust
/// use sim_runner::RunnerConfig;
///
/// let config = RunnerConfig::from_json_str(r#"{ "update_period_ms": 4.0 }"#).unwrap();
/// assert_eq!(config.update_period().as_millis(), 4);
/// assert_eq!(config.worker_threads, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Wall-clock period between tick starts, in milliseconds. Zero runs
    /// ticks back to back.
    pub update_period_ms: f64,
    /// Simulation time advanced per tick, in milliseconds.
    pub step_size_ms: f64,
    /// Threads in the worker pool.
    pub worker_threads: usize,
    /// Overruns longer than this fraction of the period are logged.
    pub overrun_warn_ratio: f64,
    /// Emit a status line every this many ticks (0 disables it).
    pub status_log_interval: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            update_period_ms: 1.0,
            step_size_ms: 1.0,
            worker_threads: 4,
            overrun_warn_ratio: 0.5,
            status_log_interval: 1000,
        }
    }
}

impl RunnerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Parse`] for malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self, RunnerError> {
        serde_json::from_str(json).map_err(|source| RunnerError::Parse {
            what: "runner config",
            source,
        })
    }

    #[must_use]
    pub fn update_period(&self) -> Duration {
        millis(self.update_period_ms)
    }

    #[must_use]
    pub fn step_size(&self) -> Duration {
        millis(self.step_size_ms)
    }
}

fn millis(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_secs_f64(ms / 1000.0)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.update_period(), Duration::from_millis(1));
        assert_eq!(config.step_size(), Duration::from_millis(1));
    }

    #[test]
    fn test_partial_document() {
        let config = RunnerConfig::from_json_str(r#"{ "worker_threads": 2 }"#).unwrap();
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.status_log_interval, 1000);
    }

    #[test]
    fn test_negative_period_is_zero() {
        let config = RunnerConfig {
            update_period_ms: -3.0,
            ..RunnerConfig::default()
        };
        assert_eq!(config.update_period(), Duration::ZERO);
    }

    #[test]
    fn test_malformed_document() {
        let err = RunnerConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, RunnerError::Parse { what: "runner config", .. }));
    }
}
