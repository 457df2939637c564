//! Runner errors.

/// Errors produced while building or configuring a runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The world description has neither entities nor systems.
    #[error("world '{0}' has no entities and no systems")]
    EmptyWorld(String),

    /// A runner or world configuration document could not be parsed.
    #[error("invalid {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] std::io::Error),
}
