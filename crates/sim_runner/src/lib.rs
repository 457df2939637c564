//! # sim_runner
//!
//! Drives a world through real-time simulation ticks.
//!
//! ## Tick Lifecycle
//!
//! 1. Drain control events emitted by systems.
//! 2. PreUpdate, Update, PostUpdate. Each phase is split into stages by
//!    [`scheduler::compute_stages`]; multi-system stages run on the
//!    [`WorkerPool`].
//! 3. Advance the iteration counter and simulation time.
//! 4. Apply deferred removals, clear the new-entity set.
//! 5. [`Pacer`] sleeps out the remainder of the update period.
//!
//! ## Usage
//!
//! ```rust
//! use sim_component::{ComponentFactory, register_builtin_components};
//! use sim_runner::{EntityDescription, RunnerConfig, SimulationRunner, WorldDescription};
//! use sim_system::{SystemManager, SystemRegistry};
//!
//! let mut factory = ComponentFactory::new();
//! register_builtin_components(&mut factory).unwrap();
//!
//! let world = WorldDescription {
//!     name: "demo".to_string(),
//!     entities: vec![EntityDescription { name: "box".to_string(), ..Default::default() }],
//!     systems: Vec::new(),
//! };
//! let runner = SimulationRunner::new(
//!     &world,
//!     SystemManager::new(SystemRegistry::new()),
//!     factory,
//!     RunnerConfig::default(),
//! )
//! .unwrap();
//!
//! assert!(runner.run(10));
//! assert_eq!(runner.iteration_count(), 10);
//! ```

pub mod config;
pub mod error;
pub mod pacing;
pub mod pool;
pub mod runner;
pub mod scheduler;
pub mod world;

pub use config::RunnerConfig;
pub use error::RunnerError;
pub use pacing::{Clock, Pacer, SimulatedClock, SystemClock};
pub use pool::WorkerPool;
pub use runner::{SimulationRunner, StopHandle};
pub use world::{CreatedWorld, EntityDescription, SystemDescription, WorldDescription, create_entities};
