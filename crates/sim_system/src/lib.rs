//! # sim_system
//!
//! The plugin side of the simulation host.
//!
//! A [`System`] declares the lifecycle phases it implements through
//! [`Capabilities`] and the component types it touches through
//! [`System::access`]. Systems are registered by name in a
//! [`SystemRegistry`]; the [`SystemManager`] instantiates the ones a world
//! asks for. During [`System::configure`] a system may register persistent
//! query subscriptions and grab the [`EventSink`].
//!
//! ## Usage
//!
//! ```rust
//! use sim_system::{Capabilities, System, SystemManager, SystemRegistry, SystemRequest, SystemConfig};
//! use sim_component::Entity;
//!
//! struct Heartbeat;
//!
//! impl System for Heartbeat {
//!     fn capabilities(&self) -> Capabilities {
//!         Capabilities::POST_UPDATE
//!     }
//! }
//!
//! let mut registry = SystemRegistry::new();
//! registry.register("heartbeat", || Heartbeat).unwrap();
//!
//! let report = SystemManager::new(registry).load([SystemRequest {
//!     entity: Entity::from_raw(1),
//!     config: SystemConfig::new("heartbeat"),
//! }]);
//! assert_eq!(report.loaded.len(), 1);
//! ```

pub mod config;
pub mod context;
pub mod event;
pub mod manager;
pub mod registry;
pub mod system;

pub use config::SystemConfig;
pub use context::{ConfigureContext, QueryCallback, QuerySubscription};
pub use event::{Event, EventSink};
pub use manager::{LoadReport, LoadedSystem, SystemManager, SystemRequest};
pub use registry::{RegistryError, SystemRegistry};
pub use system::{Capabilities, Phase, System, UpdateInfo};
