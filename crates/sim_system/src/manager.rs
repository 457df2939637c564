//! Resolves requested systems against the registry.
//!
//! Each request names a system and the entity it belongs to. Requests the
//! registry cannot satisfy are logged and reported back; they never prevent
//! the remaining systems from loading.

use std::collections::HashSet;

use sim_component::Entity;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::SystemConfig;
use crate::registry::SystemRegistry;
use crate::system::System;

/// A request to attach the system named in `config` to `entity`.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemRequest {
    pub entity: Entity,
    pub config: SystemConfig,
}

/// A system instantiated from the registry, ready to be configured.
pub struct LoadedSystem {
    pub name: String,
    /// Unique per loaded instance.
    pub instance_id: Uuid,
    pub entity: Entity,
    pub config: SystemConfig,
    pub system: Box<dyn System>,
}

impl std::fmt::Debug for LoadedSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedSystem")
            .field("name", &self.name)
            .field("instance_id", &self.instance_id)
            .field("entity", &self.entity)
            .field("capabilities", &self.system.capabilities())
            .finish()
    }
}

/// Outcome of [`SystemManager::load`].
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Loaded systems, in request order.
    pub loaded: Vec<LoadedSystem>,
    /// Names that no registered constructor matched.
    pub unresolved: Vec<String>,
}

/// Turns [`SystemRequest`]s into system instances.
#[derive(Debug)]
pub struct SystemManager {
    registry: SystemRegistry,
}

impl SystemManager {
    #[must_use]
    pub fn new(registry: SystemRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &SystemRegistry {
        &self.registry
    }

    /// Instantiate every request the registry can resolve.
    ///
    /// A name is loaded at most once per entity; repeated requests for the
    /// same (entity, name) pair are skipped.
    pub fn load(&self, requests: impl IntoIterator<Item = SystemRequest>) -> LoadReport {
        let mut report = LoadReport::default();
        let mut seen = HashSet::new();

        for request in requests {
            let name = request.config.name.clone();
            if !seen.insert((request.entity, name.clone())) {
                info!(system = %name, entity = %request.entity, "system already loaded for entity, skipping");
                continue;
            }
            let Some(system) = self.registry.create(&name) else {
                error!(system = %name, entity = %request.entity, "failed to load system: no such plugin");
                report.unresolved.push(name);
                continue;
            };
            let instance_id = Uuid::new_v4();
            info!(system = %name, %instance_id, entity = %request.entity, "loaded system");
            report.loaded.push(LoadedSystem {
                name,
                instance_id,
                entity: request.entity,
                config: request.config,
                system,
            });
        }

        report
    }
}
