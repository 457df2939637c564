//! World descriptions and entity creation.
//!
//! A [`WorldDescription`] is the already-parsed form of a world: named
//! entities with their components (keyed by registered component name) and
//! the systems attached to the world or to individual entities. Turning it
//! into live entities is name-driven through the
//! [`ComponentFactory`](sim_component::ComponentFactory).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sim_component::{
    ComponentFactory, Entity, EntityComponentManager, Name, ParentEntity, WorldMarker,
};
use sim_system::{SystemConfig, SystemRequest};
use tracing::{debug, warn};

use crate::error::RunnerError;

/// A system attached to the world or to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDescription {
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// An entity and its initial components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDescription {
    pub name: String,
    /// Component values keyed by registered component name.
    #[serde(default)]
    pub components: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub systems: Vec<SystemDescription>,
}

/// The root of a world description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldDescription {
    pub name: String,
    #[serde(default)]
    pub entities: Vec<EntityDescription>,
    /// World-level systems, attached to the world entity.
    #[serde(default)]
    pub systems: Vec<SystemDescription>,
}

impl WorldDescription {
    /// Parse a JSON world description.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Parse`] for malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self, RunnerError> {
        serde_json::from_str(json).map_err(|source| RunnerError::Parse {
            what: "world description",
            source,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.systems.is_empty()
    }
}

/// What [`create_entities`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedWorld {
    pub world_entity: Entity,
    /// Entities in description order.
    pub entities: Vec<Entity>,
    /// Systems to load, world-level ones first.
    pub system_requests: Vec<SystemRequest>,
}

fn request(entity: Entity, description: &SystemDescription) -> SystemRequest {
    SystemRequest {
        entity,
        config: SystemConfig::new(description.name.clone()).with_params(description.config.clone()),
    }
}

/// Create the world entity and every described entity.
///
/// The world entity carries [`WorldMarker`] and [`Name`]. Each described
/// entity carries [`Name`], [`ParentEntity`] pointing at the world entity,
/// and its listed components. Components the factory does not know, or
/// whose value does not fit, are logged and skipped.
pub fn create_entities(
    ecm: &EntityComponentManager,
    factory: &ComponentFactory,
    world: &WorldDescription,
) -> CreatedWorld {
    let world_entity = ecm.create_entity();
    ecm.create_component(world_entity, WorldMarker);
    ecm.create_component(world_entity, Name(world.name.clone()));

    let mut system_requests: Vec<SystemRequest> = world
        .systems
        .iter()
        .map(|system| request(world_entity, system))
        .collect();

    let mut entities = Vec::with_capacity(world.entities.len());
    for description in &world.entities {
        let entity = ecm.create_entity();
        ecm.create_component(entity, Name(description.name.clone()));
        ecm.create_component(entity, ParentEntity(world_entity));

        for (component, value) in &description.components {
            match factory.create_from_value(component, value) {
                Ok(erased) => {
                    erased.attach(ecm, entity);
                }
                Err(err) => {
                    warn!(entity = %description.name, component = %component, error = %err, "skipping component");
                }
            }
        }

        system_requests.extend(description.systems.iter().map(|system| request(entity, system)));
        debug!(entity = %description.name, id = entity.id(), "created entity");
        entities.push(entity);
    }

    CreatedWorld {
        world_entity,
        entities,
        system_requests,
    }
}
