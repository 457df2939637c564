//! Read-only view of the manager.
//!
//! PostUpdate callbacks receive an [`EcmReader`] rather than the manager
//! itself, so observers cannot mutate world state after the update phases.

use crate::component::{Component, ComponentTypeId};
use crate::entity::Entity;
use crate::fetch::QueryData;
use crate::manager::EntityComponentManager;
use crate::query::EntityQuery;

/// Shared, read-only access to an [`EntityComponentManager`].
#[derive(Debug, Clone, Copy)]
pub struct EcmReader<'a> {
    ecm: &'a EntityComponentManager,
}

impl<'a> EcmReader<'a> {
    #[must_use]
    pub fn new(ecm: &'a EntityComponentManager) -> Self {
        Self { ecm }
    }

    #[must_use]
    pub fn component<T: Component>(&self, entity: Entity) -> Option<T> {
        self.ecm.component(entity)
    }

    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.ecm.has_component::<T>(entity)
    }

    #[must_use]
    pub fn has_entity(&self, entity: Entity) -> bool {
        self.ecm.has_entity(entity)
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.ecm.entity_count()
    }

    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.ecm.entities()
    }

    #[must_use]
    pub fn component_types(&self, entity: Entity) -> Vec<ComponentTypeId> {
        self.ecm.component_types(entity)
    }

    #[must_use]
    pub fn query_entities(&self, query: &EntityQuery) -> Vec<Entity> {
        self.ecm.query_entities(query)
    }

    pub fn each<Q: QueryData>(&self, callback: impl FnMut(Entity, Q) -> bool) {
        self.ecm.each(callback);
    }

    pub fn each_new<Q: QueryData>(&self, callback: impl FnMut(Entity, Q) -> bool) {
        self.ecm.each_new(callback);
    }

    pub fn each_removed<Q: QueryData>(&self, callback: impl FnMut(Entity, Q) -> bool) {
        self.ecm.each_removed(callback);
    }
}

impl<'a> From<&'a EntityComponentManager> for EcmReader<'a> {
    fn from(ecm: &'a EntityComponentManager) -> Self {
        Self::new(ecm)
    }
}
