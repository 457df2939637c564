//! The entity-component manager.
//!
//! [`EntityComponentManager`] owns every entity and component in a simulation
//! world. It is `Send + Sync`: the entity table sits behind a
//! [`parking_lot::RwLock`] and each component type has its own storage in a
//! [`DashMap`], so systems running in parallel stages can share one manager by
//! reference. Locks are always taken entity table first, then storage, and are
//! never held while user callbacks run.
//!
//! ## Phase visibility
//!
//! The runner brackets every phase with [`begin_phase`] / [`end_phase`].
//! While a phase is open, iteration ([`each`], [`each_new`],
//! [`query_entities`]) only sees entities and component attachments that
//! existed when the phase began; anything created or attached during the
//! phase shows up from the next phase on. Outside a phase everything is
//! visible.
//!
//! [`begin_phase`]: EntityComponentManager::begin_phase
//! [`end_phase`]: EntityComponentManager::end_phase
//! [`each`]: EntityComponentManager::each
//! [`each_new`]: EntityComponentManager::each_new
//! [`query_entities`]: EntityComponentManager::query_entities

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{error, trace, warn};

use crate::component::{Component, ComponentRecord, ComponentTypeId};
use crate::entity::{Entity, EntityAllocator};
use crate::fetch::QueryData;
use crate::query::EntityQuery;

/// Type-erased per-component storage.
trait ErasedStorage: Send + Sync {
    fn remove(&mut self, entity: Entity) -> bool;
    fn encode(&self, entity: Entity) -> Option<Result<Vec<u8>, rmp_serde::encode::Error>>;
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Storage<T> {
    values: HashMap<Entity, T>,
}

impl<T> Default for Storage<T> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
        }
    }
}

impl<T: Component> ErasedStorage for Storage<T> {
    fn remove(&mut self, entity: Entity) -> bool {
        self.values.remove(&entity).is_some()
    }

    fn encode(&self, entity: Entity) -> Option<Result<Vec<u8>, rmp_serde::encode::Error>> {
        self.values.get(&entity).map(rmp_serde::to_vec_named)
    }

    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug)]
struct EntityRecord {
    /// Phase generation in which the entity was created.
    created: u64,
    /// Attached component types and the generation each was attached in.
    types: BTreeMap<ComponentTypeId, u64>,
}

#[derive(Debug, Default)]
struct EntityTable {
    allocator: EntityAllocator,
    /// Ordered by id, which is creation order.
    live: BTreeMap<Entity, EntityRecord>,
    new_entities: BTreeSet<Entity>,
    remove_requests: BTreeSet<Entity>,
}

/// Which entities an iteration draws from.
#[derive(Clone, Copy)]
enum Scope {
    All,
    New,
    PendingRemoval,
}

/// Owns all entities and their components.
pub struct EntityComponentManager {
    table: RwLock<EntityTable>,
    storages: DashMap<ComponentTypeId, Box<dyn ErasedStorage>>,
    generation: AtomicU64,
    in_phase: AtomicBool,
}

impl EntityComponentManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: RwLock::new(EntityTable::default()),
            storages: DashMap::new(),
            generation: AtomicU64::new(0),
            in_phase: AtomicBool::new(false),
        }
    }

    // -- Entity lifecycle --

    /// Allocate a fresh entity. Ids are never reused.
    pub fn create_entity(&self) -> Entity {
        let created = self.generation.load(Ordering::Acquire);
        let mut table = self.table.write();
        let entity = table.allocator.allocate();
        table.live.insert(
            entity,
            EntityRecord {
                created,
                types: BTreeMap::new(),
            },
        );
        table.new_entities.insert(entity);
        trace!(%entity, "created entity");
        entity
    }

    /// Remove an entity and all of its components.
    ///
    /// Returns `false` if the entity was not live; removing twice is a no-op.
    pub fn remove_entity(&self, entity: Entity) -> bool {
        let mut table = self.table.write();
        let Some(record) = table.live.remove(&entity) else {
            return false;
        };
        table.new_entities.remove(&entity);
        table.remove_requests.remove(&entity);
        for type_id in record.types.keys() {
            if let Some(mut storage) = self.storages.get_mut(type_id) {
                storage.remove(entity);
            }
        }
        trace!(%entity, "removed entity");
        true
    }

    /// Queue an entity for removal at the end of the current tick.
    ///
    /// Returns `false` if the entity is not live.
    pub fn request_remove_entity(&self, entity: Entity) -> bool {
        let mut table = self.table.write();
        if !table.live.contains_key(&entity) {
            return false;
        }
        table.remove_requests.insert(entity);
        true
    }

    /// Apply every queued removal. Returns the number of entities removed.
    pub fn process_remove_requests(&self) -> usize {
        let pending = std::mem::take(&mut self.table.write().remove_requests);
        pending
            .into_iter()
            .filter(|&entity| self.remove_entity(entity))
            .count()
    }

    /// Forget which entities are new. The runner calls this once per tick.
    pub fn clear_new_entities(&self) {
        self.table.write().new_entities.clear();
    }

    #[must_use]
    pub fn has_entity(&self, entity: Entity) -> bool {
        self.table.read().live.contains_key(&entity)
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.table.read().live.len()
    }

    /// All live entities in creation order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.table.read().live.keys().copied().collect()
    }

    /// Component types attached to `entity`, or an empty list if it is not live.
    #[must_use]
    pub fn component_types(&self, entity: Entity) -> Vec<ComponentTypeId> {
        self.table
            .read()
            .live
            .get(&entity)
            .map(|record| record.types.keys().copied().collect())
            .unwrap_or_default()
    }

    // -- Component operations --

    /// Attach a component to `entity`, replacing any previous value of the
    /// same type.
    ///
    /// Returns `false` (and does nothing) if the entity is not live.
    pub fn create_component<T: Component>(&self, entity: Entity, value: T) -> bool {
        self.set_component(entity, value)
    }

    /// Set (attach or overwrite) a component on `entity`.
    ///
    /// Returns `false` (and does nothing) if the entity is not live.
    pub fn set_component<T: Component>(&self, entity: Entity, value: T) -> bool {
        let type_id = T::component_type_id();
        {
            let table = self.table.read();
            match table.live.get(&entity) {
                None => return false,
                Some(record) if record.types.contains_key(&type_id) => {
                    return self.write_storage(entity, value);
                }
                Some(_) => {}
            }
        }

        let generation = self.generation.load(Ordering::Acquire);
        let mut table = self.table.write();
        let Some(record) = table.live.get_mut(&entity) else {
            return false;
        };
        if !self.write_storage(entity, value) {
            return false;
        }
        record.types.entry(type_id).or_insert(generation);
        true
    }

    fn write_storage<T: Component>(&self, entity: Entity, value: T) -> bool {
        let mut storage = self
            .storages
            .entry(T::component_type_id())
            .or_insert_with(|| Box::new(Storage::<T>::default()));
        match storage.as_any_mut().downcast_mut::<Storage<T>>() {
            Some(storage) => {
                storage.values.insert(entity, value);
                true
            }
            None => {
                error!(
                    component = T::type_name(),
                    "component name collides with a different type"
                );
                false
            }
        }
    }

    /// Read a component value. Empty if the entity is not live or does not
    /// carry `T`.
    #[must_use]
    pub fn component<T: Component>(&self, entity: Entity) -> Option<T> {
        let type_id = T::component_type_id();
        let table = self.table.read();
        if !table.live.get(&entity)?.types.contains_key(&type_id) {
            return None;
        }
        let storage = self.storages.get(&type_id)?;
        storage
            .as_any()
            .downcast_ref::<Storage<T>>()?
            .values
            .get(&entity)
            .cloned()
    }

    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.table
            .read()
            .live
            .get(&entity)
            .is_some_and(|record| record.types.contains_key(&T::component_type_id()))
    }

    /// Detach `T` from `entity`. Returns `false` if it was not attached.
    pub fn remove_component<T: Component>(&self, entity: Entity) -> bool {
        let type_id = T::component_type_id();
        let mut table = self.table.write();
        let Some(record) = table.live.get_mut(&entity) else {
            return false;
        };
        if record.types.remove(&type_id).is_none() {
            return false;
        }
        if let Some(mut storage) = self.storages.get_mut(&type_id) {
            storage.remove(entity);
        }
        true
    }

    /// Serialise every component on `entity` by name.
    ///
    /// Returns `None` if the entity is not live. Components that fail to
    /// encode are logged and left out.
    #[must_use]
    pub fn serialize_entity(&self, entity: Entity) -> Option<Vec<ComponentRecord>> {
        let table = self.table.read();
        let record = table.live.get(&entity)?;
        let mut records = Vec::with_capacity(record.types.len());
        for type_id in record.types.keys() {
            let Some(storage) = self.storages.get(type_id) else {
                continue;
            };
            match storage.encode(entity) {
                Some(Ok(data)) => records.push(ComponentRecord {
                    name: storage.type_name().to_string(),
                    data,
                }),
                Some(Err(e)) => {
                    warn!(%entity, component = storage.type_name(), %e, "failed to encode component");
                }
                None => {}
            }
        }
        Some(records)
    }

    // -- Iteration --

    /// Call `callback` for every entity carrying all of `Q`'s component
    /// types, in creation order. Returning `false` from the callback stops
    /// the iteration.
    ///
    /// The matching set is fixed before the first callback, so the callback
    /// may create, modify or remove entities; entities removed before their
    /// turn are skipped.
    pub fn each<Q: QueryData>(&self, callback: impl FnMut(Entity, Q) -> bool) {
        self.iterate(Scope::All, callback);
    }

    /// Like [`each`](Self::each), restricted to entities created since the
    /// last [`clear_new_entities`](Self::clear_new_entities).
    pub fn each_new<Q: QueryData>(&self, callback: impl FnMut(Entity, Q) -> bool) {
        self.iterate(Scope::New, callback);
    }

    /// Like [`each`](Self::each), restricted to entities queued with
    /// [`request_remove_entity`](Self::request_remove_entity).
    pub fn each_removed<Q: QueryData>(&self, callback: impl FnMut(Entity, Q) -> bool) {
        self.iterate(Scope::PendingRemoval, callback);
    }

    fn iterate<Q: QueryData>(&self, scope: Scope, mut callback: impl FnMut(Entity, Q) -> bool) {
        let query = EntityQuery::with_all(Q::type_ids());
        for entity in self.matching(&query, scope) {
            let Some(data) = Q::fetch(self, entity) else {
                continue;
            };
            if !callback(entity, data) {
                break;
            }
        }
    }

    /// Entities matching `query`, in creation order, as visible at this point
    /// of the phase.
    #[must_use]
    pub fn query_entities(&self, query: &EntityQuery) -> Vec<Entity> {
        self.matching(query, Scope::All)
    }

    fn matching(&self, query: &EntityQuery, scope: Scope) -> Vec<Entity> {
        let horizon = self.visibility_horizon();
        let visible = |generation: u64| horizon.is_none_or(|h| generation < h);
        let table = self.table.read();

        let select = |record: &EntityRecord| {
            if !visible(record.created) {
                return false;
            }
            let types = record
                .types
                .iter()
                .filter(|(_, attached)| visible(**attached))
                .map(|(type_id, _)| type_id);
            query.matches(types)
        };

        let candidates: Box<dyn Iterator<Item = &Entity>> = match scope {
            Scope::All => Box::new(table.live.keys()),
            Scope::New => Box::new(table.new_entities.iter()),
            Scope::PendingRemoval => Box::new(table.remove_requests.iter()),
        };
        candidates
            .filter(|entity| table.live.get(*entity).is_some_and(select))
            .copied()
            .collect()
    }

    // -- Phase bracketing --

    /// Open a phase: attachments made from now on are hidden from iteration
    /// until the next phase begins.
    pub fn begin_phase(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.in_phase.store(true, Ordering::Release);
    }

    /// Close the current phase.
    pub fn end_phase(&self) {
        self.in_phase.store(false, Ordering::Release);
    }

    fn visibility_horizon(&self) -> Option<u64> {
        self.in_phase
            .load(Ordering::Acquire)
            .then(|| self.generation.load(Ordering::Acquire))
    }
}

impl Default for EntityComponentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityComponentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityComponentManager")
            .field("entities", &self.entity_count())
            .field("component_types", &self.storages.len())
            .finish()
    }
}
