//! Name-keyed component factory.
//!
//! The [`ComponentFactory`] maps stable component names to constructors, so
//! code that only knows a component by name (world loading, state snapshots)
//! can create, decode and attach it without compile-time knowledge of the
//! concrete type. The factory is an ordinary value owned by the composition
//! root and populated by an explicit startup step; duplicate registrations
//! are reported to the caller instead of overwriting the existing entry.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use crate::component::{Component, ComponentRecord, ComponentTypeId};
use crate::entity::Entity;
use crate::manager::EntityComponentManager;

/// Errors produced by the component factory.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    /// A component with this name is already registered.
    #[error("component '{0}' is already registered")]
    Duplicate(String),

    /// No component with this name is registered.
    #[error("component '{0}' not found")]
    NotFound(String),

    /// A JSON value could not be converted into the component.
    #[error("invalid value for component '{name}': {source}")]
    Value {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// MessagePack bytes could not be decoded into the component.
    #[error("failed to decode component '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: rmp_serde::decode::Error,
    },

    /// The component could not be encoded.
    #[error("failed to encode component '{name}': {source}")]
    Encode {
        name: String,
        #[source]
        source: rmp_serde::encode::Error,
    },
}

/// A component instance whose concrete type is only known at runtime.
pub trait ErasedComponent: Send + Sync + fmt::Debug {
    /// The component's registered name.
    fn type_name(&self) -> &'static str;

    /// The component's [`ComponentTypeId`].
    fn component_type_id(&self) -> ComponentTypeId;

    /// Encode the value to MessagePack.
    fn to_bytes(&self) -> Result<Vec<u8>, FactoryError>;

    /// Attach (or overwrite) this value on `entity`. Returns `false` if the
    /// entity is not live.
    fn attach(&self, ecm: &EntityComponentManager, entity: Entity) -> bool;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug)]
struct Erased<T>(T);

impl<T: Component> ErasedComponent for Erased<T> {
    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn component_type_id(&self) -> ComponentTypeId {
        T::component_type_id()
    }

    fn to_bytes(&self) -> Result<Vec<u8>, FactoryError> {
        rmp_serde::to_vec_named(&self.0).map_err(|source| FactoryError::Encode {
            name: T::type_name().to_string(),
            source,
        })
    }

    fn attach(&self, ecm: &EntityComponentManager, entity: Entity) -> bool {
        ecm.set_component(entity, self.0.clone())
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }
}

type Constructor = Box<dyn Fn() -> Box<dyn ErasedComponent> + Send + Sync>;

struct Entry {
    construct: Constructor,
    from_value: fn(&serde_json::Value) -> Result<Box<dyn ErasedComponent>, FactoryError>,
    from_bytes: fn(&[u8]) -> Result<Box<dyn ErasedComponent>, FactoryError>,
}

fn from_value<T: Component>(
    value: &serde_json::Value,
) -> Result<Box<dyn ErasedComponent>, FactoryError> {
    serde_json::from_value::<T>(value.clone())
        .map(|v| Box::new(Erased(v)) as Box<dyn ErasedComponent>)
        .map_err(|source| FactoryError::Value {
            name: T::type_name().to_string(),
            source,
        })
}

fn from_bytes<T: Component>(
    bytes: &[u8],
) -> Result<Box<dyn ErasedComponent>, FactoryError> {
    rmp_serde::from_slice::<T>(bytes)
        .map(|v| Box::new(Erased(v)) as Box<dyn ErasedComponent>)
        .map_err(|source| FactoryError::Decode {
            name: T::type_name().to_string(),
            source,
        })
}

/// Registry of component constructors keyed by component name.
#[derive(Default)]
pub struct ComponentFactory {
    entries: BTreeMap<&'static str, Entry>,
}

impl ComponentFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its [`Component::type_name`], default-constructed.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::Duplicate`] if the name is taken.
    pub fn register<T: Component + Default>(&mut self) -> Result<(), FactoryError> {
        self.register_with::<T>(T::default)
    }

    /// Register `T` with an explicit seed constructor.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::Duplicate`] if the name is taken.
    pub fn register_with<T: Component>(
        &mut self,
        ctor: impl Fn() -> T + Send + Sync + 'static,
    ) -> Result<(), FactoryError> {
        let name = T::type_name();
        if self.entries.contains_key(name) {
            warn!(component = name, "duplicate component registration ignored");
            return Err(FactoryError::Duplicate(name.to_string()));
        }
        self.entries.insert(
            name,
            Entry {
                construct: Box::new(move || Box::new(Erased(ctor()))),
                from_value: from_value::<T>,
                from_bytes: from_bytes::<T>,
            },
        );
        debug!(component = name, "registered component");
        Ok(())
    }

    fn entry(&self, name: &str) -> Result<&Entry, FactoryError> {
        self.entries
            .get(name)
            .ok_or_else(|| FactoryError::NotFound(name.to_string()))
    }

    /// Create a component by name using its registered constructor.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::NotFound`] for unknown names.
    pub fn create(&self, name: &str) -> Result<Box<dyn ErasedComponent>, FactoryError> {
        Ok((self.entry(name)?.construct)())
    }

    /// Create a component by name from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::NotFound`] for unknown names and
    /// [`FactoryError::Value`] if the value does not fit the component.
    pub fn create_from_value(
        &self,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<Box<dyn ErasedComponent>, FactoryError> {
        (self.entry(name)?.from_value)(value)
    }

    /// Create a component by name from MessagePack bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::NotFound`] for unknown names and
    /// [`FactoryError::Decode`] for malformed bytes.
    pub fn create_from_bytes(
        &self,
        name: &str,
        bytes: &[u8],
    ) -> Result<Box<dyn ErasedComponent>, FactoryError> {
        (self.entry(name)?.from_bytes)(bytes)
    }

    /// Re-attach serialised component records to `entity`.
    ///
    /// Returns the number of components attached.
    ///
    /// # Errors
    ///
    /// Fails on the first record that cannot be decoded.
    pub fn restore(
        &self,
        ecm: &EntityComponentManager,
        entity: Entity,
        records: &[ComponentRecord],
    ) -> Result<usize, FactoryError> {
        let mut attached = 0;
        for record in records {
            if self.create_from_bytes(&record.name, &record.data)?.attach(ecm, entity) {
                attached += 1;
            }
        }
        Ok(attached)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::declare_component! {
        Mass(f64) = "test.Mass"
    }

    crate::declare_component! {
        Label(String) = "test.Label"
    }

    fn factory() -> ComponentFactory {
        let mut factory = ComponentFactory::new();
        factory.register::<Mass>().unwrap();
        factory.register_with(|| Label("unnamed".to_string())).unwrap();
        factory
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut factory = factory();
        let err = factory.register::<Mass>().unwrap_err();
        assert!(matches!(err, FactoryError::Duplicate(name) if name == "test.Mass"));
        assert_eq!(factory.len(), 2);
    }

    #[test]
    fn test_create_unknown_name() {
        let err = factory().create("test.Missing").unwrap_err();
        assert!(matches!(err, FactoryError::NotFound(_)));
    }

    #[test]
    fn test_create_uses_constructor() {
        let factory = factory();
        let label = factory.create("test.Label").unwrap();
        assert_eq!(label.type_name(), "test.Label");
        assert_eq!(
            label.as_any().downcast_ref::<Label>(),
            Some(&Label("unnamed".to_string()))
        );
        let mass = factory.create("test.Mass").unwrap();
        assert_eq!(mass.as_any().downcast_ref::<Mass>(), Some(&Mass(0.0)));
    }

    #[test]
    fn test_create_from_value_and_attach() {
        let factory = factory();
        let ecm = EntityComponentManager::new();
        let e = ecm.create_entity();

        let mass = factory
            .create_from_value("test.Mass", &serde_json::json!(4.5))
            .unwrap();
        assert!(mass.attach(&ecm, e));
        assert_eq!(ecm.component::<Mass>(e), Some(Mass(4.5)));

        let err = factory
            .create_from_value("test.Mass", &serde_json::json!("heavy"))
            .unwrap_err();
        assert!(matches!(err, FactoryError::Value { .. }));
    }

    #[test]
    fn test_bytes_restore_onto_new_entity() {
        let factory = factory();
        let ecm = EntityComponentManager::new();
        let source = ecm.create_entity();
        ecm.set_component(source, Mass(2.0));
        ecm.set_component(source, Label("probe".to_string()));

        let records = ecm.serialize_entity(source).unwrap();
        let target = ecm.create_entity();
        assert_eq!(factory.restore(&ecm, target, &records).unwrap(), 2);
        assert_eq!(ecm.component::<Mass>(target), Some(Mass(2.0)));
        assert_eq!(ecm.component::<Label>(target), Some(Label("probe".to_string())));
    }

    #[test]
    fn test_names_sorted() {
        let names: Vec<_> = factory().names().collect();
        assert_eq!(names, vec!["test.Label", "test.Mass"]);
    }
}
