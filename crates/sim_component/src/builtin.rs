//! Components every world carries regardless of which systems are loaded.

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::entity::Entity;
use crate::factory::{ComponentFactory, FactoryError};

crate::declare_component! {
    /// Human-readable entity name.
    pub Name(String) = "sim.components.Name"
}

crate::declare_component! {
    /// The entity this one belongs to.
    pub ParentEntity(Entity) = "sim.components.ParentEntity"
}

/// Marks the single world entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldMarker;

impl Component for WorldMarker {
    fn type_name() -> &'static str {
        "sim.components.World"
    }
}

/// Register the built-in components with `factory`.
///
/// # Errors
///
/// Fails if any built-in name is already registered.
pub fn register_builtin_components(factory: &mut ComponentFactory) -> Result<(), FactoryError> {
    factory.register::<Name>()?;
    factory.register::<ParentEntity>()?;
    factory.register::<WorldMarker>()?;
    Ok(())
}
