//! Core [`Component`] trait and type identity.
//!
//! Every value attached to an entity implements [`Component`]. A component's
//! identity is its **semantic role**, not its payload: two components that
//! both wrap a `Vec3` (a local-frame velocity seed and a world-frame one, say)
//! are distinct Rust types with distinct names, so they never collide on an
//! entity. [`declare_component!`](crate::declare_component) produces such
//! tagged newtypes.
//!
//! [`ComponentTypeId`] is derived from the component's stable string name with
//! FNV-1a 64-bit, so the id is the same in every process and can be recomputed
//! from a name alone (which is how the factory and world loading address
//! components).

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A unique identifier for a component type, derived from its string name
/// using FNV-1a 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the id for a component name.
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325
    /// for each byte in name.as_bytes():
    ///     hash = (hash XOR byte) * 0x00000100000001b3
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// The id of component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        T::component_type_id()
    }
}

/// The core component trait.
///
/// Components are plain data: they are cloned out of the manager on read and
/// moved in on write, so equality and copy semantics are exactly those of the
/// implementing type. They must be serialisable so the factory can create and
/// persist them by name.
///
/// # Examples
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use sim_component::Component;
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Mass(f64);
///
/// impl Component for Mass {
///     fn type_name() -> &'static str { "sim.components.Mass" }
/// }
/// ```
pub trait Component:
    Clone + fmt::Debug + Send + Sync + 'static + Serialize + DeserializeOwned
{
    /// The stable, process-independent name of this component type.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }
}

/// A component serialised by name, as produced by
/// [`EntityComponentManager::serialize_entity`](crate::EntityComponentManager::serialize_entity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// The component's registered name.
    pub name: String,
    /// MessagePack-encoded component value.
    pub data: Vec<u8>,
}

/// Declare a tagged newtype component around a value type.
///
/// ```rust
/// use sim_component::{Component, declare_component};
///
/// declare_component! {
///     /// Local-frame speed hint.
///     pub SpeedSeed(f64) = "sim.components.SpeedSeed"
/// }
///
/// assert_eq!(SpeedSeed::type_name(), "sim.components.SpeedSeed");
/// assert_eq!(SpeedSeed(2.0).0, 2.0);
/// ```
///
/// The calling crate must depend on `serde`.
#[macro_export]
macro_rules! declare_component {
    ($(#[$meta:meta])* $vis:vis $name:ident($inner:ty) = $type_name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default, ::serde::Serialize, ::serde::Deserialize)]
        $vis struct $name(pub $inner);

        impl $crate::Component for $name {
            fn type_name() -> &'static str {
                $type_name
            }
        }

        impl ::std::convert::From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }
    };
}
