//! Access declarations and entity query predicates.
//!
//! [`Access`] declares which component types a system reads and writes during
//! its update phases. The runner uses these declarations to decide which
//! systems may share an execution stage.
//!
//! [`EntityQuery`] is a predicate over an entity's set of component types. It
//! backs both the typed iteration helpers on the manager and the persistent
//! query subscriptions systems register at configure time.

use std::collections::BTreeSet;

use crate::component::{Component, ComponentTypeId};

/// The component types a system touches, split by access mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentAccess {
    /// Component types the system reads.
    pub reads: Vec<ComponentTypeId>,
    /// Component types the system writes (attach, overwrite or remove).
    pub writes: Vec<ComponentTypeId>,
    /// Whether the system creates or removes entities.
    pub structural: bool,
}

impl ComponentAccess {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a read-only component type.
    #[must_use]
    pub fn read<T: Component>(self) -> Self {
        self.read_id(T::component_type_id())
    }

    /// Add a written component type.
    #[must_use]
    pub fn write<T: Component>(self) -> Self {
        self.write_id(T::component_type_id())
    }

    #[must_use]
    pub fn read_id(mut self, type_id: ComponentTypeId) -> Self {
        if !self.reads.contains(&type_id) {
            self.reads.push(type_id);
        }
        self
    }

    #[must_use]
    pub fn write_id(mut self, type_id: ComponentTypeId) -> Self {
        if !self.writes.contains(&type_id) {
            self.writes.push(type_id);
        }
        self
    }

    /// Mark the system as creating or removing entities.
    #[must_use]
    pub fn structural(mut self) -> Self {
        self.structural = true;
        self
    }

    /// Checks whether this access set conflicts with another.
    ///
    /// Two sets conflict when one writes a component type that the other
    /// reads or writes, or when either changes the entity set:
    ///
    /// ```text
    /// A.writes ∩ (B.reads ∪ B.writes) ≠ ∅  OR
    /// B.writes ∩ (A.reads ∪ A.writes) ≠ ∅  OR
    /// A.structural OR B.structural
    /// ```
    #[must_use]
    pub fn conflicts_with(&self, other: &ComponentAccess) -> bool {
        if self.structural || other.structural {
            return true;
        }
        let touches = |access: &ComponentAccess, ty: &ComponentTypeId| {
            access.reads.contains(ty) || access.writes.contains(ty)
        };
        self.writes.iter().any(|w| touches(other, w))
            || other.writes.iter().any(|w| touches(self, w))
    }
}

/// How a system accesses the manager during its update phases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Access {
    /// Undeclared: the system may touch anything and never shares a stage.
    #[default]
    Exclusive,
    /// The system touches only the listed component types.
    Declared(ComponentAccess),
}

impl Access {
    #[must_use]
    pub fn conflicts_with(&self, other: &Access) -> bool {
        match (self, other) {
            (Access::Declared(a), Access::Declared(b)) => a.conflicts_with(b),
            _ => true,
        }
    }
}

impl From<ComponentAccess> for Access {
    fn from(access: ComponentAccess) -> Self {
        Access::Declared(access)
    }
}

/// A predicate matching entities by the component types attached to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityQuery {
    /// Every one of these types must be attached.
    pub with: BTreeSet<ComponentTypeId>,
    /// None of these types may be attached.
    pub without: BTreeSet<ComponentTypeId>,
}

impl EntityQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query requiring all of the given types.
    #[must_use]
    pub fn with_all(types: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        Self {
            with: types.into_iter().collect(),
            without: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with<T: Component>(mut self) -> Self {
        self.with.insert(T::component_type_id());
        self
    }

    #[must_use]
    pub fn without<T: Component>(mut self) -> Self {
        self.without.insert(T::component_type_id());
        self
    }

    /// Returns `true` if an entity carrying `types` satisfies the query.
    #[must_use]
    pub fn matches<'a>(&self, types: impl IntoIterator<Item = &'a ComponentTypeId> + Clone) -> bool {
        let has = |ty: &ComponentTypeId| types.clone().into_iter().any(|t| t == ty);
        self.with.iter().all(has) && !self.without.iter().any(has)
    }
}
