//! Name-keyed registry of system constructors.
//!
//! The registry is the plugin boundary: a loader (the application's
//! composition root) registers a constructor per system name at startup, and
//! the [`SystemManager`](crate::SystemManager) instantiates systems from it
//! when a world asks for them.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use crate::system::System;

type SystemConstructor = Box<dyn Fn() -> Box<dyn System> + Send + Sync>;

/// Errors produced by the system registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A system with this name is already registered.
    #[error("system '{0}' is already registered")]
    Duplicate(String),
}

/// Registry of system constructors keyed by name.
#[derive(Default)]
pub struct SystemRegistry {
    constructors: BTreeMap<String, SystemConstructor>,
}

impl SystemRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if `name` is taken; the existing
    /// constructor is kept.
    pub fn register<S, F>(&mut self, name: impl Into<String>, constructor: F) -> Result<(), RegistryError>
    where
        S: System + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let name = name.into();
        if self.constructors.contains_key(&name) {
            warn!(system = %name, "duplicate system registration ignored");
            return Err(RegistryError::Duplicate(name));
        }
        debug!(system = %name, "registered system");
        self.constructors
            .insert(name, Box::new(move || Box::new(constructor()) as Box<dyn System>));
        Ok(())
    }

    /// Instantiate the system registered under `name`.
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<dyn System>> {
        self.constructors.get(name).map(|constructor| constructor())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Returns `true` if no systems are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemRegistry")
            .field("names", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
