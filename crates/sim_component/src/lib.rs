//! # sim_component
//!
//! The entity-component substrate of the simulation host.
//!
//! This crate provides:
//!
//! - [`Entity`] and [`EntityAllocator`]: stable, never-reused identities.
//! - [`Component`]: the contract for tagged component values, plus
//!   [`declare_component!`] for newtype tags.
//! - [`ComponentFactory`]: name-keyed construction and decoding.
//! - [`EntityComponentManager`]: the thread-safe world store with typed
//!   get/set, iteration and phase-scoped visibility.
//! - [`Access`] / [`EntityQuery`]: access declarations and entity predicates.

pub mod builtin;
pub mod component;
pub mod entity;
pub mod factory;
pub mod fetch;
pub mod manager;
pub mod query;
pub mod reader;

pub use builtin::{Name, ParentEntity, WorldMarker, register_builtin_components};
pub use component::{Component, ComponentRecord, ComponentTypeId};
pub use entity::{Entity, EntityAllocator};
pub use factory::{ComponentFactory, ErasedComponent, FactoryError};
pub use fetch::QueryData;
pub use manager::EntityComponentManager;
pub use query::{Access, ComponentAccess, EntityQuery};
pub use reader::EcmReader;
