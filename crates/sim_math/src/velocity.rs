//! Linear velocity components.
//!
//! All four wrap a [`Vec3`] and differ only in semantic role, which is why
//! each is its own tagged type. The seeds are hints from the world
//! description that a system turns into actual velocities (e.g. by applying a
//! frame transformation or noise).

use glam::Vec3;
use sim_component::declare_component;

declare_component! {
    /// Linear velocity in the entity's local frame.
    pub LinearVelocity(Vec3) = "sim.components.LinearVelocity"
}

declare_component! {
    /// Linear velocity in the world frame.
    pub WorldLinearVelocity(Vec3) = "sim.components.WorldLinearVelocity"
}

declare_component! {
    /// Linear velocity seed expressed in the entity's local frame.
    pub LinearVelocitySeed(Vec3) = "sim.components.LinearVelocitySeed"
}

declare_component! {
    /// Linear velocity seed expressed in the world frame.
    pub WorldLinearVelocitySeed(Vec3) = "sim.components.WorldLinearVelocitySeed"
}
