//! # sim_math
//!
//! Math types for the simulation host. Re-exports [`glam`] for linear algebra
//! and defines the spatial components shared by systems.

pub mod pose;
pub mod velocity;

pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};

pub use pose::Pose;
pub use velocity::{LinearVelocity, LinearVelocitySeed, WorldLinearVelocity, WorldLinearVelocitySeed};

use sim_component::{ComponentFactory, FactoryError};

/// Register the spatial components with `factory`.
///
/// # Errors
///
/// Fails if any of the names is already registered.
pub fn register_components(factory: &mut ComponentFactory) -> Result<(), FactoryError> {
    factory.register::<Pose>()?;
    factory.register::<LinearVelocity>()?;
    factory.register::<WorldLinearVelocity>()?;
    factory.register::<LinearVelocitySeed>()?;
    factory.register::<WorldLinearVelocitySeed>()?;
    Ok(())
}
