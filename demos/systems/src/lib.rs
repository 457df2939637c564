//! # demo_systems
//!
//! Demonstration systems that exercise the pipeline end to end:
//!
//! - `velocity_seed` turns velocity seeds into velocities.
//! - `integrate_pose` moves entities along their velocity.
//! - `print_velocity` logs velocities after each tick.

pub mod integrate_pose;
pub mod print_velocity;
pub mod velocity_seed;

pub use integrate_pose::IntegratePose;
pub use print_velocity::PrintVelocity;
pub use velocity_seed::VelocitySeed;

use sim_system::{RegistryError, SystemRegistry};

/// Register every demo system under its name.
///
/// # Errors
///
/// Fails if any of the names is already taken.
pub fn register_demo_systems(registry: &mut SystemRegistry) -> Result<(), RegistryError> {
    registry.register(velocity_seed::NAME, VelocitySeed::default)?;
    registry.register(integrate_pose::NAME, IntegratePose::default)?;
    registry.register(print_velocity::NAME, PrintVelocity::default)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_demo_systems() {
        let mut registry = SystemRegistry::new();
        register_demo_systems(&mut registry).unwrap();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["integrate_pose", "print_velocity", "velocity_seed"]
        );
        assert!(register_demo_systems(&mut registry).is_err());
    }
}
