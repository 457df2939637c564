//! Explicit Euler integration of [`Pose`] from linear velocity.

use anyhow::Result;
use sim_component::{Access, ComponentAccess, EntityComponentManager};
use sim_math::{LinearVelocity, Pose, WorldLinearVelocity};
use sim_system::{Capabilities, System, UpdateInfo};

pub const NAME: &str = "integrate_pose";

/// Moves every posed entity by `velocity * dt`.
///
/// Local-frame [`LinearVelocity`] is rotated into the parent frame first;
/// [`WorldLinearVelocity`] is applied as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegratePose;

impl System for IntegratePose {
    fn capabilities(&self) -> Capabilities {
        Capabilities::UPDATE
    }

    fn access(&self) -> Access {
        ComponentAccess::new()
            .read::<LinearVelocity>()
            .read::<WorldLinearVelocity>()
            .write::<Pose>()
            .into()
    }

    fn update(&mut self, info: &UpdateInfo, ecm: &EntityComponentManager) -> Result<()> {
        let dt = info.dt.as_secs_f32();
        if dt == 0.0 {
            return Ok(());
        }
        ecm.each::<(Pose,)>(|entity, (pose,)| {
            let mut velocity = ecm
                .component::<WorldLinearVelocity>(entity)
                .map_or(sim_math::Vec3::ZERO, |v| v.0);
            if let Some(local) = ecm.component::<LinearVelocity>(entity) {
                velocity += pose.rotate_vector(local.0);
            }
            if velocity != sim_math::Vec3::ZERO {
                ecm.set_component(entity, pose.translated(velocity * dt));
            }
            true
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;
    use std::time::Duration;

    use sim_math::{Quat, Vec3};

    use super::*;

    fn info(dt_ms: u64) -> UpdateInfo {
        UpdateInfo {
            dt: Duration::from_millis(dt_ms),
            ..UpdateInfo::default()
        }
    }

    #[test]
    fn test_world_velocity_moves_pose() {
        let ecm = EntityComponentManager::new();
        let e = ecm.create_entity();
        ecm.set_component(e, Pose::IDENTITY);
        ecm.set_component(e, WorldLinearVelocity(Vec3::new(0.0, 0.0, 4.0)));

        IntegratePose.update(&info(500), &ecm).unwrap();
        assert_eq!(ecm.component::<Pose>(e).unwrap().position, Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_local_velocity_is_rotated() {
        let ecm = EntityComponentManager::new();
        let e = ecm.create_entity();
        ecm.set_component(e, Pose::new(Vec3::ZERO, Quat::from_rotation_z(FRAC_PI_2)));
        ecm.set_component(e, LinearVelocity(Vec3::X));

        IntegratePose.update(&info(1000), &ecm).unwrap();
        let position = ecm.component::<Pose>(e).unwrap().position;
        assert!(position.abs_diff_eq(Vec3::Y, 1e-6), "position {position}");
    }

    #[test]
    fn test_paused_tick_does_not_move() {
        let ecm = EntityComponentManager::new();
        let e = ecm.create_entity();
        ecm.set_component(e, Pose::from_position(Vec3::ONE));
        ecm.set_component(e, WorldLinearVelocity(Vec3::X));

        IntegratePose.update(&UpdateInfo::default(), &ecm).unwrap();
        assert_eq!(ecm.component::<Pose>(e), Some(Pose::from_position(Vec3::ONE)));
    }
}
