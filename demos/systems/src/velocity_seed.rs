//! Turns velocity seeds into velocities.
//!
//! Every entity carrying a [`LinearVelocitySeed`] gets a [`LinearVelocity`]
//! of `gain * seed`; world-frame seeds map to [`WorldLinearVelocity`] the
//! same way. The gain comes from the `gain` parameter (default 2).

use anyhow::{Context, Result};
use sim_component::{Access, ComponentAccess, EntityComponentManager};
use sim_math::{LinearVelocity, LinearVelocitySeed, WorldLinearVelocity, WorldLinearVelocitySeed};
use sim_system::{Capabilities, ConfigureContext, System, UpdateInfo};
use tracing::debug;

pub const NAME: &str = "velocity_seed";

const DEFAULT_GAIN: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct VelocitySeed {
    gain: f32,
}

impl Default for VelocitySeed {
    fn default() -> Self {
        Self { gain: DEFAULT_GAIN }
    }
}

impl System for VelocitySeed {
    fn capabilities(&self) -> Capabilities {
        Capabilities::CONFIGURE | Capabilities::UPDATE
    }

    fn access(&self) -> Access {
        ComponentAccess::new()
            .read::<LinearVelocitySeed>()
            .read::<WorldLinearVelocitySeed>()
            .write::<LinearVelocity>()
            .write::<WorldLinearVelocity>()
            .into()
    }

    fn configure(&mut self, ctx: &mut ConfigureContext<'_>) -> Result<()> {
        if let Some(gain) = ctx.config.param("gain") {
            let gain = gain.as_f64().context("'gain' must be a number")?;
            self.gain = gain as f32;
        }
        debug!(gain = self.gain, entity = %ctx.entity, "velocity seed configured");
        Ok(())
    }

    fn update(&mut self, info: &UpdateInfo, ecm: &EntityComponentManager) -> Result<()> {
        if info.paused {
            return Ok(());
        }
        ecm.each::<(LinearVelocitySeed,)>(|entity, (seed,)| {
            ecm.set_component(entity, LinearVelocity(seed.0 * self.gain));
            true
        });
        ecm.each::<(WorldLinearVelocitySeed,)>(|entity, (seed,)| {
            ecm.set_component(entity, WorldLinearVelocity(seed.0 * self.gain));
            true
        });
        Ok(())
    }
}
