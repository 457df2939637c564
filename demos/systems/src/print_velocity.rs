//! Logs entity velocities after each tick.

use anyhow::{Context, Result};
use sim_component::{EcmReader, EntityQuery, Name};
use sim_math::LinearVelocity;
use sim_system::{Capabilities, ConfigureContext, System, UpdateInfo};
use tracing::info;

pub const NAME: &str = "print_velocity";

const DEFAULT_EVERY: u64 = 100;

/// Observer that logs every entity's [`LinearVelocity`] once every `every`
/// iterations (parameter `every`, default 100).
#[derive(Debug, Clone, Default)]
pub struct PrintVelocity {
    every: u64,
}

fn should_print(info: &UpdateInfo, every: u64) -> bool {
    every > 0 && info.iterations % every == 0
}

impl System for PrintVelocity {
    fn capabilities(&self) -> Capabilities {
        Capabilities::CONFIGURE
    }

    fn access(&self) -> sim_component::Access {
        sim_component::ComponentAccess::new()
            .read::<LinearVelocity>()
            .read::<Name>()
            .into()
    }

    fn configure(&mut self, ctx: &mut ConfigureContext<'_>) -> Result<()> {
        self.every = match ctx.config.param("every") {
            Some(value) => value.as_u64().context("'every' must be a non-negative integer")?,
            None => DEFAULT_EVERY,
        };
        let every = self.every;
        ctx.add_observer(
            EntityQuery::new().with::<LinearVelocity>(),
            move |info: &UpdateInfo, entity, reader: EcmReader<'_>| {
                if !should_print(info, every) {
                    return Ok(());
                }
                let name = reader
                    .component::<Name>(entity)
                    .map_or_else(|| entity.to_string(), |name| name.0);
                if let Some(LinearVelocity(velocity)) = reader.component::<LinearVelocity>(entity) {
                    info!(
                        iteration = info.iterations,
                        entity = %name,
                        x = velocity.x,
                        y = velocity.y,
                        z = velocity.z,
                        "linear velocity"
                    );
                }
                Ok(())
            },
        );
        Ok(())
    }
}
