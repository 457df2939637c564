//! The [`System`] trait and its capability set.
//!
//! A system implements any subset of the lifecycle phases. Which ones it
//! implements is declared once through [`System::capabilities`]; the runner
//! reads the set when the system is registered and never calls a phase the
//! system did not declare.

use std::ops::BitOr;
use std::time::Duration;

use anyhow::Result;
use sim_component::{Access, EcmReader, EntityComponentManager};

use crate::context::ConfigureContext;

/// The set of lifecycle phases a system implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const CONFIGURE: Self = Self(1);
    pub const PRE_UPDATE: Self = Self(1 << 1);
    pub const UPDATE: Self = Self(1 << 2);
    pub const POST_UPDATE: Self = Self(1 << 3);
    pub const RESET: Self = Self(1 << 4);

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// One of the three per-tick phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    PreUpdate,
    Update,
    PostUpdate,
}

impl Phase {
    /// Phases in execution order.
    pub const ALL: [Phase; 3] = [Phase::PreUpdate, Phase::Update, Phase::PostUpdate];

    /// The capability a system needs to take part in this phase.
    #[must_use]
    pub const fn capability(self) -> Capabilities {
        match self {
            Phase::PreUpdate => Capabilities::PRE_UPDATE,
            Phase::Update => Capabilities::UPDATE,
            Phase::PostUpdate => Capabilities::POST_UPDATE,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Phase::PreUpdate => "pre_update",
            Phase::Update => "update",
            Phase::PostUpdate => "post_update",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Timing information handed to every phase call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpdateInfo {
    /// Completed iterations before this tick.
    pub iterations: u64,
    /// Simulation time at the start of this tick.
    pub sim_time: Duration,
    /// Wall-clock time spent running, summed over all `run` calls.
    pub real_time: Duration,
    /// Simulation step for this tick; zero while paused.
    pub dt: Duration,
    /// Whether the simulation is paused.
    pub paused: bool,
}

/// A pluggable unit of simulation behaviour.
///
/// Every phase method has a no-op default; [`capabilities`](Self::capabilities)
/// decides which of them the runner actually calls. Phase methods receive the
/// manager only for the duration of the call. PostUpdate gets a read-only
/// [`EcmReader`].
///
/// An `Err` from any phase is logged by the runner and does not affect other
/// systems. An `Err` from [`configure`](Self::configure) excludes the system.
pub trait System: Send {
    /// Which lifecycle phases this system implements.
    fn capabilities(&self) -> Capabilities;

    /// The component types this system touches during its update phases.
    ///
    /// Queried after [`configure`](Self::configure). Systems that keep the
    /// default ([`Access::Exclusive`]) never run alongside another system.
    fn access(&self) -> Access {
        Access::Exclusive
    }

    fn configure(&mut self, _ctx: &mut ConfigureContext<'_>) -> Result<()> {
        Ok(())
    }

    fn pre_update(&mut self, _info: &UpdateInfo, _ecm: &EntityComponentManager) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, _info: &UpdateInfo, _ecm: &EntityComponentManager) -> Result<()> {
        Ok(())
    }

    fn post_update(&mut self, _info: &UpdateInfo, _ecm: EcmReader<'_>) -> Result<()> {
        Ok(())
    }

    /// Called when simulation state is rewound.
    fn reset(&mut self, _info: &UpdateInfo, _ecm: &EntityComponentManager) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_union_and_contains() {
        let caps = Capabilities::CONFIGURE | Capabilities::PRE_UPDATE;
        assert!(caps.contains(Capabilities::CONFIGURE));
        assert!(caps.contains(Capabilities::PRE_UPDATE));
        assert!(!caps.contains(Capabilities::UPDATE));
        assert!(!caps.contains(Capabilities::PRE_UPDATE | Capabilities::POST_UPDATE));
        assert!(Capabilities::NONE.is_empty());
    }

    #[test]
    fn test_phase_capabilities_are_distinct() {
        let all = Phase::ALL
            .iter()
            .fold(Capabilities::NONE, |acc, phase| acc | phase.capability());
        assert_eq!(
            all,
            Capabilities::PRE_UPDATE | Capabilities::UPDATE | Capabilities::POST_UPDATE
        );
        assert_eq!(Phase::Update.to_string(), "update");
    }
}
