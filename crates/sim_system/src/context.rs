//! Configure-time context and persistent query subscriptions.

use anyhow::{Result, bail};
use sim_component::{EcmReader, Entity, EntityComponentManager, EntityQuery};

use crate::config::SystemConfig;
use crate::event::EventSink;
use crate::system::{Phase, UpdateInfo};

pub type MutatingCallback =
    Box<dyn FnMut(&UpdateInfo, Entity, &EntityComponentManager) -> Result<()> + Send>;
pub type ObservingCallback = Box<dyn FnMut(&UpdateInfo, Entity, EcmReader<'_>) -> Result<()> + Send>;

/// The callback half of a [`QuerySubscription`].
pub enum QueryCallback {
    /// PreUpdate/Update callbacks get the manager.
    Mutating(MutatingCallback),
    /// PostUpdate callbacks get a read-only view.
    Observing(ObservingCallback),
}

/// A persistent (query, phase, callback) registration.
///
/// The runner evaluates every subscription of a system right after that
/// system's own phase method, calling the callback once per entity that
/// matches the query at that point.
pub struct QuerySubscription {
    pub phase: Phase,
    pub query: EntityQuery,
    callback: QueryCallback,
}

impl QuerySubscription {
    /// Run the callback for every matching entity. Stops at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the callback's error.
    pub fn dispatch(&mut self, info: &UpdateInfo, ecm: &EntityComponentManager) -> Result<usize> {
        let entities = ecm.query_entities(&self.query);
        for &entity in &entities {
            match &mut self.callback {
                QueryCallback::Mutating(callback) => callback(info, entity, ecm)?,
                QueryCallback::Observing(callback) => callback(info, entity, EcmReader::new(ecm))?,
            }
        }
        Ok(entities.len())
    }
}

impl std::fmt::Debug for QuerySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.callback {
            QueryCallback::Mutating(_) => "mutating",
            QueryCallback::Observing(_) => "observing",
        };
        f.debug_struct("QuerySubscription")
            .field("phase", &self.phase)
            .field("query", &self.query)
            .field("callback", &kind)
            .finish()
    }
}

/// Everything a system can reach while it is being configured.
pub struct ConfigureContext<'a> {
    /// The entity the system is attached to (the world entity for
    /// world-level systems).
    pub entity: Entity,
    pub config: &'a SystemConfig,
    pub ecm: &'a EntityComponentManager,
    pub events: &'a EventSink,
    subscriptions: Vec<QuerySubscription>,
}

impl<'a> ConfigureContext<'a> {
    #[must_use]
    pub fn new(
        entity: Entity,
        config: &'a SystemConfig,
        ecm: &'a EntityComponentManager,
        events: &'a EventSink,
    ) -> Self {
        Self {
            entity,
            config,
            ecm,
            events,
            subscriptions: Vec::new(),
        }
    }

    /// Subscribe `callback` to every entity matching `query` during a
    /// PreUpdate or Update phase.
    ///
    /// # Errors
    ///
    /// Fails for [`Phase::PostUpdate`], which only accepts observers (see
    /// [`add_observer`](Self::add_observer)).
    pub fn add_query(
        &mut self,
        phase: Phase,
        query: EntityQuery,
        callback: impl FnMut(&UpdateInfo, Entity, &EntityComponentManager) -> Result<()> + Send + 'static,
    ) -> Result<()> {
        if phase == Phase::PostUpdate {
            bail!("post_update queries are read-only; use add_observer");
        }
        self.subscriptions.push(QuerySubscription {
            phase,
            query,
            callback: QueryCallback::Mutating(Box::new(callback)),
        });
        Ok(())
    }

    /// Subscribe a read-only `callback` to every entity matching `query`
    /// during PostUpdate.
    pub fn add_observer(
        &mut self,
        query: EntityQuery,
        callback: impl FnMut(&UpdateInfo, Entity, EcmReader<'_>) -> Result<()> + Send + 'static,
    ) {
        self.subscriptions.push(QuerySubscription {
            phase: Phase::PostUpdate,
            query,
            callback: QueryCallback::Observing(Box::new(callback)),
        });
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Hand the registered subscriptions over to the caller.
    #[must_use]
    pub fn into_subscriptions(self) -> Vec<QuerySubscription> {
        self.subscriptions
    }
}
