//! The simulation runner.
//!
//! A [`SimulationRunner`] owns the entity-component manager and the loaded
//! systems, and drives them through ticks:
//!
//! 1. Drain control events (pause, stop).
//! 2. PreUpdate, Update and PostUpdate, each split into stages computed from
//!    the systems' declared access. Stages with more than one system run on
//!    the worker pool; the runner waits for each stage before the next.
//! 3. Advance the iteration counter and simulation time.
//! 4. Apply deferred entity removals and clear the new-entity set.
//! 5. Sleep out the rest of the update period.
//!
//! A failing system (error or panic) is logged and skipped for that phase;
//! the other systems and the tick carry on.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use sim_component::{Access, ComponentFactory, EcmReader, Entity, EntityComponentManager};
use sim_system::{
    Capabilities, ConfigureContext, Event, EventSink, LoadedSystem, Phase, QuerySubscription,
    System, SystemConfig, SystemManager, UpdateInfo,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::pacing::{Clock, Pacer, SystemClock};
use crate::pool::{Job, WorkerPool, panic_message};
use crate::scheduler::{self, RegisteredSystem};
use crate::world::{self, WorldDescription};

/// A configured system and everything the runner tracks about it.
struct SystemRecord {
    name: String,
    instance_id: Uuid,
    system: Box<dyn System>,
    capabilities: Capabilities,
    access: Access,
    subscriptions: Vec<QuerySubscription>,
}

impl SystemRecord {
    fn takes_part_in(&self, phase: Phase) -> bool {
        self.capabilities.contains(phase.capability())
            || self.subscriptions.iter().any(|sub| sub.phase == phase)
    }

    fn run_phase(
        &mut self,
        phase: Phase,
        info: &UpdateInfo,
        ecm: &EntityComponentManager,
    ) -> Result<()> {
        if self.capabilities.contains(phase.capability()) {
            match phase {
                Phase::PreUpdate => self.system.pre_update(info, ecm)?,
                Phase::Update => self.system.update(info, ecm)?,
                Phase::PostUpdate => self.system.post_update(info, EcmReader::new(ecm))?,
            }
        }
        for subscription in self.subscriptions.iter_mut().filter(|sub| sub.phase == phase) {
            subscription.dispatch(info, ecm)?;
        }
        Ok(())
    }
}

type SharedRecord = Arc<Mutex<SystemRecord>>;

/// Run one system's phase, logging instead of propagating failures.
fn execute_phase(
    record: &Mutex<SystemRecord>,
    phase: Phase,
    info: &UpdateInfo,
    ecm: &EntityComponentManager,
) {
    let mut record = record.lock();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| record.run_phase(phase, info, ecm)));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(
            system = %record.name,
            instance_id = %record.instance_id,
            %phase,
            error = ?err,
            "system failed"
        ),
        Err(payload) => {
            let message = panic_message(&*payload);
            error!(
                system = %record.name,
                instance_id = %record.instance_id,
                %phase,
                panic = %message,
                "system panicked"
            );
        }
    }
}

/// Cloneable handle for stopping a runner from another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the runner to stop. Observed at the next phase boundary.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct TimeState {
    sim_time: Duration,
    real_time: Duration,
    paused: bool,
}

/// Drives loaded systems against one world on a fixed wall-clock cadence.
///
/// All methods take `&self`; share the runner through an `Arc` to call
/// [`stop`](Self::stop) or the accessors while another thread is inside
/// [`run`](Self::run).
pub struct SimulationRunner {
    ecm: Arc<EntityComponentManager>,
    factory: ComponentFactory,
    manager: SystemManager,
    events: EventSink,
    control: Receiver<Event>,
    pool: WorkerPool,
    clock: Arc<dyn Clock>,
    pacer: Mutex<Pacer>,
    pending: Mutex<Vec<LoadedSystem>>,
    systems: RwLock<Vec<SharedRecord>>,
    run_lock: Mutex<()>,
    running: AtomicBool,
    stop: StopHandle,
    iterations: AtomicU64,
    time: Mutex<TimeState>,
    step_size: Duration,
    status_log_interval: u64,
    world_entity: Entity,
}

impl SimulationRunner {
    /// Build a runner for `world`.
    ///
    /// Creates every described entity and loads the requested systems.
    /// Systems the manager cannot resolve are logged and left out; the
    /// runner is still usable. Systems are configured by
    /// [`init_systems`](Self::init_systems) or the first [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::EmptyWorld`] if the world has neither entities
    /// nor systems, and [`RunnerError::WorkerPool`] if the worker threads
    /// cannot be spawned.
    pub fn new(
        world: &WorldDescription,
        manager: SystemManager,
        factory: ComponentFactory,
        config: RunnerConfig,
    ) -> Result<Self, RunnerError> {
        if world.is_empty() {
            return Err(RunnerError::EmptyWorld(world.name.clone()));
        }

        let events = EventSink::new();
        let control = events.subscribe();
        let mut runner = Self {
            ecm: Arc::new(EntityComponentManager::new()),
            factory,
            manager,
            events,
            control,
            pool: WorkerPool::new(config.worker_threads)?,
            clock: Arc::new(SystemClock),
            pacer: Mutex::new(Pacer::new(config.update_period(), config.overrun_warn_ratio)),
            pending: Mutex::new(Vec::new()),
            systems: RwLock::new(Vec::new()),
            run_lock: Mutex::new(()),
            running: AtomicBool::new(false),
            stop: StopHandle::default(),
            iterations: AtomicU64::new(0),
            time: Mutex::new(TimeState::default()),
            step_size: config.step_size(),
            status_log_interval: config.status_log_interval,
            world_entity: Entity::NULL,
        };
        runner.world_entity = runner.create_entities(world);

        info!(
            world = %world.name,
            entities = runner.ecm.entity_count(),
            systems = runner.system_count(),
            workers = runner.pool.size(),
            "simulation runner created"
        );
        Ok(runner)
    }

    /// Replace the clock used for pacing and time accounting.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create the entities of `world` and load its systems. Returns the new
    /// world entity.
    ///
    /// Newly loaded systems are configured before the next tick.
    pub fn create_entities(&self, world: &WorldDescription) -> Entity {
        let created = world::create_entities(&self.ecm, &self.factory, world);
        let report = self.manager.load(created.system_requests);
        if !report.unresolved.is_empty() {
            warn!(
                world = %world.name,
                unresolved = ?report.unresolved,
                "some systems could not be loaded"
            );
        }
        self.pending.lock().extend(report.loaded);
        created.world_entity
    }

    /// Configure every loaded system that has not been configured yet, in
    /// load order. A system whose configure fails is dropped.
    pub fn init_systems(&self) {
        let pending = std::mem::take(&mut *self.pending.lock());
        for loaded in pending {
            if let Some(record) = self.configure(loaded) {
                self.systems.write().push(Arc::new(Mutex::new(record)));
            }
        }
    }

    fn configure(&self, loaded: LoadedSystem) -> Option<SystemRecord> {
        let LoadedSystem {
            name,
            instance_id,
            entity,
            config,
            mut system,
        } = loaded;
        let capabilities = system.capabilities();

        let subscriptions = if capabilities.contains(Capabilities::CONFIGURE) {
            match self.configure_system(system.as_mut(), entity, &config) {
                Ok(subscriptions) => subscriptions,
                Err(reason) => {
                    error!(system = %name, %instance_id, %entity, error = %reason, "failed to configure system, excluding it");
                    return None;
                }
            }
        } else {
            Vec::new()
        };

        let access = system.access();
        debug!(system = %name, %instance_id, ?capabilities, subscriptions = subscriptions.len(), "configured system");
        Some(SystemRecord {
            name,
            instance_id,
            system,
            capabilities,
            access,
            subscriptions,
        })
    }

    fn configure_system(
        &self,
        system: &mut dyn System,
        entity: Entity,
        config: &SystemConfig,
    ) -> std::result::Result<Vec<QuerySubscription>, String> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut ctx = ConfigureContext::new(entity, config, &self.ecm, &self.events);
            system.configure(&mut ctx).map(|()| ctx.into_subscriptions())
        }));
        match outcome {
            Ok(Ok(subscriptions)) => Ok(subscriptions),
            Ok(Err(err)) => Err(format!("{err:#}")),
            Err(payload) => Err(panic_message(&*payload)),
        }
    }

    /// Run `iterations` ticks, or until stopped if `iterations` is zero.
    ///
    /// Returns `true` if the requested number of ticks completed (for zero,
    /// if the run ended through a stop request). Returns `false` if stopped
    /// early or if another thread is already running this runner.
    ///
    /// Stop requests made while no run is active are dropped.
    pub fn run(&self, iterations: u64) -> bool {
        let Some(_guard) = self.run_lock.try_lock() else {
            warn!("runner is already running, ignoring run request");
            return false;
        };
        self.settle_control();
        self.init_systems();
        self.running.store(true, Ordering::Release);

        let run_start = self.clock.now();
        let real_time_base = self.time.lock().real_time;
        self.pacer.lock().start(run_start);
        info!(iterations, start = self.iteration_count(), "simulation run started");

        let mut completed = 0u64;
        while iterations == 0 || completed < iterations {
            if self.stop.is_stop_requested() {
                break;
            }
            self.time.lock().real_time =
                real_time_base + self.clock.now().saturating_duration_since(run_start);
            if !self.tick() {
                break;
            }
            completed += 1;
            if iterations == 0 || completed < iterations {
                self.pacer.lock().pace(self.clock.as_ref());
            }
        }

        self.time.lock().real_time = real_time_base + self.clock.now().saturating_duration_since(run_start);
        self.running.store(false, Ordering::Release);
        self.settle_control();
        info!(completed, total = self.iteration_count(), "simulation run finished");
        iterations == 0 || completed == iterations
    }

    /// Run a single tick without pacing.
    ///
    /// Returns `false` if the tick was cut short by a stop request or the
    /// runner is busy on another thread.
    pub fn update_systems(&self) -> bool {
        let Some(_guard) = self.run_lock.try_lock() else {
            warn!("runner is already running, ignoring update request");
            return false;
        };
        self.settle_control();
        self.init_systems();
        let completed = self.tick();
        self.settle_control();
        completed
    }

    /// Apply pending pause events and drop any stop request, so a stop only
    /// ever ends the run it was raised in.
    fn settle_control(&self) {
        self.drain_control_events();
        self.stop.clear();
    }

    fn drain_control_events(&self) {
        for event in self.control.try_iter() {
            match event {
                Event::Pause(paused) => self.set_paused(paused),
                Event::Stop => self.stop.stop(),
                Event::Custom { .. } => {}
            }
        }
    }

    fn update_info(&self) -> UpdateInfo {
        let time = self.time.lock();
        UpdateInfo {
            iterations: self.iteration_count(),
            sim_time: time.sim_time,
            real_time: time.real_time,
            dt: if time.paused { Duration::ZERO } else { self.step_size },
            paused: time.paused,
        }
    }

    /// One full tick. Returns `false` if a stop request cut it short.
    fn tick(&self) -> bool {
        self.drain_control_events();
        let info = self.update_info();

        for phase in Phase::ALL {
            if self.stop.is_stop_requested() {
                debug!(iteration = info.iterations, %phase, "stop requested, abandoning tick");
                return false;
            }
            self.run_phase(phase, &info);
        }

        let iteration = self.iterations.fetch_add(1, Ordering::AcqRel) + 1;
        self.time.lock().sim_time += info.dt;

        let removed = self.ecm.process_remove_requests();
        self.ecm.clear_new_entities();

        if self.status_log_interval > 0 && iteration % self.status_log_interval == 0 {
            debug!(
                iteration,
                sim_time_ms = info.sim_time.as_millis() as u64,
                entities = self.ecm.entity_count(),
                removed,
                paused = info.paused,
                "simulation status"
            );
        }
        true
    }

    fn run_phase(&self, phase: Phase, info: &UpdateInfo) {
        let participants: Vec<(SharedRecord, RegisteredSystem)> = self
            .systems
            .read()
            .iter()
            .filter_map(|shared| {
                let record = shared.lock();
                record.takes_part_in(phase).then(|| {
                    let scheduled = RegisteredSystem {
                        name: record.name.clone(),
                        access: record.access.clone(),
                    };
                    (Arc::clone(shared), scheduled)
                })
            })
            .collect();
        if participants.is_empty() {
            return;
        }

        let scheduled: Vec<RegisteredSystem> =
            participants.iter().map(|(_, system)| system.clone()).collect();
        let stages = scheduler::compute_stages(&scheduled);

        self.ecm.begin_phase();
        for stage in &stages {
            if let [only] = stage.system_indices.as_slice() {
                execute_phase(&participants[*only].0, phase, info, &self.ecm);
                continue;
            }

            let jobs: Vec<Job> = stage
                .system_indices
                .iter()
                .map(|&idx| {
                    let record = Arc::clone(&participants[idx].0);
                    let ecm = Arc::clone(&self.ecm);
                    let info = *info;
                    Box::new(move || execute_phase(&record, phase, &info, &ecm)) as Job
                })
                .collect();
            for (result, &idx) in self.pool.run_batch(jobs).iter().zip(&stage.system_indices) {
                if let Err(payload) = result {
                    error!(
                        system = %participants[idx].1.name,
                        %phase,
                        panic = %panic_message(&**payload),
                        "worker job panicked"
                    );
                }
            }
        }
        self.ecm.end_phase();
    }

    /// Rewind time: call every Reset-capable system, then zero the
    /// iteration counter and the clocks.
    ///
    /// Returns `false` if a run is in progress.
    pub fn reset(&self) -> bool {
        let Some(_guard) = self.run_lock.try_lock() else {
            warn!("cannot reset while running");
            return false;
        };
        let info = self.update_info();
        for shared in self.systems.read().iter() {
            let mut record = shared.lock();
            if !record.capabilities.contains(Capabilities::RESET) {
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| record.system.reset(&info, &self.ecm)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(system = %record.name, error = ?err, "system failed to reset"),
                Err(payload) => {
                    let message = panic_message(&*payload);
                    error!(system = %record.name, panic = %message, "system panicked during reset");
                }
            }
        }
        self.iterations.store(0, Ordering::Release);
        *self.time.lock() = TimeState {
            paused: self.paused(),
            ..TimeState::default()
        };
        info!("simulation reset");
        true
    }

    /// Request the current run to stop at the next phase boundary.
    pub fn stop(&self) {
        self.stop.stop();
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Change the wall-clock update period. Applies from the next tick.
    pub fn set_update_period(&self, period: Duration) {
        self.pacer.lock().set_period(period);
    }

    #[must_use]
    pub fn update_period(&self) -> Duration {
        self.pacer.lock().period()
    }

    /// Paused ticks still run every phase, with `dt` zero and simulation
    /// time frozen.
    pub fn set_paused(&self, paused: bool) {
        let mut time = self.time.lock();
        if time.paused != paused {
            info!(paused, "simulation pause state changed");
        }
        time.paused = paused;
    }

    #[must_use]
    pub fn paused(&self) -> bool {
        self.time.lock().paused
    }

    /// Completed ticks since creation or the last reset.
    #[must_use]
    pub fn iteration_count(&self) -> u64 {
        self.iterations.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn sim_time(&self) -> Duration {
        self.time.lock().sim_time
    }

    /// Wall-clock time spent inside [`run`](Self::run).
    #[must_use]
    pub fn real_time(&self) -> Duration {
        self.time.lock().real_time
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.ecm.entity_count()
    }

    /// Loaded systems, configured or awaiting configuration.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.read().len() + self.pending.lock().len()
    }

    /// The entity created for the world description passed to
    /// [`new`](Self::new).
    #[must_use]
    pub fn world_entity(&self) -> Entity {
        self.world_entity
    }

    /// Shared access to the world store.
    #[must_use]
    pub fn ecm(&self) -> &Arc<EntityComponentManager> {
        &self.ecm
    }

    /// The sink systems publish events to.
    #[must_use]
    pub fn events(&self) -> &EventSink {
        &self.events
    }
}

impl std::fmt::Debug for SimulationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRunner")
            .field("iterations", &self.iteration_count())
            .field("running", &self.running())
            .field("entities", &self.entity_count())
            .field("systems", &self.system_count())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use sim_component::{ComponentAccess, EntityQuery, Name, declare_component, register_builtin_components};
    use sim_system::SystemRegistry;

    use super::*;
    use crate::pacing::SimulatedClock;
    use crate::world::{EntityDescription, SystemDescription};

    declare_component! {
        Counter(u32) = "test.Counter"
    }

    declare_component! {
        Marker(u32) = "test.Marker"
    }

    #[derive(Debug, Default)]
    struct Calls {
        configure: AtomicUsize,
        pre_update: AtomicUsize,
        update: AtomicUsize,
        post_update: AtomicUsize,
        reset: AtomicUsize,
    }

    impl Calls {
        fn get(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    /// Counts how often each phase is called.
    struct Probe {
        capabilities: Capabilities,
        calls: Arc<Calls>,
    }

    impl System for Probe {
        fn capabilities(&self) -> Capabilities {
            self.capabilities
        }

        fn configure(&mut self, _ctx: &mut ConfigureContext<'_>) -> Result<()> {
            self.calls.configure.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn pre_update(&mut self, _info: &UpdateInfo, _ecm: &EntityComponentManager) -> Result<()> {
            self.calls.pre_update.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn update(&mut self, _info: &UpdateInfo, _ecm: &EntityComponentManager) -> Result<()> {
            self.calls.update.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn post_update(&mut self, _info: &UpdateInfo, _ecm: EcmReader<'_>) -> Result<()> {
            self.calls.post_update.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn reset(&mut self, _info: &UpdateInfo, _ecm: &EntityComponentManager) -> Result<()> {
            self.calls.reset.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn world(systems: &[&str]) -> WorldDescription {
        WorldDescription {
            name: "test".to_string(),
            entities: vec![EntityDescription {
                name: "body".to_string(),
                ..EntityDescription::default()
            }],
            systems: systems
                .iter()
                .map(|name| SystemDescription {
                    name: (*name).to_string(),
                    config: serde_json::Value::Null,
                })
                .collect(),
        }
    }

    fn factory() -> ComponentFactory {
        let mut factory = ComponentFactory::new();
        register_builtin_components(&mut factory).unwrap();
        factory
    }

    fn config() -> RunnerConfig {
        RunnerConfig {
            worker_threads: 2,
            ..RunnerConfig::default()
        }
    }

    fn runner(registry: SystemRegistry, systems: &[&str]) -> SimulationRunner {
        SimulationRunner::new(&world(systems), SystemManager::new(registry), factory(), config())
            .unwrap()
            .with_clock(SimulatedClock::new(Duration::ZERO))
    }

    fn probe(registry: &mut SystemRegistry, name: &str, capabilities: Capabilities) -> Arc<Calls> {
        let calls = Arc::new(Calls::default());
        let shared = Arc::clone(&calls);
        registry
            .register(name, move || Probe {
                capabilities,
                calls: Arc::clone(&shared),
            })
            .unwrap();
        calls
    }

    #[test]
    fn test_run_counts_iterations() {
        let runner = runner(SystemRegistry::new(), &[]);
        assert!(runner.run(5));
        assert_eq!(runner.iteration_count(), 5);
        assert!(runner.run(3));
        assert_eq!(runner.iteration_count(), 8);
        assert!(!runner.running());
        assert_eq!(runner.sim_time(), Duration::from_millis(8));
    }

    #[test]
    fn test_empty_world_is_rejected() {
        let world = WorldDescription {
            name: "void".to_string(),
            ..WorldDescription::default()
        };
        let err = SimulationRunner::new(&world, SystemManager::new(SystemRegistry::new()), factory(), config())
            .unwrap_err();
        assert!(matches!(err, RunnerError::EmptyWorld(name) if name == "void"));
    }

    #[test]
    fn test_unresolved_system_still_runs() {
        let runner = runner(SystemRegistry::new(), &["does_not_exist"]);
        assert_eq!(runner.system_count(), 0);
        assert!(runner.run(1));
        assert_eq!(runner.iteration_count(), 1);
    }

    #[test]
    fn test_only_declared_phases_are_called() {
        let mut registry = SystemRegistry::new();
        let calls = probe(&mut registry, "pre_only", Capabilities::CONFIGURE | Capabilities::PRE_UPDATE);
        let runner = runner(registry, &["pre_only"]);

        runner.init_systems();
        runner.init_systems();
        assert!(runner.run(4));
        assert!(runner.reset());

        assert_eq!(Calls::get(&calls.configure), 1);
        assert_eq!(Calls::get(&calls.pre_update), 4);
        assert_eq!(Calls::get(&calls.update), 0);
        assert_eq!(Calls::get(&calls.post_update), 0);
        assert_eq!(Calls::get(&calls.reset), 0);
    }

    #[test]
    fn test_configure_skipped_without_capability() {
        let mut registry = SystemRegistry::new();
        let calls = probe(&mut registry, "updater", Capabilities::UPDATE | Capabilities::RESET);
        let runner = runner(registry, &["updater"]);

        assert!(runner.run(2));
        assert_eq!(Calls::get(&calls.configure), 0);
        assert_eq!(Calls::get(&calls.update), 2);

        assert!(runner.reset());
        assert_eq!(Calls::get(&calls.reset), 1);
        assert_eq!(runner.iteration_count(), 0);
        assert_eq!(runner.sim_time(), Duration::ZERO);
    }

    /// Emits a stop event from Update on a chosen iteration.
    struct StopAt {
        iteration: u64,
        events: Option<EventSink>,
    }

    impl System for StopAt {
        fn capabilities(&self) -> Capabilities {
            Capabilities::CONFIGURE | Capabilities::UPDATE
        }

        fn configure(&mut self, ctx: &mut ConfigureContext<'_>) -> Result<()> {
            self.events = Some(ctx.events.clone());
            Ok(())
        }

        fn update(&mut self, info: &UpdateInfo, _ecm: &EntityComponentManager) -> Result<()> {
            if info.iterations == self.iteration
                && let Some(events) = &self.events
            {
                events.emit(Event::Stop);
            }
            Ok(())
        }
    }

    #[test]
    fn test_stop_event_ends_run_early() {
        let mut registry = SystemRegistry::new();
        registry
            .register("stopper", || StopAt {
                iteration: 2,
                events: None,
            })
            .unwrap();
        let runner = runner(registry, &["stopper"]);

        assert!(!runner.run(10));
        assert_eq!(runner.iteration_count(), 3);
        assert!(!runner.running());

        assert!(runner.run(2));
        assert_eq!(runner.iteration_count(), 5);
    }

    #[test]
    fn test_stop_on_final_tick_does_not_carry_over() {
        let mut registry = SystemRegistry::new();
        registry
            .register("stopper", || StopAt {
                iteration: 1,
                events: None,
            })
            .unwrap();
        let runner = runner(registry, &["stopper"]);

        assert!(runner.run(2));
        assert_eq!(runner.iteration_count(), 2);

        assert!(runner.run(5));
        assert_eq!(runner.iteration_count(), 7);
    }

    #[test]
    fn test_stop_while_idle_is_dropped() {
        let runner = runner(SystemRegistry::new(), &[]);
        runner.stop();
        runner.stop_handle().stop();

        assert!(runner.run(3));
        assert_eq!(runner.iteration_count(), 3);

        runner.events().emit(Event::Stop);
        assert!(runner.update_systems());
        assert_eq!(runner.iteration_count(), 4);
    }

    /// Requests a stop directly mid-tick, from Update.
    struct StopMidTick(StopHandle);

    impl System for StopMidTick {
        fn capabilities(&self) -> Capabilities {
            Capabilities::UPDATE
        }

        fn update(&mut self, _info: &UpdateInfo, _ecm: &EntityComponentManager) -> Result<()> {
            self.0.stop();
            Ok(())
        }
    }

    #[test]
    fn test_interrupted_tick_is_not_counted() {
        let mut registry = SystemRegistry::new();
        let handle = StopHandle::default();
        let shared = handle.clone();
        registry.register("interrupt", move || StopMidTick(shared.clone())).unwrap();
        let post = probe(&mut registry, "observer", Capabilities::POST_UPDATE);

        let mut runner = runner(registry, &["interrupt", "observer"]);
        runner.stop = handle;

        assert!(!runner.run(5));
        assert_eq!(runner.iteration_count(), 0);
        assert_eq!(Calls::get(&post.post_update), 0);
    }

    #[test]
    fn test_stop_from_another_thread() {
        let runner = Arc::new(
            SimulationRunner::new(&world(&[]), SystemManager::new(SystemRegistry::new()), factory(), config())
                .unwrap(),
        );
        let handle = runner.stop_handle();
        let driver = {
            let runner = Arc::clone(&runner);
            std::thread::spawn(move || runner.run(0))
        };
        while runner.iteration_count() < 3 {
            std::thread::yield_now();
        }
        handle.stop();
        assert!(driver.join().unwrap());
        assert!(!runner.running());
        assert!(runner.real_time() > Duration::ZERO);
    }

    /// Blocks in Update until released.
    struct Gate {
        entered: crossbeam_channel::Sender<()>,
        release: crossbeam_channel::Receiver<()>,
    }

    impl System for Gate {
        fn capabilities(&self) -> Capabilities {
            Capabilities::UPDATE
        }

        fn update(&mut self, _info: &UpdateInfo, _ecm: &EntityComponentManager) -> Result<()> {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            Ok(())
        }
    }

    #[test]
    fn test_second_run_is_rejected() {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let mut registry = SystemRegistry::new();
        registry
            .register("gate", move || Gate {
                entered: entered_tx.clone(),
                release: release_rx.clone(),
            })
            .unwrap();
        let runner = Arc::new(runner(registry, &["gate"]));

        let driver = {
            let runner = Arc::clone(&runner);
            std::thread::spawn(move || runner.run(1))
        };
        entered_rx.recv().unwrap();
        assert!(runner.running());
        assert!(!runner.run(1));
        assert!(!runner.reset());
        release_tx.send(()).unwrap();

        assert!(driver.join().unwrap());
        assert_eq!(runner.iteration_count(), 1);
    }

    /// Fails or panics in Update, depending on `panic`.
    struct Faulty {
        panic: bool,
    }

    impl System for Faulty {
        fn capabilities(&self) -> Capabilities {
            Capabilities::UPDATE
        }

        fn access(&self) -> Access {
            ComponentAccess::new().write::<Marker>().into()
        }

        fn update(&mut self, _info: &UpdateInfo, _ecm: &EntityComponentManager) -> Result<()> {
            if self.panic {
                panic!("integrator exploded");
            }
            anyhow::bail!("integrator diverged")
        }
    }

    #[test]
    fn test_failing_systems_are_isolated() {
        let mut registry = SystemRegistry::new();
        registry.register("erring", || Faulty { panic: false }).unwrap();
        registry.register("panicking", || Faulty { panic: true }).unwrap();
        let calls = probe(&mut registry, "healthy", Capabilities::UPDATE | Capabilities::POST_UPDATE);
        let runner = runner(registry, &["erring", "panicking", "healthy"]);

        assert!(runner.run(3));
        assert_eq!(runner.iteration_count(), 3);
        assert_eq!(Calls::get(&calls.update), 3);
        assert_eq!(Calls::get(&calls.post_update), 3);
    }

    /// Fails to configure.
    struct Misconfigured;

    impl System for Misconfigured {
        fn capabilities(&self) -> Capabilities {
            Capabilities::CONFIGURE | Capabilities::UPDATE
        }

        fn configure(&mut self, _ctx: &mut ConfigureContext<'_>) -> Result<()> {
            anyhow::bail!("missing parameter 'gain'")
        }

        fn update(&mut self, _info: &UpdateInfo, _ecm: &EntityComponentManager) -> Result<()> {
            panic!("must never run");
        }
    }

    #[test]
    fn test_failed_configure_excludes_system() {
        let mut registry = SystemRegistry::new();
        registry.register("misconfigured", || Misconfigured).unwrap();
        let runner = runner(registry, &["misconfigured"]);
        assert_eq!(runner.system_count(), 1);

        runner.init_systems();
        assert_eq!(runner.system_count(), 0);
        assert!(runner.run(2));
    }

    /// Increments `Counter` on every entity carrying one.
    struct Increment;

    impl System for Increment {
        fn capabilities(&self) -> Capabilities {
            Capabilities::UPDATE
        }

        fn access(&self) -> Access {
            ComponentAccess::new().write::<Counter>().into()
        }

        fn update(&mut self, _info: &UpdateInfo, ecm: &EntityComponentManager) -> Result<()> {
            ecm.each::<(Counter,)>(|entity, (counter,)| {
                ecm.set_component(entity, Counter(counter.0 + 1));
                true
            });
            Ok(())
        }
    }

    /// Stamps `Marker` on every entity carrying one.
    struct Stamp;

    impl System for Stamp {
        fn capabilities(&self) -> Capabilities {
            Capabilities::UPDATE
        }

        fn access(&self) -> Access {
            ComponentAccess::new().write::<Marker>().into()
        }

        fn update(&mut self, _info: &UpdateInfo, ecm: &EntityComponentManager) -> Result<()> {
            ecm.each::<(Marker,)>(|entity, (marker,)| {
                ecm.set_component(entity, Marker(marker.0 + 10));
                true
            });
            Ok(())
        }
    }

    #[test]
    fn test_disjoint_systems_run_in_parallel_stage() {
        let mut registry = SystemRegistry::new();
        registry.register("increment", || Increment).unwrap();
        registry.register("stamp", || Stamp).unwrap();
        let runner = runner(registry, &["increment", "stamp"]);

        let entity = runner.ecm().create_entity();
        runner.ecm().set_component(entity, Counter(0));
        runner.ecm().set_component(entity, Marker(0));

        assert!(runner.run(5));
        assert_eq!(runner.ecm().component::<Counter>(entity), Some(Counter(5)));
        assert_eq!(runner.ecm().component::<Marker>(entity), Some(Marker(50)));
    }

    /// Spawns one named entity per Update and counts named entities through
    /// a query subscription.
    struct Spawner {
        seen: Arc<AtomicUsize>,
    }

    impl System for Spawner {
        fn capabilities(&self) -> Capabilities {
            Capabilities::CONFIGURE | Capabilities::UPDATE
        }

        fn configure(&mut self, ctx: &mut ConfigureContext<'_>) -> Result<()> {
            let seen = Arc::clone(&self.seen);
            ctx.add_query(Phase::Update, EntityQuery::new().with::<Name>(), move |_, _, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }

        fn update(&mut self, _info: &UpdateInfo, ecm: &EntityComponentManager) -> Result<()> {
            let entity = ecm.create_entity();
            ecm.create_component(entity, Name("spawned".to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_query_sees_entities_as_of_phase_start() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut registry = SystemRegistry::new();
        let shared = Arc::clone(&seen);
        registry
            .register("spawner", move || Spawner {
                seen: Arc::clone(&shared),
            })
            .unwrap();
        let runner = runner(registry, &["spawner"]);

        // World entity and "body" are named before the first tick.
        assert!(runner.update_systems());
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        // The entity spawned during tick 1 is visible from tick 2 on.
        assert!(runner.update_systems());
        assert_eq!(seen.load(Ordering::SeqCst), 2 + 3);
        assert_eq!(runner.entity_count(), 4);
    }

    /// Records `dt` and `paused` as seen in Update.
    struct TimeProbe(Arc<Mutex<Vec<(Duration, bool)>>>);

    impl System for TimeProbe {
        fn capabilities(&self) -> Capabilities {
            Capabilities::UPDATE
        }

        fn update(&mut self, info: &UpdateInfo, _ecm: &EntityComponentManager) -> Result<()> {
            self.0.lock().push((info.dt, info.paused));
            Ok(())
        }
    }

    #[test]
    fn test_paused_ticks_freeze_sim_time() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::clone(&seen);
        let mut registry = SystemRegistry::new();
        registry.register("time", move || TimeProbe(Arc::clone(&shared))).unwrap();
        let runner = runner(registry, &["time"]);

        assert!(runner.run(2));
        runner.set_paused(true);
        assert!(runner.run(2));
        runner.events().emit(Event::Pause(false));
        assert!(runner.run(1));

        assert!(!runner.paused());
        assert_eq!(runner.iteration_count(), 5);
        assert_eq!(runner.sim_time(), Duration::from_millis(3));
        let flags: Vec<bool> = seen.lock().iter().map(|(_, paused)| *paused).collect();
        assert_eq!(flags, vec![false, false, true, true, false]);
        assert_eq!(seen.lock()[2].0, Duration::ZERO);
    }

    #[test]
    fn test_runs_are_paced_by_update_period() {
        let clock = SimulatedClock::new(Duration::ZERO);
        let runner = SimulationRunner::new(&world(&[]), SystemManager::new(SystemRegistry::new()), factory(), config())
            .unwrap()
            .with_clock(clock.clone());

        runner.set_update_period(Duration::from_millis(5));
        assert!(runner.run(4));
        // Three sleeps between four ticks.
        let elapsed = clock.elapsed();
        assert!(elapsed.abs_diff(Duration::from_millis(15)) < Duration::from_micros(1));
        assert_eq!(runner.update_period(), Duration::from_millis(5));
    }

    #[test]
    fn test_deferred_removal_applied_at_tick_end() {
        let runner = runner(SystemRegistry::new(), &[]);
        let entity = runner.ecm().create_entity();
        runner.ecm().request_remove_entity(entity);
        assert!(runner.ecm().has_entity(entity));

        assert!(runner.update_systems());
        assert!(!runner.ecm().has_entity(entity));
    }
}
