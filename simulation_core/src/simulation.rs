//! The assembled engine.
//!
//! [`SimulationBuilder`] constructs every component once, hands each one its
//! collaborators explicitly, and wires the bus subscriptions the core reacts to.
//! [`Simulation`] is the facade a host drives.

use std::rc::{Rc, Weak};
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use scenario_rules::{
    ChoiceId, DecisionId, EventId, OutcomeSummary, PhaseId, ScenarioCatalog,
};

use crate::config::EngineConfig;
use crate::error::{InitError, NavigationError};
use crate::event_queue::{EventQueueManager, QueueSettings, RandomSource, SeededRandom};
use crate::events::{EventBus, SimEvent, Subscription, Topic};
use crate::phase::{PhaseOrchestrator, PhaseTransition};
use crate::rules::{AppliedEffects, EffectResult, RulesEngine};
use crate::store::{StateStore, StorageBackend};

/// Collects the collaborators of a [`Simulation`].
#[derive(Default)]
pub struct SimulationBuilder {
    catalog: Option<ScenarioCatalog>,
    config: EngineConfig,
    storage: Option<Box<dyn StorageBackend>>,
    random: Option<Box<dyn RandomSource>>,
    bus: Option<EventBus>,
}

impl SimulationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The scenario to run. Required.
    pub fn catalog(mut self, catalog: ScenarioCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist state through `storage`. Without one, state lives in memory only.
    pub fn storage(mut self, storage: impl StorageBackend + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    /// Randomness for curveballs. Defaults to an entropy-seeded generator.
    pub fn random(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Some(Box::new(random));
        self
    }

    /// Share an existing bus, e.g. one the UI already subscribed to.
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> Result<Simulation, InitError> {
        let catalog = self.catalog.ok_or(InitError::MissingCatalog)?;
        self.config.validate()?;

        let sequence = self.config.phase_sequence();
        catalog.validate(&sequence)?;

        let bus = self.bus.unwrap_or_default();
        let mut store = StateStore::new(bus.clone(), self.config.state_defaults());
        if let Some(storage) = self.storage {
            store = store.with_storage(storage, self.config.simulation.storage_key.clone());
        }
        store.load();

        let store = Rc::new(store);
        let catalog = Rc::new(catalog);
        let rules = Rc::new(RulesEngine::new(
            Rc::clone(&store),
            Rc::clone(&catalog),
            bus.clone(),
        ));
        let random = self
            .random
            .unwrap_or_else(|| Box::new(SeededRandom::from_entropy()));
        let queue = Rc::new(EventQueueManager::new(
            Rc::clone(&store),
            Rc::clone(&catalog),
            Rc::clone(&rules),
            random,
            QueueSettings::from_config(&self.config),
        ));
        let phases = PhaseOrchestrator::new(
            Rc::clone(&store),
            Rc::clone(&catalog),
            Rc::clone(&rules),
            sequence,
        );

        let subscriptions = wire_queue(&bus, &queue);

        let simulation = Simulation {
            config: self.config,
            bus,
            catalog,
            store,
            rules,
            queue,
            phases,
            subscriptions,
        };
        info!(
            scenario = simulation.catalog.meta.as_ref().map(|m| m.title.as_str()).unwrap_or(""),
            session_id = ?simulation.session_id(),
            phases = simulation.phases.sequence().len(),
            "simulation ready"
        );
        Ok(simulation)
    }
}

/// Subscribe the queue manager to the topics it reacts to.
fn wire_queue(bus: &EventBus, queue: &Rc<EventQueueManager>) -> Vec<Subscription> {
    let mut subscriptions = Vec::new();

    let weak = Rc::downgrade(queue);
    subscriptions.push(bus.subscribe(Topic::PhaseChanged, move |event| {
        if let (Some(queue), SimEvent::PhaseChanged { new_phase, .. }) = (weak.upgrade(), event) {
            queue.on_phase_changed(new_phase);
        }
    }));

    let weak = Rc::downgrade(queue);
    subscriptions.push(bus.subscribe(Topic::EventChoiceRequested, move |event| {
        if let (Some(queue), SimEvent::EventChoiceRequested { event_id, choice_id }) =
            (weak.upgrade(), event)
        {
            queue.handle_event_choice(event_id, choice_id);
        }
    }));

    let weak = Rc::downgrade(queue);
    subscriptions.push(bus.subscribe(Topic::EventDismissRequested, move |event| {
        if let (Some(queue), SimEvent::EventDismissRequested { event_id }) =
            (weak.upgrade(), event)
        {
            queue.dismiss_event(event_id);
        }
    }));

    let weak = Rc::downgrade(queue);
    subscriptions.push(bus.subscribe(Topic::PhaseTimerExpired, move |event| {
        if let (Some(queue), SimEvent::PhaseTimerExpired { phase }) = (weak.upgrade(), event) {
            queue.on_phase_timer_expired(phase);
        }
    }));

    let weak: Weak<EventQueueManager> = Rc::downgrade(queue);
    subscriptions.push(bus.subscribe(Topic::StateReset, move |_| {
        if let Some(queue) = weak.upgrade() {
            queue.clear();
        }
    }));

    subscriptions
}

/// A running workshop session.
pub struct Simulation {
    config: EngineConfig,
    bus: EventBus,
    catalog: Rc<ScenarioCatalog>,
    store: Rc<StateStore>,
    rules: Rc<RulesEngine>,
    queue: Rc<EventQueueManager>,
    phases: PhaseOrchestrator,
    subscriptions: Vec<Subscription>,
}

impl Simulation {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    /// Enter the first phase, or resume the phase restored from storage.
    pub fn start(&self) -> Result<PhaseId, NavigationError> {
        if let Some(current) = self.store.current_phase() {
            info!(phase = %current, "resuming session");
            self.queue.resync_from_state();
            return Ok(current);
        }

        let first = self
            .phases
            .sequence()
            .first()
            .cloned()
            .ok_or(NavigationError::NotStarted)?;
        self.phases.navigate_to_phase(&first)?;
        Ok(first)
    }

    pub fn process_decision(
        &self,
        decision_id: &DecisionId,
        choice_id: &ChoiceId,
    ) -> Option<EffectResult> {
        self.rules
            .process_decision(decision_id, choice_id, self.queue.as_ref())
    }

    pub fn choose_event_option(
        &self,
        event_id: &EventId,
        choice_id: &ChoiceId,
    ) -> Option<AppliedEffects> {
        self.queue.handle_event_choice(event_id, choice_id)
    }

    pub fn dismiss_event(&self, event_id: &EventId) -> bool {
        self.queue.dismiss_event(event_id)
    }

    /// Announce that the current phase's time limit ran out.
    ///
    /// Returns false before the first phase is entered.
    pub fn expire_phase_timer(&self) -> bool {
        let Some(phase) = self.store.current_phase() else {
            warn!("phase timer expired before the simulation started");
            return false;
        };
        self.bus.publish(SimEvent::PhaseTimerExpired { phase });
        true
    }

    /// Advance virtual time, activating delayed events. Returns how many fired.
    pub fn advance_time(&self, by: Duration) -> usize {
        self.queue.advance_time(by)
    }

    pub fn navigate_to_phase(&self, phase: &PhaseId) -> Result<PhaseTransition, NavigationError> {
        self.phases.navigate_to_phase(phase)
    }

    pub fn navigate_to_next_phase(&self) -> Result<PhaseTransition, NavigationError> {
        self.phases.navigate_to_next_phase()
    }

    pub fn navigate_to_previous_phase(&self) -> Result<PhaseTransition, NavigationError> {
        self.phases.navigate_to_previous_phase()
    }

    pub fn calculate_outcomes(&self) -> OutcomeSummary {
        self.rules.calculate_outcomes()
    }

    /// Start over from defaults. Queued events and timers are dropped.
    pub fn reset(&self, persist: bool) {
        self.store.reset(persist);
    }

    /// Start over but keep the `user` sub-tree.
    pub fn reset_keeping_user(&self, persist: bool) {
        self.store.reset_keeping_user(persist);
    }

    pub fn snapshot(&self) -> Value {
        self.store.snapshot()
    }

    /// Restore a snapshot. The event queue adopts its active event and drops
    /// anything else it was holding.
    pub fn restore(&self, snapshot: Value, persist: bool) {
        self.store.restore(snapshot, persist);
        self.queue.resync_from_state();
    }

    /// Identifier of the session held in the state tree. Changes on every reset.
    pub fn session_id(&self) -> Option<Uuid> {
        self.store.read(&["system", "sessionId"])
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn catalog(&self) -> &ScenarioCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }

    pub fn queue(&self) -> &EventQueueManager {
        &self.queue
    }

    pub fn phases(&self) -> &PhaseOrchestrator {
        &self.phases
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_queue::ScriptedRandom;
    use crate::store::MemoryStorage;
    use crate::test_support::workshop_catalog;

    fn simulation() -> Simulation {
        Simulation::builder()
            .catalog(workshop_catalog())
            .random(ScriptedRandom::never())
            .build()
            .unwrap()
    }

    #[test]
    fn test_missing_catalog_is_fatal() {
        assert!(matches!(
            Simulation::builder().build(),
            Err(InitError::MissingCatalog)
        ));
    }

    #[test]
    fn test_catalog_must_define_configured_phases() {
        let mut config = EngineConfig::default();
        config.simulation.phases.push("epilogue".to_string());

        let result = Simulation::builder()
            .catalog(workshop_catalog())
            .config(config)
            .build();
        assert!(matches!(result, Err(InitError::Scenario(_))));
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut config = EngineConfig::default();
        config.curveballs.probability = 2.0;

        let result = Simulation::builder()
            .catalog(workshop_catalog())
            .config(config)
            .build();
        assert!(matches!(result, Err(InitError::Config(_))));
    }

    #[test]
    fn test_out_of_range_starting_resources_are_fatal() {
        let mut config = EngineConfig::default();
        config.resources.budget = -500.0;
        config.resources.political_capital = 150.0;

        let result = Simulation::builder()
            .catalog(workshop_catalog())
            .config(config)
            .build();
        assert!(matches!(result, Err(InitError::Config(_))));
    }

    #[test]
    fn test_advance_time_to_the_end_of_time() {
        let sim = simulation();
        sim.start().unwrap();
        sim.advance_time(Duration::from_secs(1));
        sim.advance_time(Duration::MAX);

        assert_eq!(sim.queue().now(), Duration::MAX);
        assert_eq!(sim.queue().active_event(), Some(EventId::from("welcome-briefing")));
    }

    #[test]
    fn test_start_enters_first_phase_and_paces_entry_events() {
        let sim = simulation();
        assert_eq!(sim.start().unwrap(), PhaseId::from("briefing"));
        assert_eq!(sim.queue().active_event(), None);

        sim.advance_time(Duration::from_millis(1000));
        assert_eq!(sim.queue().active_event(), Some(EventId::from("welcome-briefing")));
    }

    #[test]
    fn test_inbound_requests_reach_the_queue() {
        let sim = simulation();
        sim.start().unwrap();
        sim.advance_time(Duration::from_secs(1));

        sim.bus().publish(SimEvent::EventDismissRequested {
            event_id: EventId::from("welcome-briefing"),
        });
        assert_eq!(sim.queue().active_event(), None);

        sim.navigate_to_phase(&PhaseId::from("funding")).unwrap();
        assert!(sim.expire_phase_timer());
        assert_eq!(sim.queue().active_event(), Some(EventId::from("budget-deadline")));

        sim.bus().publish(SimEvent::EventChoiceRequested {
            event_id: EventId::from("budget-deadline"),
            choice_id: ChoiceId::from("rush"),
        });
        assert_eq!(sim.store().resources().political_capital(), 65.0);
        assert_eq!(sim.queue().active_event(), None);
    }

    #[test]
    fn test_reset_clears_queue() {
        let sim = simulation();
        sim.start().unwrap();
        assert_eq!(sim.queue().pending_timers(), 1);

        let session = sim.session_id().unwrap();

        sim.reset(false);
        assert_eq!(sim.queue().pending_timers(), 0);
        assert_eq!(sim.store().current_phase(), None);
        assert_ne!(sim.session_id(), Some(session));
    }

    #[test]
    fn test_restart_resumes_persisted_phase() {
        let storage = MemoryStorage::new();
        {
            let sim = Simulation::builder()
                .catalog(workshop_catalog())
                .storage(storage.clone())
                .random(ScriptedRandom::never())
                .build()
                .unwrap();
            sim.start().unwrap();
            sim.navigate_to_phase(&PhaseId::from("planning")).unwrap();
        }

        let sim = Simulation::builder()
            .catalog(workshop_catalog())
            .storage(storage)
            .random(ScriptedRandom::never())
            .build()
            .unwrap();
        assert_eq!(sim.start().unwrap(), PhaseId::from("planning"));
        assert_eq!(sim.phases().phase_history().len(), 1);
    }

    #[test]
    fn test_dropping_the_simulation_unsubscribes() {
        let bus = EventBus::new();
        let sim = Simulation::builder()
            .catalog(workshop_catalog())
            .bus(bus.clone())
            .random(ScriptedRandom::never())
            .build()
            .unwrap();
        assert_eq!(bus.subscriber_count(Topic::PhaseChanged), 1);

        drop(sim);
        assert_eq!(bus.subscriber_count(Topic::PhaseChanged), 0);
    }
}
