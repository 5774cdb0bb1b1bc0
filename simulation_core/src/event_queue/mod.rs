//! Event queue manager - the single-active-event discipline.
//!
//! At most one scenario event is presented at a time. Events requested while
//! another is active wait in a FIFO queue; events requested with a delay wait on a
//! [`DelayScheduler`] timer. Resolving the active event (by choice or dismissal)
//! dispatches the oldest ready entry.
//!
//! Internal `RefCell` borrows are always released before touching the state store
//! or the bus, so handlers may call back into the manager.

mod random;
mod scheduler;

pub use random::*;
pub use scheduler::*;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, warn};

use scenario_rules::{ChoiceId, EventConditions, EventId, PhaseId, ScenarioCatalog};

use crate::config::EngineConfig;
use crate::events::{EventBus, SimEvent};
use crate::rules::{AppliedEffects, EventSink, RulesEngine};
use crate::store::StateStore;

/// A queued event, optionally still waiting on its delay timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub event_id: EventId,
    pub timer: Option<TaskId>,
}

/// Whether an event is currently being presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueStatus {
    Idle,
    EventActive(EventId),
}

/// Pacing and curveball parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    pub phase_entry_delay: Duration,
    pub curveball_delay: Duration,
    pub curveball_probability: f64,
    pub curveballs_enabled: bool,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl QueueSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            phase_entry_delay: config.phase_entry_delay(),
            curveball_delay: config.curveball_delay(),
            curveball_probability: config.curveballs.probability,
            curveballs_enabled: config.curveballs.enabled,
        }
    }
}

#[derive(Default)]
struct QueueState {
    active: Option<EventId>,
    entries: VecDeque<QueueEntry>,
}

/// Owns the event queue, the active event slot and the delay timers.
pub struct EventQueueManager {
    store: Rc<StateStore>,
    catalog: Rc<ScenarioCatalog>,
    rules: Rc<RulesEngine>,
    bus: EventBus,
    scheduler: DelayScheduler<EventId>,
    random: RefCell<Box<dyn RandomSource>>,
    settings: QueueSettings,
    state: RefCell<QueueState>,
}

impl EventQueueManager {
    /// Create a manager. An active event already recorded in the store is adopted.
    pub fn new(
        store: Rc<StateStore>,
        catalog: Rc<ScenarioCatalog>,
        rules: Rc<RulesEngine>,
        random: Box<dyn RandomSource>,
        settings: QueueSettings,
    ) -> Self {
        let bus = store.bus().clone();
        let active = store.active_event();
        Self {
            store,
            catalog,
            rules,
            bus,
            scheduler: DelayScheduler::new(),
            random: RefCell::new(random),
            settings,
            state: RefCell::new(QueueState {
                active,
                entries: VecDeque::new(),
            }),
        }
    }

    /// Request an event, now or after `delay`.
    ///
    /// Returns false if the event is unknown or its conditions do not hold.
    pub fn queue_event(&self, event_id: &EventId, delay: Duration) -> bool {
        let Some(event) = self.catalog.event(event_id) else {
            warn!(event_id = %event_id, "cannot queue unknown event");
            return false;
        };
        if let Some(conditions) = &event.conditions {
            if !self.check_event_conditions(conditions) {
                debug!(event_id = %event_id, "event conditions not met, not queueing");
                return false;
            }
        }

        if !delay.is_zero() {
            let timer = self.scheduler.schedule(delay, event_id.clone());
            self.state.borrow_mut().entries.push_back(QueueEntry {
                event_id: event_id.clone(),
                timer: Some(timer),
            });
            debug!(event_id = %event_id, delay_ms = delay.as_millis() as u64, %timer, "event scheduled");
            return true;
        }

        let active = self.state.borrow().active.is_some();
        if active {
            self.state.borrow_mut().entries.push_back(QueueEntry {
                event_id: event_id.clone(),
                timer: None,
            });
            debug!(event_id = %event_id, "event queued behind active event");
            true
        } else {
            self.trigger_event(event_id)
        }
    }

    /// Activate an event now, or re-queue it if another event is active.
    ///
    /// A re-queued event goes back through [`Self::queue_event`], so its conditions
    /// are checked again.
    pub fn trigger_event(&self, event_id: &EventId) -> bool {
        let Some(event) = self.catalog.event(event_id) else {
            warn!(event_id = %event_id, "cannot trigger unknown event");
            return false;
        };

        self.remove_entries(event_id);

        let active = self.state.borrow().active.clone();
        if let Some(active) = active {
            if &active == event_id {
                debug!(event_id = %event_id, "event already active");
                return true;
            }
            debug!(event_id = %event_id, active = %active, "event active, re-queueing");
            return self.queue_event(event_id, Duration::ZERO);
        }

        self.state.borrow_mut().active = Some(event_id.clone());
        self.store.set_active_event(Some(event_id));
        self.store.mark_event_seen(event_id);

        info!(event_id = %event_id, kind = ?event.kind, "showing event");
        self.bus.publish(SimEvent::ShowEvent {
            event_id: event_id.clone(),
            event: event.clone(),
        });
        true
    }

    /// Resolve the active event with one of its choices.
    ///
    /// Returns `None` if `event_id` is not the active event or the choice is unknown;
    /// the event then stays active.
    pub fn handle_event_choice(
        &self,
        event_id: &EventId,
        choice_id: &ChoiceId,
    ) -> Option<AppliedEffects> {
        if !self.is_active(event_id) {
            warn!(event_id = %event_id, "choice for an event that is not active");
            return None;
        }
        let event = self.catalog.event(event_id)?;
        let Some(choice) = event.choice(choice_id) else {
            warn!(event_id = %event_id, choice_id = %choice_id, "unknown choice for event");
            return None;
        };

        self.store.record_event_choice(event_id, choice_id);
        let mut effects = self.rules.apply_effects(&choice.effects);

        for follow_up in choice.triggers_events.iter().chain(&event.triggers_events) {
            if self.queue_event(follow_up, Duration::ZERO) {
                effects.triggered_events.push(follow_up.clone());
            }
        }

        self.deactivate();
        info!(event_id = %event_id, choice_id = %choice_id, "event choice processed");
        self.bus.publish(SimEvent::EventChoiceProcessed {
            event_id: event_id.clone(),
            choice_id: choice_id.clone(),
            effects: effects.clone(),
        });

        self.dispatch_next();
        Some(effects)
    }

    /// Close the active event without applying any effects.
    pub fn dismiss_event(&self, event_id: &EventId) -> bool {
        if !self.is_active(event_id) {
            warn!(event_id = %event_id, "dismiss for an event that is not active");
            return false;
        }

        self.deactivate();
        info!(event_id = %event_id, "event dismissed");
        self.bus.publish(SimEvent::EventDismissed {
            event_id: event_id.clone(),
        });

        self.dispatch_next();
        true
    }

    /// Evaluate event conditions against the current state.
    ///
    /// Categories that are absent hold vacuously. A `None` requirement on a decision
    /// or event choice accepts any recorded choice.
    pub fn check_event_conditions(&self, conditions: &EventConditions) -> bool {
        if let Some(phase) = &conditions.phase {
            if self.store.current_phase().as_ref() != Some(phase) {
                return false;
            }
        }

        if !conditions.resources.is_empty() {
            let resources = self.store.resources();
            let in_range = conditions
                .resources
                .iter()
                .all(|(name, range)| range.contains(resources.get(name)));
            if !in_range {
                return false;
            }
        }

        if !conditions.decisions.is_empty() {
            let decisions = self.store.decisions();
            let satisfied = conditions.decisions.iter().all(|(decision, required)| {
                match (decisions.get(decision), required) {
                    (Some(made), Some(required)) => made == required,
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            });
            if !satisfied {
                return false;
            }
        }

        if !conditions.event_choices.is_empty() {
            let choices = self.store.event_choices();
            let satisfied = conditions.event_choices.iter().all(|(event, required)| {
                match (choices.get(event), required) {
                    (Some(made), Some(required)) => made == required,
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            });
            if !satisfied {
                return false;
            }
        }

        true
    }

    /// Roll for a curveball in `phase` and queue it with the curveball delay.
    ///
    /// Candidates are the phase's curveballs whose conditions hold and which are not
    /// already seen, queued or active. No roll is made when there are none.
    pub fn maybe_trigger_curveball(&self, phase: &PhaseId) -> Option<EventId> {
        if !self.settings.curveballs_enabled {
            return None;
        }

        let candidates: Vec<EventId> = self
            .catalog
            .curveballs_for_phase(phase)
            .filter(|(id, event)| {
                !self.store.has_seen(id)
                    && !self.is_pending_or_active(id)
                    && event
                        .conditions
                        .as_ref()
                        .map_or(true, |c| self.check_event_conditions(c))
            })
            .map(|(id, _)| id.clone())
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let picked = {
            let mut random = self.random.borrow_mut();
            let roll = random.next_f64();
            if roll >= self.settings.curveball_probability {
                debug!(phase = %phase, roll, "no curveball this time");
                return None;
            }
            candidates[random.next_index(candidates.len())].clone()
        };

        info!(phase = %phase, event_id = %picked, "curveball triggered");
        if self.queue_event(&picked, self.settings.curveball_delay) {
            Some(picked)
        } else {
            None
        }
    }

    /// Queue the entry events of a phase that was just entered, then roll for a curveball.
    pub fn on_phase_changed(&self, phase: &PhaseId) {
        let Some(definition) = self.catalog.phase(phase) else {
            warn!(phase = %phase, "phase change to unknown phase");
            return;
        };
        for event_id in &definition.entry_events {
            self.queue_event(event_id, self.settings.phase_entry_delay);
        }
        self.maybe_trigger_curveball(phase);
    }

    /// Queue the time-expired events of a phase.
    pub fn on_phase_timer_expired(&self, phase: &PhaseId) {
        let Some(definition) = self.catalog.phase(phase) else {
            warn!(phase = %phase, "timer expired for unknown phase");
            return;
        };
        info!(phase = %phase, "phase timer expired");
        for event_id in &definition.time_expired_events {
            self.queue_event(event_id, Duration::ZERO);
        }
    }

    /// Move virtual time forward and activate every entry whose delay ran out.
    ///
    /// Returns how many timers fired.
    pub fn advance_time(&self, by: Duration) -> usize {
        let fired = self.scheduler.advance(by);
        let count = fired.len();
        for (timer, event_id) in fired {
            self.on_timer_fired(timer, &event_id);
        }
        count
    }

    fn on_timer_fired(&self, timer: TaskId, event_id: &EventId) {
        let removed = {
            let mut state = self.state.borrow_mut();
            let position = state.entries.iter().position(|e| e.timer == Some(timer));
            position.and_then(|i| state.entries.remove(i))
        };
        if removed.is_none() {
            debug!(event_id = %event_id, %timer, "stale timer ignored");
            return;
        }
        self.trigger_event(event_id);
    }

    /// Cancel every timer and forget the queue and the active event.
    pub fn clear(&self) {
        let entries = {
            let mut state = self.state.borrow_mut();
            state.active = None;
            std::mem::take(&mut state.entries)
        };
        for entry in entries {
            if let Some(timer) = entry.timer {
                self.scheduler.cancel(timer);
            }
        }
        if self.store.active_event().is_some() {
            self.store.set_active_event(None);
        }
        debug!("event queue cleared");
    }

    /// Drop queued entries and adopt the active event recorded in the store.
    pub fn resync_from_state(&self) {
        let entries = {
            let mut state = self.state.borrow_mut();
            std::mem::take(&mut state.entries)
        };
        for entry in entries {
            if let Some(timer) = entry.timer {
                self.scheduler.cancel(timer);
            }
        }
        let active = self.store.active_event();
        self.state.borrow_mut().active = active;
    }

    pub fn status(&self) -> QueueStatus {
        match &self.state.borrow().active {
            Some(id) => QueueStatus::EventActive(id.clone()),
            None => QueueStatus::Idle,
        }
    }

    pub fn active_event(&self) -> Option<EventId> {
        self.state.borrow().active.clone()
    }

    /// Queued event ids, oldest first, including those still waiting on a timer.
    pub fn queued_events(&self) -> Vec<EventId> {
        self.state
            .borrow()
            .entries
            .iter()
            .map(|e| e.event_id.clone())
            .collect()
    }

    /// Elapsed virtual time.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending_count()
    }

    fn is_active(&self, event_id: &EventId) -> bool {
        self.state.borrow().active.as_ref() == Some(event_id)
    }

    fn is_pending_or_active(&self, event_id: &EventId) -> bool {
        let state = self.state.borrow();
        state.active.as_ref() == Some(event_id)
            || state.entries.iter().any(|e| &e.event_id == event_id)
    }

    fn deactivate(&self) {
        self.state.borrow_mut().active = None;
        self.store.set_active_event(None);
    }

    /// Activate the oldest entry that is not waiting on a timer.
    fn dispatch_next(&self) {
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                if state.active.is_some() {
                    return;
                }
                let position = state.entries.iter().position(|e| match e.timer {
                    Some(timer) => !self.scheduler.is_pending(timer),
                    None => true,
                });
                position.and_then(|i| state.entries.remove(i))
            };
            let Some(entry) = next else {
                return;
            };
            if self.trigger_event(&entry.event_id) {
                return;
            }
        }
    }

    /// Remove queued entries for `event_id`, cancelling their timers.
    fn remove_entries(&self, event_id: &EventId) {
        let removed = {
            let mut state = self.state.borrow_mut();
            let (matching, kept): (VecDeque<QueueEntry>, _) = std::mem::take(&mut state.entries)
                .into_iter()
                .partition(|e| &e.event_id == event_id);
            state.entries = kept;
            matching
        };
        for entry in removed {
            if let Some(timer) = entry.timer {
                self.scheduler.cancel(timer);
            }
        }
    }
}

impl EventSink for EventQueueManager {
    fn queue_event(&self, event_id: &EventId, delay: Duration) -> bool {
        EventQueueManager::queue_event(self, event_id, delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Topic;
    use crate::store::StateDefaults;
    use crate::test_support::workshop_catalog;
    use scenario_rules::{DecisionId, Resources, StakeholderId};

    struct Harness {
        queue: EventQueueManager,
        store: Rc<StateStore>,
        shown: Rc<RefCell<Vec<EventId>>>,
    }

    fn harness(random: ScriptedRandom) -> Harness {
        let bus = EventBus::new();
        let store = Rc::new(StateStore::new(bus.clone(), StateDefaults::default()));
        let catalog = Rc::new(workshop_catalog());
        let rules = Rc::new(RulesEngine::new(
            Rc::clone(&store),
            Rc::clone(&catalog),
            bus.clone(),
        ));
        let queue = EventQueueManager::new(
            Rc::clone(&store),
            catalog,
            rules,
            Box::new(random),
            QueueSettings::default(),
        );

        let shown = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&shown);
        let _ = bus.subscribe(Topic::ShowEvent, move |event| {
            if let SimEvent::ShowEvent { event_id, .. } = event {
                log.borrow_mut().push(event_id.clone());
            }
        });

        Harness {
            queue,
            store,
            shown,
        }
    }

    fn id(raw: &str) -> EventId {
        EventId::from(raw)
    }

    #[test]
    fn test_queue_while_idle_activates_immediately() {
        let h = harness(ScriptedRandom::never());

        assert!(h.queue.queue_event(&id("welcome-briefing"), Duration::ZERO));
        assert_eq!(h.queue.status(), QueueStatus::EventActive(id("welcome-briefing")));
        assert_eq!(h.store.active_event(), Some(id("welcome-briefing")));
        assert!(h.store.has_seen(&id("welcome-briefing")));
        assert_eq!(*h.shown.borrow(), vec![id("welcome-briefing")]);
    }

    #[test]
    fn test_fifo_while_active() {
        let h = harness(ScriptedRandom::never());
        h.queue.queue_event(&id("welcome-briefing"), Duration::ZERO);
        h.queue.queue_event(&id("contractor-delay"), Duration::ZERO);
        h.queue.queue_event(&id("budget-deadline"), Duration::ZERO);

        // Only one event is ever active.
        assert_eq!(h.shown.borrow().len(), 1);
        assert_eq!(
            h.queue.queued_events(),
            vec![id("contractor-delay"), id("budget-deadline")]
        );

        h.queue
            .handle_event_choice(&id("welcome-briefing"), &ChoiceId::from("acknowledge"))
            .unwrap();
        assert_eq!(h.queue.active_event(), Some(id("contractor-delay")));

        h.queue.dismiss_event(&id("contractor-delay"));
        assert_eq!(h.queue.active_event(), Some(id("budget-deadline")));

        h.queue.dismiss_event(&id("budget-deadline"));
        assert_eq!(h.queue.status(), QueueStatus::Idle);
        assert_eq!(h.store.active_event(), None);
        assert_eq!(
            *h.shown.borrow(),
            vec![
                id("welcome-briefing"),
                id("contractor-delay"),
                id("budget-deadline")
            ]
        );
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let h = harness(ScriptedRandom::never());
        assert!(!h.queue.queue_event(&id("nope"), Duration::ZERO));
        assert!(!h.queue.trigger_event(&id("nope")));
        assert_eq!(h.queue.status(), QueueStatus::Idle);
        assert!(h.queue.queued_events().is_empty());
    }

    #[test]
    fn test_unmet_conditions_are_not_queued() {
        let h = harness(ScriptedRandom::never());
        assert!(!h.queue.queue_event(&id("ministry-praise"), Duration::ZERO));
        assert!(h.shown.borrow().is_empty());
    }

    #[test]
    fn test_delayed_activation() {
        let h = harness(ScriptedRandom::never());
        assert!(h.queue.queue_event(&id("donor-visit"), Duration::from_millis(1000)));
        assert_eq!(h.queue.status(), QueueStatus::Idle);
        assert_eq!(h.queue.pending_timers(), 1);

        assert_eq!(h.queue.advance_time(Duration::from_millis(999)), 0);
        assert_eq!(h.queue.status(), QueueStatus::Idle);

        assert_eq!(h.queue.advance_time(Duration::from_millis(1)), 1);
        assert_eq!(h.queue.active_event(), Some(id("donor-visit")));
        assert!(h.queue.queued_events().is_empty());
    }

    #[test]
    fn test_timer_firing_while_active_waits_its_turn() {
        let h = harness(ScriptedRandom::never());
        h.queue.queue_event(&id("donor-visit"), Duration::from_millis(500));
        h.queue.queue_event(&id("welcome-briefing"), Duration::ZERO);
        h.queue.queue_event(&id("contractor-delay"), Duration::ZERO);

        h.queue.advance_time(Duration::from_millis(500));
        assert_eq!(h.queue.active_event(), Some(id("welcome-briefing")));
        assert_eq!(
            h.queue.queued_events(),
            vec![id("contractor-delay"), id("donor-visit")]
        );

        h.queue.dismiss_event(&id("welcome-briefing"));
        assert_eq!(h.queue.active_event(), Some(id("contractor-delay")));
        h.queue.dismiss_event(&id("contractor-delay"));
        assert_eq!(h.queue.active_event(), Some(id("donor-visit")));
    }

    #[test]
    fn test_pending_entries_are_not_pulled_forward() {
        let h = harness(ScriptedRandom::never());
        h.queue.queue_event(&id("welcome-briefing"), Duration::ZERO);
        h.queue.queue_event(&id("donor-visit"), Duration::from_secs(10));

        h.queue.dismiss_event(&id("welcome-briefing"));
        assert_eq!(h.queue.status(), QueueStatus::Idle);
        assert_eq!(h.queue.queued_events(), vec![id("donor-visit")]);
    }

    #[test]
    fn test_trigger_cancels_pending_timer() {
        let h = harness(ScriptedRandom::never());
        h.queue.queue_event(&id("donor-visit"), Duration::from_millis(1000));

        assert!(h.queue.trigger_event(&id("donor-visit")));
        assert_eq!(h.queue.pending_timers(), 0);
        assert!(h.queue.queued_events().is_empty());

        h.queue.dismiss_event(&id("donor-visit"));
        assert_eq!(h.queue.advance_time(Duration::from_secs(5)), 0);
        assert_eq!(h.shown.borrow().len(), 1);
    }

    #[test]
    fn test_trigger_while_active_requeues_once() {
        let h = harness(ScriptedRandom::never());
        h.queue.trigger_event(&id("welcome-briefing"));
        h.queue.queue_event(&id("donor-visit"), Duration::ZERO);
        h.queue.queue_event(&id("contractor-delay"), Duration::ZERO);

        h.queue.trigger_event(&id("donor-visit"));
        assert_eq!(h.queue.active_event(), Some(id("welcome-briefing")));
        assert_eq!(
            h.queue.queued_events(),
            vec![id("contractor-delay"), id("donor-visit")]
        );
    }

    #[test]
    fn test_requeue_rechecks_conditions() {
        let h = harness(ScriptedRandom::never());
        h.store.set_current_phase(&PhaseId::from("funding"), false);
        h.store.set_resources(&Resources::new(500_000.0, 85.0, 100.0), false);
        h.store.record_decision(
            &DecisionId::from("projectScope"),
            &ChoiceId::from("full-network"),
        );

        h.queue.trigger_event(&id("welcome-briefing"));
        assert!(h.queue.queue_event(&id("ministry-praise"), Duration::from_millis(10)));

        h.store.set_resources(&Resources::new(500_000.0, 20.0, 100.0), false);
        assert_eq!(h.queue.advance_time(Duration::from_millis(10)), 1);
        assert!(h.queue.queued_events().is_empty());

        h.queue.dismiss_event(&id("welcome-briefing"));
        assert_eq!(h.queue.status(), QueueStatus::Idle);
        assert_eq!(*h.shown.borrow(), vec![id("welcome-briefing")]);
    }

    #[test]
    fn test_trigger_active_event_is_noop() {
        let h = harness(ScriptedRandom::never());
        h.queue.trigger_event(&id("welcome-briefing"));

        assert!(h.queue.trigger_event(&id("welcome-briefing")));
        assert!(h.queue.queued_events().is_empty());

        h.queue.dismiss_event(&id("welcome-briefing"));
        assert_eq!(h.queue.status(), QueueStatus::Idle);
        assert_eq!(h.shown.borrow().len(), 1);
    }

    #[test]
    fn test_choice_for_inactive_event_fails() {
        let h = harness(ScriptedRandom::never());
        h.queue.trigger_event(&id("donor-visit"));
        let before = h.store.snapshot();

        assert!(h
            .queue
            .handle_event_choice(&id("welcome-briefing"), &ChoiceId::from("acknowledge"))
            .is_none());
        assert!(h
            .queue
            .handle_event_choice(&id("donor-visit"), &ChoiceId::from("nope"))
            .is_none());
        assert!(!h.queue.dismiss_event(&id("welcome-briefing")));

        assert_eq!(h.queue.active_event(), Some(id("donor-visit")));
        assert_eq!(h.store.snapshot(), before);
    }

    #[test]
    fn test_event_choice_applies_effects_and_follow_ups() {
        let h = harness(ScriptedRandom::never());
        h.queue.trigger_event(&id("donor-visit"));

        let effects = h
            .queue
            .handle_event_choice(&id("donor-visit"), &ChoiceId::from("host-visit"))
            .unwrap();

        let donor = effects.relationships.unwrap()[&StakeholderId::from("donor")];
        assert!((donor.strength - 0.6).abs() < 1e-9);
        assert_eq!(effects.triggered_events, vec![id("media-coverage")]);
        assert_eq!(
            h.store.event_choices()[&id("donor-visit")],
            ChoiceId::from("host-visit")
        );
        assert!(h.store.decisions().is_empty());
        assert_eq!(h.queue.active_event(), Some(id("media-coverage")));
    }

    #[test]
    fn test_event_level_follow_ups() {
        let h = harness(ScriptedRandom::never());
        h.queue.trigger_event(&id("protest"));

        let effects = h
            .queue
            .handle_event_choice(&id("protest"), &ChoiceId::from("negotiate"))
            .unwrap();
        assert_eq!(effects.resources.unwrap().political_capital(), 70.0);
        assert_eq!(effects.triggered_events, vec![id("media-coverage")]);
        assert_eq!(h.queue.active_event(), Some(id("media-coverage")));
    }

    #[test]
    fn test_check_event_conditions() {
        let h = harness(ScriptedRandom::never());
        let praise = h.queue.catalog.event(&id("ministry-praise")).unwrap();
        let conditions = praise.conditions.clone().unwrap();
        assert!(!h.queue.check_event_conditions(&conditions));

        h.store.set_current_phase(&PhaseId::from("funding"), false);
        h.store.set_resources(&Resources::new(500_000.0, 85.0, 100.0), false);
        assert!(!h.queue.check_event_conditions(&conditions));

        h.store.record_decision(
            &DecisionId::from("projectScope"),
            &ChoiceId::from("pilot"),
        );
        assert!(!h.queue.check_event_conditions(&conditions));

        h.store.record_decision(
            &DecisionId::from("projectScope"),
            &ChoiceId::from("full-network"),
        );
        assert!(h.queue.check_event_conditions(&conditions));

        assert!(h.queue.check_event_conditions(&EventConditions::default()));
    }

    #[test]
    fn test_curveball_roll_and_pick() {
        let h = harness(ScriptedRandom::new([0.1], [1]));
        let planning = PhaseId::from("planning");
        h.store.record_decision(
            &DecisionId::from("projectScope"),
            &ChoiceId::from("pilot"),
        );

        // Candidates in id order: audit, protest.
        assert_eq!(h.queue.maybe_trigger_curveball(&planning), Some(id("protest")));
        assert_eq!(h.queue.queued_events(), vec![id("protest")]);

        h.queue.advance_time(Duration::from_millis(5000));
        assert_eq!(h.queue.active_event(), Some(id("protest")));
    }

    #[test]
    fn test_curveball_respects_probability_and_conditions() {
        let h = harness(ScriptedRandom::new([0.2, 0.0], [0]));
        let planning = PhaseId::from("planning");

        // A roll equal to the probability does not trigger.
        assert_eq!(h.queue.maybe_trigger_curveball(&planning), None);

        // audit needs projectScope, so only protest is a candidate.
        assert_eq!(h.queue.maybe_trigger_curveball(&planning), Some(id("protest")));

        // Already queued: no candidates remain, nothing is rolled.
        assert_eq!(h.queue.maybe_trigger_curveball(&planning), None);
    }

    #[test]
    fn test_no_roll_without_candidates() {
        let h = harness(ScriptedRandom::new([0.0], [0]));
        assert_eq!(h.queue.maybe_trigger_curveball(&PhaseId::from("briefing")), None);
        assert_eq!(
            h.queue.maybe_trigger_curveball(&PhaseId::from("planning")),
            Some(id("protest"))
        );
    }

    #[test]
    fn test_phase_entry_events_are_paced() {
        let h = harness(ScriptedRandom::never());
        h.queue.on_phase_changed(&PhaseId::from("funding"));
        assert_eq!(h.queue.status(), QueueStatus::Idle);
        assert_eq!(h.queue.queued_events(), vec![id("donor-visit")]);

        h.queue.advance_time(Duration::from_millis(1000));
        assert_eq!(h.queue.active_event(), Some(id("donor-visit")));
    }

    #[test]
    fn test_phase_timer_expired_queues_immediately() {
        let h = harness(ScriptedRandom::never());
        h.queue.on_phase_timer_expired(&PhaseId::from("funding"));
        assert_eq!(h.queue.active_event(), Some(id("budget-deadline")));
    }

    #[test]
    fn test_clear_cancels_everything() {
        let h = harness(ScriptedRandom::never());
        h.queue.trigger_event(&id("welcome-briefing"));
        h.queue.queue_event(&id("donor-visit"), Duration::from_secs(1));
        h.queue.queue_event(&id("contractor-delay"), Duration::ZERO);

        h.queue.clear();
        assert_eq!(h.queue.status(), QueueStatus::Idle);
        assert_eq!(h.store.active_event(), None);
        assert_eq!(h.queue.pending_timers(), 0);
        assert_eq!(h.queue.advance_time(Duration::from_secs(2)), 0);
    }

    #[test]
    fn test_resync_adopts_stored_active_event() {
        let h = harness(ScriptedRandom::never());
        h.queue.queue_event(&id("donor-visit"), Duration::from_secs(1));
        h.store.set_active_event(Some(&id("audit")));

        h.queue.resync_from_state();
        assert_eq!(h.queue.active_event(), Some(id("audit")));
        assert_eq!(h.queue.pending_timers(), 0);
    }
}
