//! Typed events exchanged over the [`EventBus`].
//!
//! The set of topics is closed: the engine publishes state, phase, decision and
//! event-lifecycle facts, and listens for three requests coming from the UI side
//! (choose an event option, dismiss the active event, phase timer expired).

mod bus;

pub use bus::*;

use chrono::{DateTime, Utc};
use scenario_rules::{ChoiceId, DecisionId, EventDefinition, EventId, PhaseId};
use serde::Serialize;

use crate::rules::AppliedEffects;

/// Topic names, used to subscribe to one kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    StateChanged,
    StateReset,
    PhaseChanged,
    DecisionProcessed,
    ShowEvent,
    EventChoiceProcessed,
    EventDismissed,
    EventChoiceRequested,
    EventDismissRequested,
    PhaseTimerExpired,
}

impl Topic {
    /// Wire name of the topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::StateChanged => "state-changed",
            Topic::StateReset => "state-reset",
            Topic::PhaseChanged => "phase-changed",
            Topic::DecisionProcessed => "decision-processed",
            Topic::ShowEvent => "show-event",
            Topic::EventChoiceProcessed => "event-choice-processed",
            Topic::EventDismissed => "event-dismissed",
            Topic::EventChoiceRequested => "event-choice-requested",
            Topic::EventDismissRequested => "event-dismiss-requested",
            Topic::PhaseTimerExpired => "phase-timer-expired",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event carried by the bus, with its payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "topic", content = "payload", rename_all = "kebab-case")]
pub enum SimEvent {
    /// A state tree write. An empty path means the whole tree was replaced.
    #[serde(rename_all = "camelCase")]
    StateChanged {
        path: Vec<String>,
        value: serde_json::Value,
    },

    StateReset { timestamp: DateTime<Utc> },

    #[serde(rename_all = "camelCase")]
    PhaseChanged {
        previous_phase: Option<PhaseId>,
        new_phase: PhaseId,
    },

    #[serde(rename_all = "camelCase")]
    DecisionProcessed {
        decision_id: DecisionId,
        choice_id: ChoiceId,
        effects: AppliedEffects,
    },

    #[serde(rename_all = "camelCase")]
    ShowEvent {
        event_id: EventId,
        event: EventDefinition,
    },

    #[serde(rename_all = "camelCase")]
    EventChoiceProcessed {
        event_id: EventId,
        choice_id: ChoiceId,
        effects: AppliedEffects,
    },

    #[serde(rename_all = "camelCase")]
    EventDismissed { event_id: EventId },

    /// UI request: take `choice_id` on the active event.
    #[serde(rename_all = "camelCase")]
    EventChoiceRequested {
        event_id: EventId,
        choice_id: ChoiceId,
    },

    /// UI request: close the active event without effects.
    #[serde(rename_all = "camelCase")]
    EventDismissRequested { event_id: EventId },

    /// External timer notification: the time limit of `phase` ran out.
    PhaseTimerExpired { phase: PhaseId },
}

impl SimEvent {
    /// Get the topic of this event.
    pub fn topic(&self) -> Topic {
        match self {
            SimEvent::StateChanged { .. } => Topic::StateChanged,
            SimEvent::StateReset { .. } => Topic::StateReset,
            SimEvent::PhaseChanged { .. } => Topic::PhaseChanged,
            SimEvent::DecisionProcessed { .. } => Topic::DecisionProcessed,
            SimEvent::ShowEvent { .. } => Topic::ShowEvent,
            SimEvent::EventChoiceProcessed { .. } => Topic::EventChoiceProcessed,
            SimEvent::EventDismissed { .. } => Topic::EventDismissed,
            SimEvent::EventChoiceRequested { .. } => Topic::EventChoiceRequested,
            SimEvent::EventDismissRequested { .. } => Topic::EventDismissRequested,
            SimEvent::PhaseTimerExpired { .. } => Topic::PhaseTimerExpired,
        }
    }
}
