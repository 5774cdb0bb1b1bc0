//! Immutable definitions read from the scenario document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::effects::Choice;
use crate::ids::{ChoiceId, DecisionId, EventId, PhaseId};

/// Title and version of a scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMeta {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub title: String,
}

/// A person or organisation the participants must manage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stakeholder {
    pub name: String,
    #[serde(default)]
    pub role: String,
    /// Relative weight of this stakeholder, 0.0 to 1.0.
    #[serde(default)]
    pub influence: f64,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// What must hold before a phase may be left going forward.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionCriteria {
    #[serde(default)]
    pub required_decisions: Vec<DecisionId>,
    /// Resource name -> minimum value.
    #[serde(default)]
    pub resource_thresholds: BTreeMap<String, f64>,
}

impl CompletionCriteria {
    pub fn is_empty(&self) -> bool {
        self.required_decisions.is_empty() && self.resource_thresholds.is_empty()
    }
}

/// One stage of the workshop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDefinition {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Read by the external phase timer.
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    #[serde(default)]
    pub entry_events: Vec<EventId>,
    #[serde(default)]
    pub time_expired_events: Vec<EventId>,
    #[serde(default)]
    pub completion_criteria: Option<CompletionCriteria>,
}

/// A decision the participants take during a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionDefinition {
    pub phase: PhaseId,
    #[serde(default)]
    pub title: Option<String>,
    pub choices: Vec<Choice>,
}

impl DecisionDefinition {
    pub fn choice(&self, id: &ChoiceId) -> Option<&Choice> {
        self.choices.iter().find(|c| &c.id == id)
    }
}

/// How an event enters the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Queued on phase entry or timer expiry.
    #[default]
    Scripted,
    /// Randomly triggered when its conditions hold.
    Curveball,
    /// Triggered by other choices.
    Dynamic,
}

/// Inclusive bounds on a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl ResourceRange {
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Preconditions for an event to be queued. Absent categories always hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventConditions {
    #[serde(default)]
    pub phase: Option<PhaseId>,

    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRange>,

    /// Decision -> required choice; `None` accepts any recorded choice.
    #[serde(default)]
    pub decisions: BTreeMap<DecisionId, Option<ChoiceId>>,

    /// Event -> required choice; `None` accepts any recorded choice.
    #[serde(default)]
    pub event_choices: BTreeMap<EventId, Option<ChoiceId>>,
}

/// A scripted, curveball or dynamic event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDefinition {
    #[serde(default, rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub phase: Option<PhaseId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub conditions: Option<EventConditions>,
    pub choices: Vec<Choice>,
    /// Queued whenever any choice of this event is taken.
    #[serde(default)]
    pub triggers_events: Vec<EventId>,
}

impl EventDefinition {
    pub fn choice(&self, id: &ChoiceId) -> Option<&Choice> {
        self.choices.iter().find(|c| &c.id == id)
    }
}
