//! The shape of simulation state - the typed view of the single state tree.
//!
//! The engine stores state as one nested JSON tree. The types here describe each
//! sub-tree and carry the pure arithmetic (clamping, accrual) that keeps them valid.

mod resources;

pub use resources::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::effects::{HiddenDebtDelta, RelationshipDelta};
use crate::ids::{ChoiceId, DecisionId, EventId, PhaseId, StakeholderId};

/// Stance of a stakeholder towards the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    Allied,
    #[default]
    Neutral,
    Opposed,
}

/// Relationship with a single stakeholder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StakeholderRelationship {
    /// Always within 0.0..=1.0.
    pub strength: f64,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
}

impl Default for StakeholderRelationship {
    fn default() -> Self {
        Self {
            strength: 0.5,
            relationship_type: RelationshipType::Neutral,
        }
    }
}

impl StakeholderRelationship {
    /// Apply a delta: add strength then clamp, overwrite the type if given.
    pub fn apply(&mut self, delta: &RelationshipDelta) {
        if let Some(change) = delta.strength {
            self.strength = clamp_unit(self.strength + change);
        }
        if let Some(kind) = delta.relationship_type {
            self.relationship_type = kind;
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Relationships keyed by stakeholder.
pub type Relationships = BTreeMap<StakeholderId, StakeholderRelationship>;

/// Accumulated liabilities that surface late in the simulation.
///
/// Never decreases: negative accruals are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HiddenDebt {
    pub total: f64,
    #[serde(default)]
    pub sources: BTreeMap<String, f64>,
}

impl HiddenDebt {
    /// Add a delta to the total and, when it names one, to its source.
    pub fn accrue(&mut self, delta: &HiddenDebtDelta) {
        let amount = if delta.amount.is_finite() {
            delta.amount.max(0.0)
        } else {
            0.0
        };

        self.total += amount;
        if let Some(source) = &delta.source {
            *self.sources.entry(source.clone()).or_insert(0.0) += amount;
        }
    }
}

/// Snapshot taken when leaving a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseHistoryRecord {
    pub phase: PhaseId,
    pub timestamp: DateTime<Utc>,
    pub decisions: BTreeMap<DecisionId, ChoiceId>,
    pub resources: Resources,
    pub relationships: Relationships,
}

/// Progress through the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub current_phase: Option<PhaseId>,
    pub active_event: Option<EventId>,
    #[serde(default)]
    pub seen_events: Vec<EventId>,
    #[serde(default)]
    pub phase_history: Vec<PhaseHistoryRecord>,
}

/// Bookkeeping about the state tree itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// Consulted by collaborators for compatibility checks, never by the engine.
    pub version: String,
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl SystemInfo {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

/// Qualitative band of the final project success score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl OutcomeRating {
    /// Band a 0-100 success score.
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            OutcomeRating::Excellent
        } else if score >= 60 {
            OutcomeRating::Good
        } else if score >= 40 {
            OutcomeRating::Fair
        } else {
            OutcomeRating::Poor
        }
    }
}

/// Final scored outcome of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSummary {
    pub project_success: u32,
    pub sustainability: u32,
    pub rating: OutcomeRating,
    pub hidden_debt_total: f64,
    pub decisions_made: usize,
    pub final_resources: Resources,
}

/// The complete default state tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTree {
    pub system: SystemInfo,

    /// Participant identity, free-form. Survives a user-preserving reset.
    #[serde(default)]
    pub user: serde_json::Map<String, serde_json::Value>,

    pub session: SessionState,
    pub resources: Resources,

    /// Decision -> chosen option. Re-deciding overwrites.
    #[serde(default)]
    pub decisions: BTreeMap<DecisionId, ChoiceId>,

    /// Event -> chosen option, kept apart from decisions.
    #[serde(default)]
    pub event_choices: BTreeMap<EventId, ChoiceId>,

    #[serde(default)]
    pub relationships: Relationships,

    #[serde(default)]
    pub hidden_debt: HiddenDebt,

    #[serde(default)]
    pub outcomes: Option<OutcomeSummary>,
}

impl StateTree {
    /// Create a fresh tree with the given schema version and starting resources.
    pub fn new(version: impl Into<String>, resources: Resources) -> Self {
        Self {
            system: SystemInfo::new(version),
            user: serde_json::Map::new(),
            session: SessionState::default(),
            resources,
            decisions: BTreeMap::new(),
            event_choices: BTreeMap::new(),
            relationships: Relationships::new(),
            hidden_debt: HiddenDebt::default(),
            outcomes: None,
        }
    }
}

impl Default for StateTree {
    fn default() -> Self {
        Self::new("1.0.0", Resources::default())
    }
}
