//! Effect bundles: what a choice does to resources, relationships and hidden debt.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ScenarioError;
use crate::ids::{ChoiceId, EventId, StakeholderId};
use crate::state::RelationshipType;

/// The deltas attached to a decision or event choice.
///
/// Application order is fixed: resources, then relationships, then hidden debt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectBundle {
    /// Resource name -> change.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDelta>,

    #[serde(default)]
    pub relationships: BTreeMap<StakeholderId, RelationshipDelta>,

    #[serde(default)]
    pub hidden_debt: Option<HiddenDebtDelta>,
}

impl EffectBundle {
    /// Check if applying this bundle would change nothing.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.relationships.is_empty() && self.hidden_debt.is_none()
    }
}

/// A change to one resource.
///
/// In scenario data a plain number is an absolute delta, while a string with a `%`
/// suffix (`"-15%"`) adjusts by a percentage of the current value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResourceDelta", into = "RawResourceDelta")]
pub enum ResourceDelta {
    Absolute(f64),
    Percent(f64),
}

impl ResourceDelta {
    /// Compute the new value of a resource currently at `current`.
    pub fn apply_to(&self, current: f64) -> f64 {
        match self {
            ResourceDelta::Absolute(amount) => current + amount,
            ResourceDelta::Percent(pct) => current + current * pct / 100.0,
        }
    }

    /// Parse the textual form used in scenario files.
    pub fn parse(text: &str) -> Result<Self, ScenarioError> {
        let trimmed = text.trim();
        let invalid = || ScenarioError::InvalidResourceDelta(text.to_string());

        match trimmed.strip_suffix('%') {
            Some(number) => number
                .trim()
                .parse::<f64>()
                .map(ResourceDelta::Percent)
                .map_err(|_| invalid()),
            None => trimmed
                .parse::<f64>()
                .map(ResourceDelta::Absolute)
                .map_err(|_| invalid()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawResourceDelta {
    Number(f64),
    Text(String),
}

impl TryFrom<RawResourceDelta> for ResourceDelta {
    type Error = ScenarioError;

    fn try_from(raw: RawResourceDelta) -> Result<Self, Self::Error> {
        match raw {
            RawResourceDelta::Number(amount) => Ok(ResourceDelta::Absolute(amount)),
            RawResourceDelta::Text(text) => ResourceDelta::parse(&text),
        }
    }
}

impl From<ResourceDelta> for RawResourceDelta {
    fn from(delta: ResourceDelta) -> Self {
        match delta {
            ResourceDelta::Absolute(amount) => RawResourceDelta::Number(amount),
            ResourceDelta::Percent(pct) => RawResourceDelta::Text(format!("{}%", pct)),
        }
    }
}

/// A change to one stakeholder relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDelta {
    /// Added to the current strength before clamping.
    #[serde(default)]
    pub strength: Option<f64>,

    /// Overwrites the relationship type when present.
    #[serde(default, rename = "type")]
    pub relationship_type: Option<RelationshipType>,
}

/// Hidden-debt accrual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenDebtDelta {
    pub amount: f64,
    #[serde(default)]
    pub source: Option<String>,
}

impl HiddenDebtDelta {
    pub fn new(amount: f64) -> Self {
        Self {
            amount,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A selectable option of a decision or event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: ChoiceId,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub effects: EffectBundle,

    /// Events queued after this choice's effects are applied.
    #[serde(default)]
    pub triggers_events: Vec<EventId>,
}
