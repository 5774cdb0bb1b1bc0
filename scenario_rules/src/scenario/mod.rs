//! The scenario catalog - immutable definitions the engine queries but never mutates.

mod definitions;

pub use definitions::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::effects::Choice;
use crate::error::ScenarioError;
use crate::ids::{ChoiceId, DecisionId, EventId, PhaseId, StakeholderId};

/// All definitions of one scenario.
///
/// Sections are kept in ordered maps so iteration (curveball candidate lists,
/// validation reports) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioCatalog {
    #[serde(default)]
    pub meta: Option<ScenarioMeta>,
    #[serde(default)]
    pub stakeholders: BTreeMap<StakeholderId, Stakeholder>,
    #[serde(default)]
    pub phases: BTreeMap<PhaseId, PhaseDefinition>,
    #[serde(default)]
    pub decisions: BTreeMap<DecisionId, DecisionDefinition>,
    #[serde(default)]
    pub events: BTreeMap<EventId, EventDefinition>,
}

impl ScenarioCatalog {
    /// Parse a scenario document. Does not validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a scenario file. Does not validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Check the catalog is complete and internally consistent.
    ///
    /// Every section must be present and non-empty, each of `required_phases` must
    /// be defined, and every id a definition points at must exist.
    pub fn validate(&self, required_phases: &[PhaseId]) -> Result<(), ScenarioError> {
        match &self.meta {
            Some(meta) if !meta.title.is_empty() => {}
            _ => return Err(ScenarioError::MissingSection("meta")),
        }
        if self.stakeholders.is_empty() {
            return Err(ScenarioError::MissingSection("stakeholders"));
        }
        if self.phases.is_empty() {
            return Err(ScenarioError::MissingSection("phases"));
        }
        if self.decisions.is_empty() {
            return Err(ScenarioError::MissingSection("decisions"));
        }
        if self.events.is_empty() {
            return Err(ScenarioError::MissingSection("events"));
        }

        for phase in required_phases {
            if !self.phases.contains_key(phase) {
                return Err(ScenarioError::MissingPhase(phase.to_string()));
            }
        }

        for (phase_id, phase) in &self.phases {
            let owner = format!("phase '{}'", phase_id);
            for event in phase.entry_events.iter().chain(&phase.time_expired_events) {
                self.check_event_ref(&owner, event)?;
            }
            if let Some(criteria) = &phase.completion_criteria {
                for decision in &criteria.required_decisions {
                    if !self.decisions.contains_key(decision) {
                        return Err(ScenarioError::UnknownReference {
                            owner,
                            kind: "decision",
                            target: decision.to_string(),
                        });
                    }
                }
            }
        }

        for (decision_id, decision) in &self.decisions {
            let owner = format!("decision '{}'", decision_id);
            if !self.phases.contains_key(&decision.phase) {
                return Err(ScenarioError::UnknownReference {
                    owner,
                    kind: "phase",
                    target: decision.phase.to_string(),
                });
            }
            self.check_choices(&owner, &decision.choices)?;
        }

        for (event_id, event) in &self.events {
            let owner = format!("event '{}'", event_id);
            for follow_up in &event.triggers_events {
                self.check_event_ref(&owner, follow_up)?;
            }
            self.check_choices(&owner, &event.choices)?;
        }

        Ok(())
    }

    fn check_choices(&self, owner: &str, choices: &[Choice]) -> Result<(), ScenarioError> {
        for choice in choices {
            for event in &choice.triggers_events {
                self.check_event_ref(&format!("{} choice '{}'", owner, choice.id), event)?;
            }
        }
        Ok(())
    }

    fn check_event_ref(&self, owner: &str, event: &EventId) -> Result<(), ScenarioError> {
        if self.events.contains_key(event) {
            Ok(())
        } else {
            Err(ScenarioError::UnknownReference {
                owner: owner.to_string(),
                kind: "event",
                target: event.to_string(),
            })
        }
    }

    pub fn phase(&self, id: &PhaseId) -> Option<&PhaseDefinition> {
        self.phases.get(id)
    }

    pub fn decision(&self, id: &DecisionId) -> Option<&DecisionDefinition> {
        self.decisions.get(id)
    }

    pub fn event(&self, id: &EventId) -> Option<&EventDefinition> {
        self.events.get(id)
    }

    pub fn stakeholder(&self, id: &StakeholderId) -> Option<&Stakeholder> {
        self.stakeholders.get(id)
    }

    /// Look up a choice of a decision.
    pub fn decision_choice(&self, decision: &DecisionId, choice: &ChoiceId) -> Option<&Choice> {
        self.decision(decision)?.choice(choice)
    }

    /// Curveball events bound to a phase, in id order.
    pub fn curveballs_for_phase<'a>(
        &'a self,
        phase: &'a PhaseId,
    ) -> impl Iterator<Item = (&'a EventId, &'a EventDefinition)> + 'a {
        self.events.iter().filter(move |(_, event)| {
            event.kind == EventKind::Curveball && event.phase.as_ref() == Some(phase)
        })
    }

    /// Decisions associated with a phase, in id order.
    pub fn decisions_for_phase<'a>(
        &'a self,
        phase: &'a PhaseId,
    ) -> impl Iterator<Item = (&'a DecisionId, &'a DecisionDefinition)> + 'a {
        self.decisions
            .iter()
            .filter(move |(_, decision)| &decision.phase == phase)
    }
}
