//! Rules engine - applies effect bundles, evaluates phase completion and scores
//! the final outcome.

mod outcomes;

pub use outcomes::*;

use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use scenario_rules::{
    ChoiceId, DecisionId, EffectBundle, EventId, HiddenDebt, HiddenDebtDelta, OutcomeRating,
    OutcomeSummary, PhaseId, RelationshipDelta, Relationships, ResourceDelta, Resources,
    ScenarioCatalog, StakeholderId,
};

use crate::events::{EventBus, SimEvent};
use crate::store::StateStore;

/// Something that can queue events, used for follow-up triggers of a choice.
pub trait EventSink {
    /// Queue an event. Returns false if it was rejected.
    fn queue_event(&self, event_id: &EventId, delay: Duration) -> bool;
}

/// What applying one effect bundle changed.
///
/// Each section is present only if the bundle touched it, holding the state of
/// that sub-tree after the change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedEffects {
    pub resources: Option<Resources>,
    pub relationships: Option<Relationships>,
    pub hidden_debt: Option<HiddenDebt>,
    /// Follow-up events that were accepted into the queue.
    pub triggered_events: Vec<EventId>,
}

/// Result of a processed decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectResult {
    pub decision_id: DecisionId,
    pub choice_id: ChoiceId,
    pub effects: AppliedEffects,
    /// Whether the current phase's completion criteria hold after the decision.
    pub phase_complete: bool,
}

/// Applies decision and event effects to the state store.
pub struct RulesEngine {
    store: Rc<StateStore>,
    catalog: Rc<ScenarioCatalog>,
    bus: EventBus,
}

impl RulesEngine {
    pub fn new(store: Rc<StateStore>, catalog: Rc<ScenarioCatalog>, bus: EventBus) -> Self {
        Self {
            store,
            catalog,
            bus,
        }
    }

    /// Record a decision, apply its effects and queue its follow-up events.
    ///
    /// Returns `None` (and changes nothing) if the decision or choice is unknown.
    pub fn process_decision(
        &self,
        decision_id: &DecisionId,
        choice_id: &ChoiceId,
        events: &dyn EventSink,
    ) -> Option<EffectResult> {
        let Some(decision) = self.catalog.decision(decision_id) else {
            warn!(decision_id = %decision_id, "unknown decision");
            return None;
        };
        let Some(choice) = decision.choice(choice_id) else {
            warn!(decision_id = %decision_id, choice_id = %choice_id, "unknown choice for decision");
            return None;
        };

        self.store.record_decision(decision_id, choice_id);
        let mut effects = self.apply_effects(&choice.effects);

        for event_id in &choice.triggers_events {
            if events.queue_event(event_id, Duration::ZERO) {
                effects.triggered_events.push(event_id.clone());
            }
        }

        let phase_complete = self
            .store
            .current_phase()
            .map_or(false, |phase| self.check_phase_completion_criteria(&phase));

        info!(
            decision_id = %decision_id,
            choice_id = %choice_id,
            phase_complete,
            "decision processed"
        );

        self.bus.publish(SimEvent::DecisionProcessed {
            decision_id: decision_id.clone(),
            choice_id: choice_id.clone(),
            effects: effects.clone(),
        });

        Some(EffectResult {
            decision_id: decision_id.clone(),
            choice_id: choice_id.clone(),
            effects,
            phase_complete,
        })
    }

    /// Apply a bundle's deltas in fixed order: resources, relationships, hidden debt.
    ///
    /// Follow-up events are not queued here; callers handle `triggers_events`.
    pub fn apply_effects(&self, bundle: &EffectBundle) -> AppliedEffects {
        let mut applied = AppliedEffects::default();

        if !bundle.resources.is_empty() {
            applied.resources = Some(self.apply_resource_changes(&bundle.resources));
        }
        if !bundle.relationships.is_empty() {
            applied.relationships =
                Some(self.update_stakeholder_relationships(&bundle.relationships));
        }
        if let Some(debt) = &bundle.hidden_debt {
            applied.hidden_debt = Some(self.apply_hidden_debt_changes(debt));
        }

        applied
    }

    /// Apply resource deltas, then clamp. The result is persisted.
    pub fn apply_resource_changes(&self, deltas: &BTreeMap<String, ResourceDelta>) -> Resources {
        let mut resources = self.store.resources();
        for (name, delta) in deltas {
            resources.apply(name, delta);
        }
        resources.clamp();

        debug!(changes = deltas.len(), "resources updated");
        self.store.set_resources(&resources, true);
        resources
    }

    /// Apply relationship deltas, creating neutral 0.5 relationships on first touch.
    pub fn update_stakeholder_relationships(
        &self,
        deltas: &BTreeMap<StakeholderId, RelationshipDelta>,
    ) -> Relationships {
        let mut relationships = self.store.relationships();
        for (stakeholder, delta) in deltas {
            if self.catalog.stakeholder(stakeholder).is_none() {
                debug!(stakeholder = %stakeholder, "relationship change for stakeholder outside the catalog");
            }
            relationships
                .entry(stakeholder.clone())
                .or_default()
                .apply(delta);
        }

        self.store.set_relationships(&relationships, false);
        relationships
    }

    /// Accrue hidden debt. Always persisted immediately.
    pub fn apply_hidden_debt_changes(&self, delta: &HiddenDebtDelta) -> HiddenDebt {
        let mut debt = self.store.hidden_debt();
        if delta.amount < 0.0 {
            warn!(amount = delta.amount, "ignoring negative hidden debt accrual");
        }
        debt.accrue(delta);

        debug!(total = debt.total, source = ?delta.source, "hidden debt accrued");
        self.store.set_hidden_debt(&debt, true);
        debt
    }

    /// Check whether `phase` may be exited going forward.
    ///
    /// True when the phase has no criteria. Otherwise every required decision must
    /// be recorded and every resource threshold met or exceeded.
    pub fn check_phase_completion_criteria(&self, phase: &PhaseId) -> bool {
        let Some(definition) = self.catalog.phase(phase) else {
            warn!(phase = %phase, "completion check for unknown phase");
            return false;
        };
        let Some(criteria) = &definition.completion_criteria else {
            return true;
        };

        let decisions = self.store.decisions();
        let decisions_made = criteria
            .required_decisions
            .iter()
            .all(|d| decisions.contains_key(d));

        decisions_made
            && self
                .store
                .resources()
                .meets_thresholds(&criteria.resource_thresholds)
    }

    /// Score the session from the current state and store the summary.
    pub fn calculate_outcomes(&self) -> OutcomeSummary {
        let resources = self.store.resources();
        let relationships = self.store.relationships();
        let debt = self.store.hidden_debt();

        let scores = score_outcome(&resources, &relationships, &debt);
        let summary = OutcomeSummary {
            project_success: scores.project_success,
            sustainability: scores.sustainability,
            rating: OutcomeRating::from_score(scores.project_success),
            hidden_debt_total: debt.total,
            decisions_made: self.store.decisions().len(),
            final_resources: resources,
        };

        info!(
            project_success = summary.project_success,
            sustainability = summary.sustainability,
            "outcomes calculated"
        );
        self.store.set_outcomes(&summary, true);
        summary
    }
}
