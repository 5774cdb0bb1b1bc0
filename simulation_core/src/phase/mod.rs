//! Phase orchestration: moves the session through the fixed phase sequence.
//!
//! Leaving a phase forward is gated on its completion criteria. Going back, or
//! jumping to the final phase, is never gated. Every permitted exit leaves a
//! [`PhaseHistoryRecord`] behind.

use std::rc::Rc;

use chrono::Utc;
use tracing::{info, warn};

use scenario_rules::{PhaseHistoryRecord, PhaseId, ScenarioCatalog};

use crate::error::NavigationError;
use crate::events::{EventBus, SimEvent};
use crate::rules::RulesEngine;
use crate::store::StateStore;

/// Outcome of a successful navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTransition {
    pub previous: Option<PhaseId>,
    pub current: PhaseId,
    /// Whether the exit was checked against completion criteria.
    pub gated: bool,
}

impl PhaseTransition {
    /// True when navigation targeted the phase that was already current.
    pub fn is_noop(&self) -> bool {
        self.previous.as_ref() == Some(&self.current)
    }
}

pub struct PhaseOrchestrator {
    store: Rc<StateStore>,
    catalog: Rc<ScenarioCatalog>,
    rules: Rc<RulesEngine>,
    bus: EventBus,
    sequence: Vec<PhaseId>,
}

impl PhaseOrchestrator {
    pub fn new(
        store: Rc<StateStore>,
        catalog: Rc<ScenarioCatalog>,
        rules: Rc<RulesEngine>,
        sequence: Vec<PhaseId>,
    ) -> Self {
        let bus = store.bus().clone();
        Self {
            store,
            catalog,
            rules,
            bus,
            sequence,
        }
    }

    /// Make `target` the current phase.
    ///
    /// Publishes `phase-changed` on success. Navigating to the current phase
    /// succeeds without doing anything.
    pub fn navigate_to_phase(&self, target: &PhaseId) -> Result<PhaseTransition, NavigationError> {
        let Some(target_index) = self.index_of(target) else {
            warn!(phase = %target, "navigation to a phase outside the sequence");
            return Err(NavigationError::UnknownPhase(target.clone()));
        };
        if self.catalog.phase(target).is_none() {
            warn!(phase = %target, "navigation to a phase the scenario does not define");
            return Err(NavigationError::UnknownPhase(target.clone()));
        }

        let previous = self.store.current_phase();
        let mut gated = false;

        if let Some(current) = &previous {
            if current == target {
                return Ok(PhaseTransition {
                    previous: previous.clone(),
                    current: target.clone(),
                    gated: false,
                });
            }

            let backward = self
                .index_of(current)
                .map_or(false, |current_index| target_index < current_index);
            let to_final = target_index + 1 == self.sequence.len();
            gated = !backward && !to_final;

            if gated && !self.rules.check_phase_completion_criteria(current) {
                info!(from = %current, to = %target, "phase exit refused, criteria not met");
                return Err(NavigationError::CriteriaNotMet {
                    phase: current.clone(),
                });
            }

            self.store.push_phase_history(PhaseHistoryRecord {
                phase: current.clone(),
                timestamp: Utc::now(),
                decisions: self.store.decisions(),
                resources: self.store.resources(),
                relationships: self.store.relationships(),
            });
        }

        self.store.set_current_phase(target, true);
        info!(from = ?previous, to = %target, gated, "phase changed");
        self.bus.publish(SimEvent::PhaseChanged {
            previous_phase: previous.clone(),
            new_phase: target.clone(),
        });

        Ok(PhaseTransition {
            previous,
            current: target.clone(),
            gated,
        })
    }

    pub fn navigate_to_next_phase(&self) -> Result<PhaseTransition, NavigationError> {
        let index = self.current_index()?;
        let next = self
            .sequence
            .get(index + 1)
            .cloned()
            .ok_or(NavigationError::NoNextPhase)?;
        self.navigate_to_phase(&next)
    }

    pub fn navigate_to_previous_phase(&self) -> Result<PhaseTransition, NavigationError> {
        let index = self.current_index()?;
        let previous = index
            .checked_sub(1)
            .and_then(|i| self.sequence.get(i))
            .cloned()
            .ok_or(NavigationError::NoPreviousPhase)?;
        self.navigate_to_phase(&previous)
    }

    pub fn current_phase(&self) -> Option<PhaseId> {
        self.store.current_phase()
    }

    pub fn sequence(&self) -> &[PhaseId] {
        &self.sequence
    }

    pub fn phase_history(&self) -> Vec<PhaseHistoryRecord> {
        self.store.phase_history()
    }

    pub fn is_final_phase(&self) -> bool {
        match (self.store.current_phase(), self.sequence.last()) {
            (Some(current), Some(last)) => &current == last,
            _ => false,
        }
    }

    fn index_of(&self, phase: &PhaseId) -> Option<usize> {
        self.sequence.iter().position(|p| p == phase)
    }

    fn current_index(&self) -> Result<usize, NavigationError> {
        let current = self.store.current_phase().ok_or(NavigationError::NotStarted)?;
        self.index_of(&current)
            .ok_or(NavigationError::UnknownPhase(current))
    }
}
