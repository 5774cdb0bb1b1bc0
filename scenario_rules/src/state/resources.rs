//! Named numeric resources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::effects::ResourceDelta;

pub const BUDGET: &str = "budget";
pub const POLITICAL_CAPITAL: &str = "politicalCapital";
pub const TIME_REMAINING: &str = "timeRemaining";

/// Resource name -> current value.
///
/// After [`Resources::clamp`], `budget >= 0` and `politicalCapital` is within 0..=100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resources(BTreeMap<String, f64>);

impl Resources {
    /// Create the standard resource set.
    pub fn new(budget: f64, political_capital: f64, time_remaining: f64) -> Self {
        let mut values = BTreeMap::new();
        values.insert(BUDGET.to_string(), budget);
        values.insert(POLITICAL_CAPITAL.to_string(), political_capital);
        values.insert(TIME_REMAINING.to_string(), time_remaining);
        Self(values)
    }

    /// Get a resource value. Unknown resources read as zero.
    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn budget(&self) -> f64 {
        self.get(BUDGET)
    }

    pub fn political_capital(&self) -> f64 {
        self.get(POLITICAL_CAPITAL)
    }

    pub fn time_remaining(&self) -> f64 {
        self.get(TIME_REMAINING)
    }

    /// Apply one delta without clamping.
    pub fn apply(&mut self, name: &str, delta: &ResourceDelta) {
        let updated = delta.apply_to(self.get(name));
        self.set(name, updated);
    }

    /// Enforce the resource invariants.
    ///
    /// NaN becomes zero and infinities saturate to the largest finite value, so every
    /// resource survives a round trip through JSON.
    pub fn clamp(&mut self) {
        for value in self.0.values_mut() {
            *value = if value.is_nan() {
                0.0
            } else {
                value.clamp(f64::MIN, f64::MAX)
            };
        }
        if let Some(budget) = self.0.get_mut(BUDGET) {
            *budget = budget.max(0.0);
        }
        if let Some(capital) = self.0.get_mut(POLITICAL_CAPITAL) {
            *capital = capital.clamp(0.0, 100.0);
        }
    }

    /// Check whether every threshold is met or exceeded.
    pub fn meets_thresholds(&self, thresholds: &BTreeMap<String, f64>) -> bool {
        thresholds
            .iter()
            .all(|(name, minimum)| self.get(name) >= *minimum)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new(1_000_000.0, 75.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_political_capital_delta() {
        let mut resources = Resources::new(1_000_000.0, 75.0, 100.0);
        resources.apply(POLITICAL_CAPITAL, &ResourceDelta::Absolute(-10.0));
        resources.clamp();

        assert_eq!(resources.political_capital(), 65.0);
    }

    #[test]
    fn test_clamping() {
        let mut resources = Resources::new(100.0, 95.0, 10.0);
        resources.apply(BUDGET, &ResourceDelta::Absolute(-500.0));
        resources.apply(POLITICAL_CAPITAL, &ResourceDelta::Absolute(20.0));
        resources.apply(TIME_REMAINING, &ResourceDelta::Absolute(-50.0));
        resources.clamp();

        assert_eq!(resources.budget(), 0.0);
        assert_eq!(resources.political_capital(), 100.0);
        // Only budget and political capital are bounded.
        assert_eq!(resources.time_remaining(), -40.0);
    }

    #[test]
    fn test_overflow_stays_finite() {
        let mut resources = Resources::default();
        resources.apply(BUDGET, &ResourceDelta::parse("1e308%").unwrap());
        resources.apply(TIME_REMAINING, &ResourceDelta::Absolute(f64::NEG_INFINITY));
        resources.apply("morale", &ResourceDelta::Absolute(f64::NAN));
        resources.clamp();

        assert_eq!(resources.budget(), f64::MAX);
        assert_eq!(resources.time_remaining(), f64::MIN);
        assert_eq!(resources.get("morale"), 0.0);
        assert!(resources.iter().all(|(_, value)| value.is_finite()));
    }

    #[test]
    fn test_unknown_resource_starts_at_zero() {
        let mut resources = Resources::default();
        resources.apply("morale", &ResourceDelta::Absolute(3.0));
        assert_eq!(resources.get("morale"), 3.0);
    }

    #[test]
    fn test_meets_thresholds() {
        let resources = Resources::new(500_000.0, 40.0, 10.0);
        let mut thresholds = BTreeMap::new();
        thresholds.insert(POLITICAL_CAPITAL.to_string(), 40.0);
        assert!(resources.meets_thresholds(&thresholds));

        thresholds.insert(BUDGET.to_string(), 600_000.0);
        assert!(!resources.meets_thresholds(&thresholds));
    }

    fn delta_strategy() -> impl Strategy<Value = ResourceDelta> {
        prop_oneof![
            (-2_000_000.0f64..2_000_000.0).prop_map(ResourceDelta::Absolute),
            (-300.0f64..300.0).prop_map(ResourceDelta::Percent),
        ]
    }

    proptest! {
        #[test]
        fn prop_clamped_resources_hold_invariants(
            deltas in proptest::collection::vec((0usize..2, delta_strategy()), 0..30),
        ) {
            let mut resources = Resources::default();
            for (which, delta) in deltas {
                let name = if which == 0 { BUDGET } else { POLITICAL_CAPITAL };
                resources.apply(name, &delta);
                resources.clamp();
                prop_assert!(resources.budget() >= 0.0);
                prop_assert!((0.0..=100.0).contains(&resources.political_capital()));
            }
        }
    }
}
