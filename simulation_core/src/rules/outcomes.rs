//! Final scoring.

use scenario_rules::{HiddenDebt, Relationships, Resources};

/// The two headline scores, each an integer in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeScores {
    pub project_success: u32,
    pub sustainability: u32,
}

/// Score a session from its resources, relationships and hidden debt.
///
/// Both scores are clamped to `0..=100` and rounded, project success included.
/// A NaN score reads as zero.
pub fn score_outcome(
    resources: &Resources,
    relationships: &Relationships,
    debt: &HiddenDebt,
) -> OutcomeScores {
    let average_strength = if relationships.is_empty() {
        None
    } else {
        let sum: f64 = relationships.values().map(|r| r.strength).sum();
        Some(sum / relationships.len() as f64)
    };
    let political_capital = resources.political_capital();

    let mut success = 0.0;
    if resources.budget() > 0.0 {
        success += 30.0;
    }
    if political_capital >= 50.0 {
        success += 30.0;
    }
    if let Some(avg) = average_strength {
        success += avg * 40.0;
    }
    success -= debt.total / 1_000_000.0 * 20.0;

    let mut sustainability = 100.0;
    sustainability -= debt.total / 500_000.0 * 40.0;
    if political_capital < 30.0 {
        sustainability -= 20.0;
    }
    if let Some(avg) = average_strength {
        sustainability += (avg - 0.5) * 20.0;
    }

    OutcomeScores {
        project_success: to_score(success),
        sustainability: to_score(sustainability),
    }
}

fn to_score(raw: f64) -> u32 {
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, 100.0).round() as u32
}
