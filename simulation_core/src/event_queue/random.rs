//! Injectable randomness for curveball selection.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the two random quantities curveball selection needs.
pub trait RandomSource {
    /// Uniform sample in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Uniform index in `0..len`. `len` is never zero.
    fn next_index(&mut self, len: usize) -> usize;
}

/// `StdRng`-backed source. Seed it for reproducible sessions.
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn next_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Replays fixed values, for forcing or suppressing curveballs.
///
/// Once a script runs out, rolls return `1.0` (never below any probability) and
/// picks return `0`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    rolls: VecDeque<f64>,
    picks: VecDeque<usize>,
}

impl ScriptedRandom {
    pub fn new(rolls: impl IntoIterator<Item = f64>, picks: impl IntoIterator<Item = usize>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            picks: picks.into_iter().collect(),
        }
    }

    /// A source whose rolls never trigger anything.
    pub fn never() -> Self {
        Self::default()
    }

    /// A source whose rolls always trigger, picking the first candidate.
    pub fn always(times: usize) -> Self {
        Self::new(std::iter::repeat(0.0).take(times), std::iter::repeat(0).take(times))
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        self.rolls.pop_front().unwrap_or(1.0)
    }

    fn next_index(&mut self, len: usize) -> usize {
        self.picks.pop_front().unwrap_or(0).min(len.saturating_sub(1))
    }
}
