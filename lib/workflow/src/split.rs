//! Weighted branch selection for split nodes.
//!
//! The random source is injected so tests can drive selection with a fixed
//! sequence instead of relying on large-sample statistical tolerance.

use crate::node::SplitBranch;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A source of uniform random fractions in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    /// Returns the next fraction.
    fn next_fraction(&self) -> f64;
}

/// Production source backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_fraction(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
    }
}

/// Deterministic source cycling through a fixed sequence of fractions.
#[derive(Debug)]
pub struct FixedSequence {
    values: Vec<f64>,
    cursor: AtomicUsize,
}

impl FixedSequence {
    /// Creates a source that cycles through the given fractions.
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl RandomSource for FixedSequence {
    fn next_fraction(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.values[index % self.values.len()]
    }
}

/// Selects a branch by cumulative weight.
///
/// The draw is normalized over the configured total, so weights that do not
/// sum to exactly 100 still select proportionally. Degenerate configuration
/// degrades safely: no branches returns `None`, a non-positive total selects
/// the first branch.
#[must_use]
pub fn pick_branch<'a>(branches: &'a [SplitBranch], random: &dyn RandomSource) -> Option<&'a str> {
    if branches.is_empty() {
        return None;
    }

    let total: f64 = branches.iter().map(|b| b.weight.max(0.0)).sum();
    if total <= 0.0 {
        return Some(branches[0].id.as_str());
    }

    let draw = random.next_fraction() * total;
    let mut cumulative = 0.0;
    for branch in branches {
        cumulative += branch.weight.max(0.0);
        if draw < cumulative {
            return Some(branch.id.as_str());
        }
    }

    // Guard against draw == total from floating point accumulation.
    Some(branches[branches.len() - 1].id.as_str())
}
