//! Policies for choosing which remaining candidate to claim.
//!
//! When the decision timer fires, every remaining candidate is equally
//! eligible. Which one wins is a local choice that peers never observe
//! before the resulting greeting.

use std::collections::HashSet;

use rand::seq::IteratorRandom;

/// Picks one name out of the remaining candidates.
pub trait SelectionPolicy: Send + Sync {
    /// Return one member of `candidates`, or `None` if it is empty.
    fn select(&self, candidates: &HashSet<String>) -> Option<String>;
}

/// Uniformly random choice. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelection;

impl SelectionPolicy for RandomSelection {
    fn select(&self, candidates: &HashSet<String>) -> Option<String> {
        candidates.iter().choose(&mut rand::thread_rng()).cloned()
    }
}

/// Always the lexicographically smallest name.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicographicSelection;

impl SelectionPolicy for LexicographicSelection {
    fn select(&self, candidates: &HashSet<String>) -> Option<String> {
        candidates.iter().min().cloned()
    }
}
