// ============================================================
// Layer 3 — Example Domain Type
// ============================================================
// One aligned sentence pair after tokenisation.
// Created by the corpus loader and never mutated afterwards;
// batches only hold references to it.

use serde::{Deserialize, Serialize};

/// An aligned (source, target) pair of token sequences.
///
/// The target side is stored WITHOUT the `<s>` / `</s>` wrappers;
/// those are added when the vocabulary numericalises the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub source: Vec<String>,
    pub target: Vec<String>,
}

impl Example {
    pub fn new(source: Vec<String>, target: Vec<String>) -> Self {
        Self { source, target }
    }

    /// Convenience for tests and fixtures: whitespace-split both sides.
    pub fn from_text(source: &str, target: &str) -> Self {
        Self {
            source: source.split_whitespace().map(str::to_string).collect(),
            target: target.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn target_len(&self) -> usize {
        self.target.len()
    }

    /// Default batching sort key: `(len(src), len(trg))`.
    pub fn length_key(&self) -> (usize, usize) {
        (self.source.len(), self.target.len())
    }
}
