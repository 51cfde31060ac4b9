// ============================================================
// Layer 4 — Length Filter
// ============================================================
// Predicate applied while the corpus is being built, not as a
// separate pass: over-length pairs never become Examples.
//
// PRECONDITION for corpus-level scoring: the filter applies to
// every split it is given, evaluation included. Scoring against a
// raw reference file that was NOT filtered the same way produces a
// hypothesis/reference count mismatch, which is reported as an
// error rather than reconciled.

use serde::{Deserialize, Serialize};

use crate::domain::Example;

pub const DEFAULT_MAX_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthFilter {
    pub max_len: usize,
}

impl LengthFilter {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    /// True iff both sides fit within `max_len` tokens.
    pub fn keep(&self, example: &Example) -> bool {
        example.source_len() <= self.max_len && example.target_len() <= self.max_len
    }
}

impl Default for LengthFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LEN)
    }
}
