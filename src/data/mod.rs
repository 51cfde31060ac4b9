// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between two aligned text files and a tensor batch:
//
//   text.<src> + text.<trg>
//       │
//       ▼
//   Preprocessor         → cleans each line
//       │
//       ▼
//   ParallelCorpusLoader → pairs lines, drops empty pairs,
//       │                  tokenises, applies LengthFilter
//       ▼
//   AdaptiveBatcher      → pools, sorts, slices by token budget
//       │
//       ▼
//   Rebatcher            → pads, shifts, masks → Burn tensors
//
// Each module owns exactly one step.

/// Line-level text cleaning
pub mod preprocessor;

/// Max-length predicate applied while loading
pub mod filter;

/// Aligned-file reader and split layout
pub mod loader;

/// Token-budget batch iterator
pub mod batcher;

/// Padding, target shift and masks
pub mod rebatch;
