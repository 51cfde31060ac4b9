// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: each use case wires the data, ml
// and infra layers together for one goal. No tensor code and no
// printing here (printing is Layer 1).

/// Corpus → vocabulary → epoch loop for a caller-supplied model
pub mod train_use_case;

/// Batching dry run over one split
pub mod inspect_use_case;

/// Scoring of hypothesis / reference side files
pub mod score_use_case;
