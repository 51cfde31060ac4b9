// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that runs a model or scores its output. The
// encoder-decoder itself is supplied by the caller through the
// TranslationModel trait; this layer drives it:
//
//   model.rs     — TranslationModel seam, EvalMode and
//                  HostPlacement scoped guards
//   decoder.rs   — greedy autoregressive decoding
//   bleu.rs      — sentence BLEU and corpus BLEU (13a tokens)
//   evaluator.rs — decode a split and score it by method name
//   trainer.rs   — per-token loss passes and the epoch
//                  state machine with checkpointing
//   signal.rs    — batch-level stop / timeout
//
// Reference: Burn Book §5 (Training)
//            Papineni et al. (2002) BLEU
//            Post (2018) A Call for Clarity in Reporting BLEU Scores

/// Model contract and scoped mode / device guards
pub mod model;

/// Greedy decoding
pub mod decoder;

/// BLEU arithmetic
pub mod bleu;

/// BLEU strategies over a decoded split
pub mod evaluator;

/// Loss passes and the epoch orchestrator
pub mod trainer;

/// Cooperative cancellation between batches
pub mod signal;

#[cfg(test)]
pub mod testing;
