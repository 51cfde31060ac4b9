// ============================================================
// seq2seq-bleu-trainer — library root
// ============================================================
// Layer 1 — cli          argument parsing and stdout
// Layer 2 — application  use cases wiring the layers below
// Layer 3 — domain       vocab, examples, errors, tokenizer seam
// Layer 4 — data         loading, filtering, batching
// Layer 5 — ml           model seam, decoding, BLEU, epoch loop
// Layer 6 — infra        checkpoints, metrics, side files, progress

#![recursion_limit = "256"]

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;
