// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem or the terminal on
// behalf of the other layers:
//
//   checkpoint.rs      — weights + JSON checkpoint records,
//                        train_config.json
//   metrics.rs         — per-epoch CSV log
//   tokenizer_store.rs — per-language tokenizers and vocabularies
//   side_files.rs      — hypothesis / reference text files
//   progress.rs        — indicatif bars for long passes

/// Checkpoint artifacts and their records
pub mod checkpoint;

/// Epoch metrics CSV logger
pub mod metrics;

/// Tokenizer and vocabulary persistence
pub mod tokenizer_store;

/// One-sentence-per-line hypothesis / reference files
pub mod side_files;

/// Progress bars
pub mod progress;
