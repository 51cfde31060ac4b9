// ============================================================
// Layer 3 — Pipeline Errors
// ============================================================
// Every failure the data-to-metric pipeline can surface.
// Upper layers wrap these in anyhow with extra context;
// nothing in this core retries.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A corpus, reference or checkpoint file could not be read or written
    #[error("I/O error on '{path}': {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source and target sides of a batch disagree on example count
    #[error("batch structure corrupted: {src} source rows vs {trg} target rows")]
    BatchSizeMismatch { src: usize, trg: usize },

    #[error("unsupported BLEU method '{0}' (expected 'sentence' or 'corpus')")]
    UnsupportedMetric(String),

    /// Truncation or masking is broken upstream if this ever fires
    #[error("padding token inside truncated span (row {row}, position {position})")]
    PaddingInHypothesis { row: usize, position: usize },

    #[error("corpus files are not line-aligned: {src_lines} source vs {trg_lines} target lines")]
    LineCountMismatch { src_lines: usize, trg_lines: usize },

    #[error("{hypotheses} hypotheses scored against {references} references")]
    ReferenceCountMismatch { hypotheses: usize, references: usize },

    #[error("checkpoint '{0}' already exists")]
    CheckpointExists(PathBuf),

    #[error("checkpoint epoch {epoch} does not follow last saved epoch {last}")]
    NonMonotonicEpoch { epoch: usize, last: usize },

    #[error("pass interrupted after {batches} batches")]
    Interrupted { batches: usize },

    #[error("tokenizer failed: {0}")]
    Tokenizer(String),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
