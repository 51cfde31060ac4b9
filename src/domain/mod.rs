// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types shared by every other layer:
// examples, the vocabulary, the error type and the
// tokenizer seam. No Burn types and no file I/O here.

/// An aligned, tokenised sentence pair
pub mod example;

/// Token ↔ id mapping with the four sentinel tokens
pub mod vocab;

/// Typed failures of the data-to-metric pipeline
pub mod error;

/// Tokenizer abstraction
pub mod traits;

pub use error::PipelineError;
pub use example::Example;
pub use vocab::Vocabulary;
