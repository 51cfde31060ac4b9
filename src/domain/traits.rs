// ============================================================
// Layer 3 — Core Traits
// ============================================================
// Seams between the pipeline and its external collaborators.
// The model itself lives behind `ml::model::TranslationModel`
// because its signature needs Burn tensor types.

use crate::domain::PipelineError;

/// Anything that can split a cleaned sentence into tokens. A failure
/// is returned to the caller, never replaced by another tokenization.
///
/// Implementations:
///   - WhitespaceTokenizer → plain `split_whitespace`
///   - HfTokenizer         → a HuggingFace tokenizer.json model
pub trait Tokenize {
    fn tokenize(&self, text: &str) -> Result<Vec<String>, PipelineError>;
}

/// Default tokenizer: one token per whitespace-separated word.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenize for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        Ok(text.split_whitespace().map(str::to_string).collect())
    }
}

impl<T: Tokenize + ?Sized> Tokenize for Box<T> {
    fn tokenize(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        (**self).tokenize(text)
    }
}
