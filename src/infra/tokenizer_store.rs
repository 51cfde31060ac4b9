// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Per-language tokenizers and frozen vocabularies on disk:
//
//   <dir>/tokenizer.<lang>.json   HuggingFace tokenizer (optional)
//   <dir>/vocab.<lang>.json       Vocabulary built from train split
//
// A language without a tokenizer.json falls back to whitespace
// splitting. `export_word_level` writes a WordLevel tokenizer.json
// straight from a Vocabulary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokenizers::Tokenizer;

use crate::domain::{
    traits::{Tokenize, WhitespaceTokenizer},
    vocab::{BLANK_WORD, BOS_WORD, EOS_WORD, UNK_WORD},
    PipelineError, Vocabulary,
};

/// A HuggingFace tokenizer behind the `Tokenize` seam.
pub struct HfTokenizer {
    inner: Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))?;
        Ok(Self { inner })
    }
}

impl Tokenize for HfTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        self.inner
            .encode(text, false)
            .map(|enc| enc.get_tokens().to_vec())
            .map_err(|e| PipelineError::Tokenizer(e.to_string()))
    }
}

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn tokenizer_path(&self, lang: &str) -> PathBuf {
        self.dir.join(format!("tokenizer.{lang}.json"))
    }

    fn vocab_path(&self, lang: &str) -> PathBuf {
        self.dir.join(format!("vocab.{lang}.json"))
    }

    /// The stored tokenizer for `lang`, or whitespace splitting.
    pub fn load_for(&self, lang: &str) -> Result<Box<dyn Tokenize>> {
        let path = self.tokenizer_path(lang);
        if path.exists() {
            tracing::info!("Loading '{}' tokenizer from '{}'", lang, path.display());
            Ok(Box::new(HfTokenizer::from_file(&path)?))
        } else {
            tracing::info!("No tokenizer for '{}', using whitespace tokenization", lang);
            Ok(Box::new(WhitespaceTokenizer))
        }
    }

    pub fn save_vocab(&self, lang: &str, vocab: &Vocabulary) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.vocab_path(lang);
        std::fs::write(&path, serde_json::to_string(vocab)?)
            .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))?;
        tracing::info!("Saved '{}' vocabulary ({} entries)", lang, vocab.len());
        Ok(())
    }

    /// None when no vocabulary was stored for `lang` yet.
    pub fn load_vocab(&self, lang: &str) -> Result<Option<Vocabulary>> {
        let path = self.vocab_path(lang);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read vocabulary from '{}'", path.display()))?;
        let mut vocab: Vocabulary = serde_json::from_str(&json)?;
        vocab.reindex();
        Ok(Some(vocab))
    }

    /// Write a WordLevel tokenizer.json for `lang` whose ids match `vocab`.
    pub fn export_word_level(&self, lang: &str, vocab: &Vocabulary) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let mut entries = serde_json::Map::new();
        for id in 0..vocab.len() as u32 {
            entries.insert(vocab.itos(id).to_string(), serde_json::json!(id));
        }

        let added_tokens: Vec<serde_json::Value> = [UNK_WORD, BLANK_WORD, BOS_WORD, EOS_WORD]
            .iter()
            .map(|tok| {
                serde_json::json!({
                    "id": vocab.stoi(tok), "content": tok, "single_word": false,
                    "lstrip": false, "rstrip": false, "normalized": false, "special": true
                })
            })
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": entries,
                "unk_token": UNK_WORD
            }
        });

        let path = self.tokenizer_path(lang);
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON to '{}'", path.display()))?;
        tracing::info!("Exported '{}' tokenizer to '{}'", lang, path.display());
        Ok(path)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tokenizer_falls_back_to_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path()).load_for("pt").unwrap();
        assert_eq!(tok.tokenize("bom  dia").unwrap(), vec!["bom", "dia"]);
    }

    #[test]
    fn test_vocab_round_trip_rebuilds_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        assert!(store.load_vocab("en").unwrap().is_none());

        let vocab = Vocabulary::from_tokens(["hello", "world"]);
        store.save_vocab("en", &vocab).unwrap();
        let back = store.load_vocab("en").unwrap().unwrap();
        assert_eq!(back.len(), vocab.len());
        assert_eq!(back.stoi("world"), vocab.stoi("world"));
    }

    #[test]
    fn test_exported_word_level_tokenizer_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let vocab = Vocabulary::from_tokens(["hello", "world"]);
        store.export_word_level("en", &vocab).unwrap();

        let tok = store.load_for("en").unwrap();
        assert_eq!(tok.tokenize("hello world").unwrap(), vec!["hello", "world"]);
        assert_eq!(tok.tokenize("hello mars").unwrap(), vec!["hello", UNK_WORD]);
    }
}
