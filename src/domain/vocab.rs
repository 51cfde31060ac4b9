// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Bidirectional token ↔ id mapping, built once from the
// training split and frozen for the rest of the process.
//
// Layout of the id space:
//   0  <unk>    fallback for out-of-vocabulary tokens
//   1  <blank>  padding
//   2  <s>      sequence start (target side only)
//   3  </s>     sequence end   (target side only)
//   4… corpus tokens with frequency >= min_freq,
//      most frequent first, ties broken alphabetically

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const UNK_WORD:   &str = "<unk>";
pub const BLANK_WORD: &str = "<blank>";
pub const BOS_WORD:   &str = "<s>";
pub const EOS_WORD:   &str = "</s>";

const SPECIALS: [&str; 4] = [UNK_WORD, BLANK_WORD, BOS_WORD, EOS_WORD];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    itos: Vec<String>,
    #[serde(skip)]
    stoi: HashMap<String, u32>,
}

impl Vocabulary {
    /// Count token frequencies over `sequences` and keep every token
    /// seen at least `min_freq` times.
    pub fn build<I, S>(sequences: I, min_freq: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[String]>,
    {
        let mut freq: HashMap<String, usize> = HashMap::new();
        for seq in sequences {
            for tok in seq.as_ref() {
                *freq.entry(tok.clone()).or_insert(0) += 1;
            }
        }

        let mut words: Vec<(String, usize)> = freq
            .into_iter()
            .filter(|(w, n)| *n >= min_freq.max(1) && !SPECIALS.contains(&w.as_str()))
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self::from_tokens(words.into_iter().map(|(w, _)| w))
    }

    /// Build from an explicit token list; specials are always prepended
    /// and repeated tokens keep their first id.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self { itos: Vec::new(), stoi: HashMap::new() };
        let all = SPECIALS
            .iter()
            .map(|s| s.to_string())
            .chain(tokens.into_iter().map(Into::into));
        for tok in all {
            if !vocab.stoi.contains_key(&tok) {
                vocab.stoi.insert(tok.clone(), vocab.itos.len() as u32);
                vocab.itos.push(tok);
            }
        }
        vocab
    }

    /// Rebuild the reverse index (needed after deserialising).
    pub fn reindex(&mut self) {
        self.stoi = self
            .itos
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.itos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itos.is_empty()
    }

    pub fn stoi(&self, token: &str) -> u32 {
        self.stoi.get(token).copied().unwrap_or(self.unk_id())
    }

    pub fn itos(&self, id: u32) -> &str {
        self.itos
            .get(id as usize)
            .map(String::as_str)
            .unwrap_or(UNK_WORD)
    }

    pub fn unk_id(&self) -> u32 { 0 }
    pub fn pad_id(&self) -> u32 { 1 }
    pub fn bos_id(&self) -> u32 { 2 }
    pub fn eos_id(&self) -> u32 { 3 }

    /// Id of a token taken from corpus text. Sentinel ids only come
    /// from wrapping and padding; their literal spellings map to `<unk>`.
    pub fn text_id(&self, token: &str) -> u32 {
        if SPECIALS.contains(&token) {
            self.unk_id()
        } else {
            self.stoi(token)
        }
    }

    /// Source side: plain id sequence, no wrappers.
    pub fn encode_source(&self, tokens: &[String]) -> Vec<u32> {
        tokens.iter().map(|t| self.text_id(t)).collect()
    }

    /// Target side: `<s> tokens… </s>`.
    pub fn encode_target(&self, tokens: &[String]) -> Vec<u32> {
        let mut ids = Vec::with_capacity(tokens.len() + 2);
        ids.push(self.bos_id());
        ids.extend(tokens.iter().map(|t| self.text_id(t)));
        ids.push(self.eos_id());
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seqs(lines: &[&str]) -> Vec<Vec<String>> {
        lines
            .iter()
            .map(|l| l.split_whitespace().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_specials_have_fixed_ids() {
        let v = Vocabulary::from_tokens(["hello"]);
        assert_eq!(v.stoi(BLANK_WORD), v.pad_id());
        assert_eq!(v.stoi(BOS_WORD), v.bos_id());
        assert_eq!(v.stoi(EOS_WORD), v.eos_id());
        assert_eq!(v.itos(4), "hello");
    }

    #[test]
    fn test_min_freq_and_ordering() {
        let v = Vocabulary::build(&seqs(&["b a a c", "b a d", "c"]), 2);
        // a:3, b:2, c:2 kept; d:1 dropped; b/c tie broken alphabetically
        assert_eq!(v.len(), 7);
        assert_eq!(v.itos(4), "a");
        assert_eq!(v.itos(5), "b");
        assert_eq!(v.itos(6), "c");
        assert_eq!(v.stoi("d"), v.unk_id());
    }

    #[test]
    fn test_target_is_wrapped() {
        let v = Vocabulary::from_tokens(["hi"]);
        let ids = v.encode_target(&["hi".to_string(), "zzz".to_string()]);
        assert_eq!(ids, vec![v.bos_id(), 4, v.unk_id(), v.eos_id()]);
    }

    #[test]
    fn test_sentinel_spellings_in_text_map_to_unk() {
        let v = Vocabulary::from_tokens(["a", "b"]);
        let target: Vec<String> = ["a", "<blank>", "</s>", "<s>", "b"].iter().map(|t| t.to_string()).collect();
        assert_eq!(
            v.encode_target(&target),
            vec![v.bos_id(), 4, v.unk_id(), v.unk_id(), v.unk_id(), 5, v.eos_id()]
        );
        assert_eq!(v.encode_source(&target[1..3]), vec![v.unk_id(), v.unk_id()]);
    }

    #[test]
    fn test_from_tokens_dedups_large_lists() {
        let words: Vec<String> = (0..50_000).map(|i| format!("w{}", i % 40_000)).collect();
        let v = Vocabulary::from_tokens(words);
        assert_eq!(v.len(), 4 + 40_000);
        assert_eq!(v.stoi("w39999"), 4 + 39_999);
        assert_eq!(v.itos(4), "w0");
    }

    #[test]
    fn test_reindex_after_json_roundtrip() {
        let v = Vocabulary::from_tokens(["x", "y"]);
        let json = serde_json::to_string(&v).unwrap();
        let mut back: Vocabulary = serde_json::from_str(&json).unwrap();
        back.reindex();
        assert_eq!(back.stoi("y"), 5);
    }
}
