// ============================================================
// Layer 4 — Parallel Corpus Loader
// ============================================================
// Reads two line-aligned UTF-8 files (one sentence per line)
// into Examples.
//
// Per line pair:
//   1. Clean both lines (Preprocessor)
//   2. Skip the pair if EITHER side is empty (counted, not an
//      error)
//   3. Tokenise both sides
//   4. Apply the LengthFilter predicate
//
// Directory layout of a corpus root:
//   <root>/train/text.<src>   <root>/train/text.<trg>
//   <root>/val/text.<src>     <root>/val/text.<trg>
//   <root>/dev5/text.<src>    <root>/dev5/text.<trg>
//
// When the two files differ in line count the AlignmentPolicy
// decides: Truncate pairs up to the shorter file and warns,
// Strict fails with LineCountMismatch.

use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::data::{filter::LengthFilter, preprocessor::Preprocessor};
use crate::domain::{
    traits::{Tokenize, WhitespaceTokenizer},
    Example, PipelineError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentPolicy {
    /// Stop at the end of the shorter file, logging a warning
    #[default]
    Truncate,
    /// Fail when line counts differ
    Strict,
}

/// Examples of one split plus what was dropped on the way in.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub examples:      Vec<Example>,
    pub skipped_empty: usize,
    pub skipped_long:  usize,
    /// Lines left unpaired on the longer file (Truncate policy only)
    pub unpaired:      usize,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

pub struct ParallelCorpusLoader {
    src_tokenizer: Box<dyn Tokenize>,
    trg_tokenizer: Box<dyn Tokenize>,
    filter:        LengthFilter,
    policy:        AlignmentPolicy,
    preprocessor:  Preprocessor,
}

impl ParallelCorpusLoader {
    /// Whitespace tokenisation on both sides, Truncate policy.
    pub fn new(filter: LengthFilter) -> Self {
        Self {
            src_tokenizer: Box::new(WhitespaceTokenizer),
            trg_tokenizer: Box::new(WhitespaceTokenizer),
            filter,
            policy:        AlignmentPolicy::default(),
            preprocessor:  Preprocessor::new(),
        }
    }

    pub fn with_tokenizers(mut self, src: Box<dyn Tokenize>, trg: Box<dyn Tokenize>) -> Self {
        self.src_tokenizer = src;
        self.trg_tokenizer = trg;
        self
    }

    pub fn with_policy(mut self, policy: AlignmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn load(&self, src_path: &Path, trg_path: &Path) -> Result<Corpus, PipelineError> {
        let mut src_lines = open_lines(src_path)?;
        let mut trg_lines = open_lines(trg_path)?;
        let mut corpus    = Corpus::default();
        let mut paired    = 0usize;

        loop {
            let (src, trg) = match (src_lines.next(), trg_lines.next()) {
                (Some(s), Some(t)) => (
                    s.map_err(|e| PipelineError::io(src_path, e))?,
                    t.map_err(|e| PipelineError::io(trg_path, e))?,
                ),
                (None, None) => break,
                (Some(_), None) => {
                    let rest = 1 + count_rest(src_lines, src_path)?;
                    self.on_unpaired(&mut corpus, paired + rest, paired)?;
                    break;
                }
                (None, Some(_)) => {
                    let rest = 1 + count_rest(trg_lines, trg_path)?;
                    self.on_unpaired(&mut corpus, paired, paired + rest)?;
                    break;
                }
            };
            paired += 1;

            let src = self.preprocessor.clean_line(&src);
            let trg = self.preprocessor.clean_line(&trg);
            if src.is_empty() || trg.is_empty() {
                corpus.skipped_empty += 1;
                continue;
            }

            let example = Example::new(
                self.src_tokenizer.tokenize(&src)?,
                self.trg_tokenizer.tokenize(&trg)?,
            );
            // A tokenizer may still map a non-empty line to nothing
            if example.source.is_empty() || example.target.is_empty() {
                corpus.skipped_empty += 1;
                continue;
            }
            if !self.filter.keep(&example) {
                corpus.skipped_long += 1;
                continue;
            }
            corpus.examples.push(example);
        }

        tracing::debug!(
            "Loaded {} pairs from '{}' / '{}' ({} empty, {} over {} tokens)",
            corpus.examples.len(),
            src_path.display(),
            trg_path.display(),
            corpus.skipped_empty,
            corpus.skipped_long,
            self.filter.max_len,
        );
        Ok(corpus)
    }

    fn on_unpaired(
        &self,
        corpus:    &mut Corpus,
        src_lines: usize,
        trg_lines: usize,
    ) -> Result<(), PipelineError> {
        match self.policy {
            AlignmentPolicy::Strict => {
                Err(PipelineError::LineCountMismatch { src_lines, trg_lines })
            }
            AlignmentPolicy::Truncate => {
                corpus.unpaired = src_lines.abs_diff(trg_lines);
                tracing::warn!(
                    "Corpus files not line-aligned ({} vs {} lines); \
                     dropping {} unpaired lines",
                    src_lines, trg_lines, corpus.unpaired,
                );
                Ok(())
            }
        }
    }
}

fn open_lines(path: &Path) -> Result<Lines<BufReader<File>>, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(BufReader::new(file).lines())
}

fn count_rest(lines: Lines<BufReader<File>>, path: &Path) -> Result<usize, PipelineError> {
    let mut n = 0;
    for line in lines {
        line.map_err(|e| PipelineError::io(path, e))?;
        n += 1;
    }
    Ok(n)
}

// ─── Split Layout ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusLayout {
    pub root:     PathBuf,
    pub src_lang: String,
    pub trg_lang: String,
    pub train:    String,
    pub val:      String,
    pub test:     String,
}

impl CorpusLayout {
    pub fn new(root: impl Into<PathBuf>, src_lang: &str, trg_lang: &str) -> Self {
        Self {
            root:     root.into(),
            src_lang: src_lang.to_string(),
            trg_lang: trg_lang.to_string(),
            train:    "train".to_string(),
            val:      "val".to_string(),
            test:     "dev5".to_string(),
        }
    }

    /// `(<root>/<split>/text.<src>, <root>/<split>/text.<trg>)`
    pub fn paths(&self, split: &str) -> (PathBuf, PathBuf) {
        let dir = self.root.join(split);
        (
            dir.join(format!("text.{}", self.src_lang)),
            dir.join(format!("text.{}", self.trg_lang)),
        )
    }

    pub fn load_split(
        &self,
        loader: &ParallelCorpusLoader,
        split:  &str,
    ) -> Result<Corpus, PipelineError> {
        let (src, trg) = self.paths(split);
        let corpus = loader.load(&src, &trg)?;
        tracing::info!("Split '{}': {} examples", split, corpus.len());
        Ok(corpus)
    }

    /// Load train, validation and test splits with the same loader.
    pub fn splits(
        &self,
        loader: &ParallelCorpusLoader,
    ) -> Result<(Corpus, Corpus, Corpus), PipelineError> {
        Ok((
            self.load_split(loader, &self.train)?,
            self.load_split(loader, &self.val)?,
            self.load_split(loader, &self.test)?,
        ))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_pair(dir: &Path, src: &str, trg: &str) -> (PathBuf, PathBuf) {
        let s = dir.join("text.pt");
        let t = dir.join("text.en");
        fs::write(&s, src).unwrap();
        fs::write(&t, trg).unwrap();
        (s, t)
    }

    #[test]
    fn test_empty_side_drops_pair() {
        let dir = tempfile::tempdir().unwrap();
        let (s, t) = write_pair(dir.path(), "ola\n\nmundo\n", "hi\nthere\nworld\n");
        let corpus = ParallelCorpusLoader::new(LengthFilter::default())
            .load(&s, &t)
            .unwrap();
        assert_eq!(
            corpus.examples,
            vec![Example::from_text("ola", "hi"), Example::from_text("mundo", "world")]
        );
        assert_eq!(corpus.skipped_empty, 1);
    }

    #[test]
    fn test_whitespace_only_target_counts_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (s, t) = write_pair(dir.path(), "a\nb\n", "  \t \nc\n");
        let corpus = ParallelCorpusLoader::new(LengthFilter::default())
            .load(&s, &t)
            .unwrap();
        assert_eq!(corpus.examples, vec![Example::from_text("b", "c")]);
    }

    #[test]
    fn test_length_filter_applied_during_load() {
        let dir = tempfile::tempdir().unwrap();
        let (s, t) = write_pair(dir.path(), "a b c\na\n", "x\ny z\n");
        let corpus = ParallelCorpusLoader::new(LengthFilter::new(2))
            .load(&s, &t)
            .unwrap();
        assert_eq!(corpus.examples, vec![Example::from_text("a", "y z")]);
        assert_eq!(corpus.skipped_long, 1);
    }

    #[test]
    fn test_shorter_file_truncates_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let (s, t) = write_pair(dir.path(), "a\nb\nc\n", "x\ny\n");
        let corpus = ParallelCorpusLoader::new(LengthFilter::default())
            .load(&s, &t)
            .unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.unpaired, 1);
    }

    #[test]
    fn test_strict_policy_rejects_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let (s, t) = write_pair(dir.path(), "a\n", "x\ny\nz\n");
        let err = ParallelCorpusLoader::new(LengthFilter::default())
            .with_policy(AlignmentPolicy::Strict)
            .load(&s, &t)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::LineCountMismatch { src_lines: 1, trg_lines: 3 }
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ParallelCorpusLoader::new(LengthFilter::default())
            .load(&dir.path().join("nope.pt"), &dir.path().join("nope.en"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }

    struct FailingTokenizer;

    impl Tokenize for FailingTokenizer {
        fn tokenize(&self, text: &str) -> Result<Vec<String>, PipelineError> {
            Err(PipelineError::Tokenizer(format!("cannot encode '{text}'")))
        }
    }

    #[test]
    fn test_tokenizer_failure_aborts_load() {
        let dir = tempfile::tempdir().unwrap();
        let (s, t) = write_pair(dir.path(), "ola
", "hi
");
        let err = ParallelCorpusLoader::new(LengthFilter::default())
            .with_tokenizers(Box::new(WhitespaceTokenizer), Box::new(FailingTokenizer))
            .load(&s, &t)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Tokenizer(ref msg) if msg.contains("hi")));
    }

    #[test]
    fn test_layout_paths_and_splits() {
        let dir = tempfile::tempdir().unwrap();
        for split in ["train", "val", "dev5"] {
            let d = dir.path().join(split);
            fs::create_dir_all(&d).unwrap();
            write_pair(&d, "um dois\n", "one two\n");
        }
        let layout = CorpusLayout::new(dir.path(), "pt", "en");
        let (src, _) = layout.paths("val");
        assert!(src.ends_with("val/text.pt"));

        let loader = ParallelCorpusLoader::new(LengthFilter::default());
        let (train, val, test) = layout.splits(&loader).unwrap();
        assert_eq!((train.len(), val.len(), test.len()), (1, 1, 1));
    }
}
