// ============================================================
// Layer 5 — BLEU Evaluator
// ============================================================
// Decodes a split with the greedy decoder and scores it with one
// of two strategies, chosen by name through `get_bleu`:
//
//   "sentence" (alias "nltk")      → running mean of sentence BLEU,
//                                     reported after every batch
//   "corpus"   (alias "sacrebleu") → collect every hypothesis and
//                                     reference, score once at the end
//
// Shared decode loop, per batch:
//   1. Rebatcher → tensors on the model's device
//   2. greedy_decode up to max_len or until every row emitted </s>
//   3. ids → tokens for hypothesis and reference alike:
//      drop the leading <s>, cut at the first </s>, and fail if a
//      <blank> survives inside the kept span
//
// The whole loop runs under an EvalMode guard, so the model's
// prior mode is restored on success, error and interruption.

use std::{fmt, str::FromStr};

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{AdaptiveBatcher, Pass},
    rebatch::Rebatcher,
};
use crate::domain::{Example, PipelineError, Vocabulary};
use crate::infra::{progress::pass_bar, side_files::SideFiles};
use crate::ml::{
    bleu::{corpus_bleu, sentence_bleu, CorpusBleu},
    decoder::greedy_decode,
    model::{EvalMode, TranslationModel},
    signal::StopSignal,
};

/// Decoding cap used for BLEU passes.
pub const MAX_LEN_BLEU: usize = 100;

/// Token budget used for BLEU passes.
pub const BLEU_BUDGET: usize = 512;

pub type LengthKey = fn(&Example) -> (usize, usize);

// ─── Method selection ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BleuMethod {
    Sentence,
    Corpus,
}

impl FromStr for BleuMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentence" | "nltk"      => Ok(Self::Sentence),
            "corpus"   | "sacrebleu" => Ok(Self::Corpus),
            _ => Err(PipelineError::UnsupportedMetric(s.to_string())),
        }
    }
}

impl fmt::Display for BleuMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sentence => write!(f, "sentence"),
            Self::Corpus   => write!(f, "corpus"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BleuReport {
    pub method:    BleuMethod,
    /// In [0, 1]
    pub score:     f64,
    pub sentences: usize,
    pub batches:   usize,
    /// Sentence strategy: running mean after each decoded batch
    pub running:   Vec<f64>,
    /// Corpus statistics, corpus strategy only
    pub corpus:    Option<CorpusBleu>,
}

impl BleuReport {
    pub fn percent(&self) -> f64 {
        self.score * 100.0
    }
}

// ─── Detokenisation ───────────────────────────────────────────────────────────

/// Ids of one decoded (or reference) row → tokens between `<s>` and
/// the first `</s>`. `row` is only used for the error report.
pub fn strip_specials(ids: &[u32], vocab: &Vocabulary, row: usize) -> Result<Vec<String>, PipelineError> {
    let body = match ids.split_first() {
        Some((&first, rest)) if first == vocab.bos_id() => rest,
        _ => ids,
    };
    let end = body
        .iter()
        .position(|&id| id == vocab.eos_id())
        .unwrap_or(body.len());

    body[..end]
        .iter()
        .enumerate()
        .map(|(position, &id)| {
            if id == vocab.pad_id() {
                Err(PipelineError::PaddingInHypothesis { row, position })
            } else {
                Ok(vocab.itos(id).to_string())
            }
        })
        .collect()
}

// ─── Evaluator ────────────────────────────────────────────────────────────────

pub struct BleuEvaluator<'v> {
    rebatcher:  Rebatcher<'v>,
    trg_vocab:  &'v Vocabulary,
    batcher:    AdaptiveBatcher<LengthKey>,
    max_len:    usize,
    stop:       StopSignal,
    side_files: Option<SideFiles>,
    progress:   bool,
}

impl<'v> BleuEvaluator<'v> {
    pub fn new(src_vocab: &'v Vocabulary, trg_vocab: &'v Vocabulary) -> Self {
        Self {
            rebatcher:  Rebatcher::new(src_vocab, trg_vocab),
            trg_vocab,
            batcher:    AdaptiveBatcher::new(BLEU_BUDGET),
            max_len:    MAX_LEN_BLEU,
            stop:       StopSignal::new(),
            side_files: None,
            progress:   false,
        }
    }

    pub fn with_batcher(mut self, batcher: AdaptiveBatcher<LengthKey>) -> Self {
        self.batcher = batcher;
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.max(1);
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Corpus strategy only: persist both streams before scoring.
    pub fn with_side_files(mut self, files: SideFiles) -> Self {
        self.side_files = Some(files);
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Score `examples` with the strategy named by `method`.
    pub fn get_bleu<B, M>(
        &self,
        method:   &str,
        model:    &mut M,
        examples: &[Example],
    ) -> Result<BleuReport, PipelineError>
    where
        B: Backend,
        M: TranslationModel<B>,
    {
        self.score::<B, M>(method.parse()?, model, examples)
    }

    pub fn score<B, M>(
        &self,
        method:   BleuMethod,
        model:    &mut M,
        examples: &[Example],
    ) -> Result<BleuReport, PipelineError>
    where
        B: Backend,
        M: TranslationModel<B>,
    {
        let report = match method {
            BleuMethod::Sentence => self.sentence_strategy::<B, M>(model, examples)?,
            BleuMethod::Corpus   => self.corpus_strategy::<B, M>(model, examples)?,
        };
        tracing::info!(
            "{} BLEU = {:.2} over {} sentences ({} batches)",
            report.method,
            report.percent(),
            report.sentences,
            report.batches,
        );
        Ok(report)
    }

    fn sentence_strategy<B, M>(&self, model: &mut M, examples: &[Example]) -> Result<BleuReport, PipelineError>
    where
        B: Backend,
        M: TranslationModel<B>,
    {
        let mut sum = 0.0f64;
        let mut sentences = 0usize;
        let mut running = Vec::new();

        let batches = self.decode_pass::<B, M, _>(model, examples, |pairs| {
            for (hyp, reference) in &pairs {
                sum += sentence_bleu(reference, hyp);
                sentences += 1;
            }
            let mean = sum / sentences.max(1) as f64;
            running.push(mean);
            tracing::debug!("running sentence BLEU {:.2} after {} sentences", mean * 100.0, sentences);
            format!("BLEU {:.2}", mean * 100.0)
        })?;

        let score = if sentences == 0 { 0.0 } else { sum / sentences as f64 };
        Ok(BleuReport {
            method: BleuMethod::Sentence,
            score,
            sentences,
            batches,
            running,
            corpus: None,
        })
    }

    fn corpus_strategy<B, M>(&self, model: &mut M, examples: &[Example]) -> Result<BleuReport, PipelineError>
    where
        B: Backend,
        M: TranslationModel<B>,
    {
        let mut hypotheses = Vec::with_capacity(examples.len());
        let mut references = Vec::with_capacity(examples.len());

        let batches = self.decode_pass::<B, M, _>(model, examples, |pairs| {
            for (hyp, reference) in pairs {
                hypotheses.push(hyp.join(" "));
                references.push(reference.join(" "));
            }
            format!("{} sentences", hypotheses.len())
        })?;

        if let Some(files) = &self.side_files {
            files.write(&hypotheses, &references)?;
        }

        let stats = corpus_bleu(&hypotheses, &references)?;
        Ok(BleuReport {
            method:    BleuMethod::Corpus,
            score:     stats.score,
            sentences: hypotheses.len(),
            batches,
            running:   Vec::new(),
            corpus:    Some(stats),
        })
    }

    /// Decode every batch of `examples` in corpus order and hand the
    /// detokenised (hypothesis, reference) pairs to `on_batch`, whose
    /// return value becomes the progress message. Returns the number
    /// of batches decoded.
    fn decode_pass<B, M, F>(&self, model: &mut M, examples: &[Example], mut on_batch: F) -> Result<usize, PipelineError>
    where
        B: Backend,
        M: TranslationModel<B>,
        F: FnMut(Vec<(Vec<String>, Vec<String>)>) -> String,
    {
        let model  = EvalMode::<B, M>::enter(model);
        let device = model.device();
        let bos    = self.trg_vocab.bos_id();
        let eos    = self.trg_vocab.eos_id();

        let pb = pass_bar(self.batcher.count(examples, Pass::Eval), "bleu", self.progress);
        let mut batches = 0usize;

        for raw in self.batcher.batches(examples, Pass::Eval) {
            self.stop.check(batches)?;

            let padded  = self.rebatcher.rebatch(&raw)?;
            let tensors = padded.to_tensors::<B>(&device);
            let decoded = greedy_decode(&*model, tensors.src, tensors.src_mask, self.max_len, bos, eos);

            let width = decoded.dims()[1];
            let ids: Vec<u32> = decoded
                .into_data()
                .iter::<i64>()
                .map(|id| id as u32)
                .collect();

            let mut pairs = Vec::with_capacity(padded.batch_size());
            for (row, hyp) in ids.chunks(width.max(1)).enumerate() {
                let hyp       = strip_specials(hyp, self.trg_vocab, row)?;
                let reference = strip_specials(&padded.full_target(row), self.trg_vocab, row)?;
                pairs.push((hyp, reference));
            }

            pb.set_message(on_batch(pairs));
            pb.inc(1);
            batches += 1;
        }

        pb.finish_and_clear();
        Ok(batches)
    }
}

// ─── Side-file scoring ────────────────────────────────────────────────────────

/// Re-score hypotheses and references persisted by an earlier corpus pass.
pub fn score_side_files(method: BleuMethod, files: &SideFiles) -> Result<BleuReport, PipelineError> {
    let (hypotheses, references) = files.read()?;
    if hypotheses.len() != references.len() {
        return Err(PipelineError::ReferenceCountMismatch {
            hypotheses: hypotheses.len(),
            references: references.len(),
        });
    }

    let report = match method {
        BleuMethod::Sentence => {
            let total: f64 = hypotheses
                .iter()
                .zip(&references)
                .map(|(h, r)| {
                    let h: Vec<&str> = h.split_whitespace().collect();
                    let r: Vec<&str> = r.split_whitespace().collect();
                    sentence_bleu(&r, &h)
                })
                .sum();
            BleuReport {
                method,
                score: if hypotheses.is_empty() { 0.0 } else { total / hypotheses.len() as f64 },
                sentences: hypotheses.len(),
                batches: 0,
                running: Vec::new(),
                corpus: None,
            }
        }
        BleuMethod::Corpus => {
            let stats = corpus_bleu(&hypotheses, &references)?;
            BleuReport {
                method,
                score: stats.score,
                sentences: hypotheses.len(),
                batches: 0,
                running: Vec::new(),
                corpus: Some(stats),
            }
        }
    };
    Ok(report)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::ModelMode;
    use crate::ml::testing::{CopyModel, TestBackend};

    fn vocab() -> Vocabulary {
        Vocabulary::from_tokens(["a", "b", "c", "d", "e"])
    }

    fn ids(vocab: &Vocabulary, tokens: &[&str]) -> Vec<u32> {
        tokens.iter().map(|t| vocab.stoi(t)).collect()
    }

    #[test]
    fn test_method_names() {
        assert_eq!("sentence".parse::<BleuMethod>().unwrap(), BleuMethod::Sentence);
        assert_eq!("SacreBLEU".parse::<BleuMethod>().unwrap(), BleuMethod::Corpus);
        let err = "meteor".parse::<BleuMethod>().unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedMetric(m) if m == "meteor"));
    }

    #[test]
    fn test_strip_drops_bos_and_cuts_at_eos() {
        let v = vocab();
        let row = ids(&v, &["<s>", "a", "b", "</s>", "<blank>"]);
        assert_eq!(strip_specials(&row, &v, 0).unwrap(), vec!["a", "b"]);

        let no_eos = ids(&v, &["<s>", "a", "b"]);
        assert_eq!(strip_specials(&no_eos, &v, 0).unwrap(), vec!["a", "b"]);

        // only a leading <s> is dropped
        let inner = ids(&v, &["a", "<s>", "</s>"]);
        assert_eq!(strip_specials(&inner, &v, 0).unwrap(), vec!["a", "<s>"]);
    }

    #[test]
    fn test_strip_rejects_padding_in_span() {
        let v = vocab();
        let row = ids(&v, &["<s>", "a", "<blank>", "b", "</s>"]);
        let err = strip_specials(&row, &v, 4).unwrap_err();
        assert!(matches!(err, PipelineError::PaddingInHypothesis { row: 4, position: 1 }));
    }

    #[test]
    fn test_unknown_method_fails_before_decoding() {
        let v = vocab();
        let mut model = CopyModel::new(v.len());
        let err = BleuEvaluator::new(&v, &v)
            .get_bleu::<TestBackend, _>("chrf", &mut model, &[])
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedMetric(_)));
        assert_eq!(model.mode(), ModelMode::Train);
    }

    #[test]
    fn test_perfect_copy_scores_max_with_both_methods() {
        let v = vocab();
        let data = vec![
            Example::from_text("a b c d", "a b c d"),
            Example::from_text("e d", "e d"),
            Example::from_text("c", "c"),
        ];
        let eval = BleuEvaluator::new(&v, &v).with_max_len(10);

        for method in ["sentence", "corpus"] {
            let mut model = CopyModel::new(v.len());
            let report = eval.get_bleu::<TestBackend, _>(method, &mut model, &data).unwrap();
            assert!((report.score - 1.0).abs() < 1e-9, "{method}: {}", report.score);
            assert_eq!(report.sentences, 3);
            assert_eq!(model.mode(), ModelMode::Train);
        }
    }

    #[test]
    fn test_corpus_strategy_matches_direct_scoring() {
        let v = vocab();
        let data = vec![Example::from_text("a b e d", "a b c d")];
        let mut model = CopyModel::new(v.len());
        let report = BleuEvaluator::new(&v, &v)
            .with_max_len(10)
            .score::<TestBackend, _>(BleuMethod::Corpus, &mut model, &data)
            .unwrap();
        let direct = corpus_bleu(&["a b e d"], &["a b c d"]).unwrap();
        assert_eq!(report.corpus, Some(direct.clone()));
        assert_eq!(report.score, direct.score);
    }

    #[test]
    fn test_mode_restored_when_decoding_fails() {
        let v = vocab();
        let data = vec![Example::from_text("a b c", "a b c")];
        let mut model = CopyModel::new(v.len()).emitting_padding();
        model.set_mode(ModelMode::Train);

        let err = BleuEvaluator::new(&v, &v)
            .with_max_len(10)
            .score::<TestBackend, _>(BleuMethod::Corpus, &mut model, &data)
            .unwrap_err();
        assert!(matches!(err, PipelineError::PaddingInHypothesis { .. }));
        assert_eq!(model.mode(), ModelMode::Train);
    }

    #[test]
    fn test_sentinel_spellings_in_text_are_ordinary_tokens() {
        let v = vocab();
        let data = vec![
            Example::from_text("a b <blank> c d", "a b <blank> c d"),
            Example::from_text("a </s> b c d", "a </s> b c d"),
        ];
        for method in [BleuMethod::Sentence, BleuMethod::Corpus] {
            let mut model = CopyModel::new(v.len());
            let report = BleuEvaluator::new(&v, &v)
                .with_max_len(10)
                .score::<TestBackend, _>(method, &mut model, &data)
                .unwrap();
            assert!((report.score - 1.0).abs() < 1e-9, "{method}: {}", report.score);
            if let Some(stats) = report.corpus {
                assert_eq!(stats.sys_len, stats.ref_len);
            }
        }
    }

    #[test]
    fn test_sentence_mean_is_updated_per_batch() {
        let v = vocab();
        // budget 3 puts each example in its own batch, shortest first
        let data = vec![
            Example::from_text("a b c d", "a b c d"),
            Example::from_text("e d", "c c"),
            Example::from_text("c", "c"),
        ];
        let mut model = CopyModel::new(v.len());
        let report = BleuEvaluator::new(&v, &v)
            .with_batcher(AdaptiveBatcher::new(3))
            .with_max_len(10)
            .score::<TestBackend, _>(BleuMethod::Sentence, &mut model, &data)
            .unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.running.len(), 3);
        let expected = [1.0, 0.5, 2.0 / 3.0];
        for (got, want) in report.running.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{:?}", report.running);
        }
        assert!((report.score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_stop_signal_interrupts_pass() {
        let v = vocab();
        let data = vec![Example::from_text("a", "a")];
        let stop = StopSignal::new();
        stop.stop();
        let mut model = CopyModel::new(v.len());
        let err = BleuEvaluator::new(&v, &v)
            .with_stop_signal(stop)
            .score::<TestBackend, _>(BleuMethod::Sentence, &mut model, &data)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Interrupted { batches: 0 }));
    }

    #[test]
    fn test_side_files_rescore_identically() {
        let dir = tempfile::tempdir().unwrap();
        let files = SideFiles::in_dir(dir.path(), "dev");
        let v = vocab();
        let data = vec![
            Example::from_text("a b e d", "a b c d"),
            Example::from_text("c d", "c d e"),
        ];
        let mut model = CopyModel::new(v.len());
        let live = BleuEvaluator::new(&v, &v)
            .with_max_len(10)
            .with_side_files(files.clone())
            .score::<TestBackend, _>(BleuMethod::Corpus, &mut model, &data)
            .unwrap();

        let again = score_side_files(BleuMethod::Corpus, &files).unwrap();
        assert_eq!(again.score, live.score);
        assert_eq!(again.sentences, 2);
    }
}
