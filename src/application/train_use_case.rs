// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Resolve tokenizers        (Layer 6 - infra)
//   Step 2: Load train / val / dev5   (Layer 4 - data)
//   Step 3: Build or load vocabularies (Layer 3 - domain, Layer 6)
//   Step 4: Save config               (Layer 6 - infra)
//   Step 5: Run the epoch loop        (Layer 5 - ml, BLEU on val)
//
// The model and its loss / optimiser are supplied by the caller
// (execute is generic over them); everything else is built here
// from TrainConfig.

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{
    filter::{LengthFilter, DEFAULT_MAX_LEN},
    loader::{AlignmentPolicy, Corpus, CorpusLayout, ParallelCorpusLoader},
};
use crate::domain::Vocabulary;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    model::TranslationModel,
    signal::StopSignal,
    trainer::{EpochData, EpochSummary, LossCompute, Trainer, TrainerConfig},
};

pub const DEFAULT_MIN_FREQ: usize = 2;

// ─── Corpus Configuration ────────────────────────────────────────────────────
// Shared by `train` and `inspect`: where the corpus lives and how
// its lines become examples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub data_dir:      String,
    pub src_lang:      String,
    pub trg_lang:      String,
    pub max_len:       usize,
    pub min_freq:      usize,
    pub alignment:     AlignmentPolicy,
    /// tokenizer.<lang>.json / vocab.<lang>.json; defaults to the
    /// checkpoint directory
    pub tokenizer_dir: Option<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            data_dir:      "data".to_string(),
            src_lang:      "pt".to_string(),
            trg_lang:      "en".to_string(),
            max_len:       DEFAULT_MAX_LEN,
            min_freq:      DEFAULT_MIN_FREQ,
            alignment:     AlignmentPolicy::Truncate,
            tokenizer_dir: None,
        }
    }
}

impl CorpusConfig {
    pub fn layout(&self) -> CorpusLayout {
        CorpusLayout::new(&self.data_dir, &self.src_lang, &self.trg_lang)
    }

    /// Loader with per-language tokenizers from `store`.
    pub fn loader(&self, store: &TokenizerStore) -> Result<ParallelCorpusLoader> {
        Ok(ParallelCorpusLoader::new(LengthFilter::new(self.max_len))
            .with_tokenizers(store.load_for(&self.src_lang)?, store.load_for(&self.trg_lang)?)
            .with_policy(self.alignment))
    }
}

/// Build both vocabularies from the training split.
pub fn build_vocabs(train: &Corpus, min_freq: usize) -> (Vocabulary, Vocabulary) {
    let src = Vocabulary::build(train.examples.iter().map(|ex| &ex.source), min_freq);
    let trg = Vocabulary::build(train.examples.iter().map(|ex| &ex.target), min_freq);
    (src, trg)
}

// ─── Device placement ────────────────────────────────────────────────────────
// Only the NdArray CPU backend is compiled in, so any accelerator
// request resolves to the host. The fallback is logged and kept
// in the saved config rather than happening silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePlacement {
    pub requested:   String,
    pub resolved:    String,
    pub fell_back:   bool,
}

pub fn resolve_device(requested: &str) -> DevicePlacement {
    let requested = requested.trim().to_ascii_lowercase();
    let fell_back = requested != "cpu";
    if fell_back {
        tracing::warn!("Device '{}' is not available in this build; falling back to cpu", requested);
    }
    DevicePlacement {
        requested,
        resolved: "cpu".to_string(),
        fell_back,
    }
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Serialised to train_config.json beside the checkpoints before
// the first epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub task:           String,
    pub checkpoint_dir: String,
    pub corpus:         CorpusConfig,
    pub trainer:        TrainerConfig,
    pub device:         DevicePlacement,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            task:           "pt_to_en".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            corpus:         CorpusConfig::default(),
            trainer:        TrainerConfig::default(),
            device:         resolve_device("cpu"),
        }
    }
}

/// Corpora and vocabularies a run trains on. Per-epoch BLEU is
/// scored on `val`; `test` is held out for a final evaluation.
pub struct PreparedData {
    pub train:     Corpus,
    pub val:       Corpus,
    pub test:      Corpus,
    pub src_vocab: Vocabulary,
    pub trg_vocab: Vocabulary,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
    stop:   StopSignal,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config, stop: StopSignal::new() }
    }

    /// Tripping `stop` ends the current pass after its batch.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    fn tokenizer_dir(&self) -> PathBuf {
        PathBuf::from(
            self.config
                .corpus
                .tokenizer_dir
                .as_deref()
                .unwrap_or(&self.config.checkpoint_dir),
        )
    }

    /// Steps 1–3: load every split and freeze the vocabularies.
    pub fn prepare(&self) -> Result<PreparedData> {
        let cfg = &self.config.corpus;

        // ── Step 1: Tokenizers ────────────────────────────────────────────────
        let store  = TokenizerStore::new(self.tokenizer_dir());
        let loader = cfg.loader(&store)?;

        // ── Step 2: Splits ────────────────────────────────────────────────────
        let layout = cfg.layout();
        tracing::info!("Loading corpus from '{}' ({} → {})", cfg.data_dir, cfg.src_lang, cfg.trg_lang);
        let (train, val, test) = layout
            .splits(&loader)
            .with_context(|| format!("Cannot load corpus under '{}'", cfg.data_dir))?;

        // ── Step 3: Vocabularies ──────────────────────────────────────────────
        // A stored vocabulary wins so resumed runs keep their ids.
        let (src_vocab, trg_vocab) = match (store.load_vocab(&cfg.src_lang)?, store.load_vocab(&cfg.trg_lang)?) {
            (Some(src), Some(trg)) => {
                tracing::info!("Reusing stored vocabularies");
                (src, trg)
            }
            _ => {
                let (src, trg) = build_vocabs(&train, cfg.min_freq);
                store.save_vocab(&cfg.src_lang, &src)?;
                store.save_vocab(&cfg.trg_lang, &trg)?;
                (src, trg)
            }
        };
        tracing::info!(
            "Vocabulary sizes: {} = {}, {} = {}",
            cfg.src_lang,
            src_vocab.len(),
            cfg.trg_lang,
            trg_vocab.len(),
        );

        Ok(PreparedData { train, val, test, src_vocab, trg_vocab })
    }

    /// Full pipeline: prepare, then train `model`.
    pub fn execute<B, M, L>(&self, model: &mut M, loss: &mut L, host: &B::Device) -> Result<Vec<EpochSummary>>
    where
        B: Backend,
        M: TranslationModel<B>,
        L: LossCompute<B, M>,
    {
        let data = self.prepare()?;
        self.execute_prepared::<B, M, L>(&data, model, loss, host)
    }

    /// Steps 4–5 on already prepared data.
    pub fn execute_prepared<B, M, L>(
        &self,
        data:  &PreparedData,
        model: &mut M,
        loss:  &mut L,
        host:  &B::Device,
    ) -> Result<Vec<EpochSummary>>
    where
        B: Backend,
        M: TranslationModel<B>,
        L: LossCompute<B, M>,
    {
        let cfg = &self.config;

        // ── Step 4: Save config ───────────────────────────────────────────────
        let ckpt = CheckpointManager::open(&cfg.checkpoint_dir, &cfg.task)?;
        ckpt.save_config(cfg)?;
        let metrics = MetricsLogger::new(ckpt.dir())?;
        tracing::info!("Device: {} (requested {})", cfg.device.resolved, cfg.device.requested);

        // ── Step 5: Epoch loop (Layer 5) ──────────────────────────────────────
        let mut trainer = Trainer::new(cfg.trainer.clone(), &data.src_vocab, &data.trg_vocab, ckpt)
            .with_metrics(metrics)
            .with_stop_signal(self.stop.clone());

        trainer.fit::<B, M, L>(
            model,
            loss,
            EpochData {
                train: &data.train.examples,
                val:   &data.val.examples,
                bleu:  &data.val.examples,
            },
            host,
        )
    }
}
