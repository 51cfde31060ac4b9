// ============================================================
// Layer 5 — Training Orchestrator
// ============================================================
// Epoch state machine:
//
//   epoch start
//     → train pass       (optional)  shuffled, seed + epoch
//     → validation pass  (optional)  corpus order, EvalMode
//     → BLEU pass        (optional)  only once epoch >= threshold
//     → checkpoint                   inside HostPlacement
//     → next epoch
//
// Every phase is a separate toggle; a run may skip both loss
// passes and still score and checkpoint each epoch.
//
// Loss, backward and optimiser step are the caller's business
// (LossCompute); this layer only feeds it rebatched tensors and
// turns the summed losses into a per-token average.
//
// A failing BLEU pass ends the run before the checkpoint step,
// so no checkpoint is ever written with an undefined score.

use anyhow::{Context, Result};
use burn::prelude::*;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{AdaptiveBatcher, BatchConfig, Pass, RawBatch},
    rebatch::{Rebatcher, TranslationBatch},
};
use crate::domain::{Example, Vocabulary};
use crate::infra::{
    checkpoint::{CheckpointManager, CheckpointRecord},
    metrics::{EpochMetrics, MetricsLogger},
    progress::pass_bar,
    side_files::SideFiles,
};
use crate::ml::{
    evaluator::{BleuEvaluator, BleuMethod, LengthKey, MAX_LEN_BLEU},
    model::{EvalMode, HostPlacement, ModelMode, TranslationModel},
    signal::StopSignal,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Train,
    Validate,
}

/// Criterion (and, for `Phase::Train`, backward + optimiser step)
/// supplied by the caller.
pub trait LossCompute<B: Backend, M> {
    /// Loss summed over the `batch.ntokens` target tokens.
    fn compute(&mut self, model: &mut M, batch: &TranslationBatch<B>, phase: Phase) -> Result<f64>;
}

/// One loss pass over `batches`; returns the per-token average
/// (NaN when the pass saw no target tokens).
pub fn run_epoch<'a, B, M, L, I>(
    batches:   I,
    rebatcher: &Rebatcher<'_>,
    model:     &mut M,
    loss:      &mut L,
    phase:     Phase,
    stop:      &StopSignal,
    pb:        &ProgressBar,
) -> Result<f64>
where
    B: Backend,
    M: TranslationModel<B>,
    L: LossCompute<B, M>,
    I: IntoIterator<Item = RawBatch<'a>>,
{
    let device = model.device();
    let mut total_loss   = 0.0f64;
    let mut total_tokens = 0usize;

    for (i, raw) in batches.into_iter().enumerate() {
        stop.check(i)?;
        let batch = rebatcher.rebatch(&raw)?.to_tensors::<B>(&device);
        total_loss   += loss.compute(model, &batch, phase)?;
        total_tokens += batch.ntokens;

        if total_tokens > 0 {
            pb.set_message(format!("loss {:.4}", total_loss / total_tokens as f64));
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(if total_tokens == 0 {
        f64::NAN
    } else {
        total_loss / total_tokens as f64
    })
}

// ─── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub epochs:         usize,
    pub batch:          BatchConfig,
    pub max_len_bleu:   usize,
    pub run_train:      bool,
    pub run_validation: bool,
    /// None disables the BLEU phase
    pub bleu_method:    Option<BleuMethod>,
    /// First epoch that runs the BLEU phase
    pub bleu_threshold: usize,
    /// Persist hypotheses / references of corpus BLEU passes
    pub side_files:     bool,
    pub progress:       bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs:         100,
            batch:          BatchConfig::default(),
            max_len_bleu:   MAX_LEN_BLEU,
            run_train:      true,
            run_validation: true,
            bleu_method:    Some(BleuMethod::Corpus),
            bleu_threshold: 0,
            side_files:     false,
            progress:       true,
        }
    }
}

/// The three example sets an epoch touches.
#[derive(Debug, Clone, Copy)]
pub struct EpochData<'d> {
    pub train: &'d [Example],
    pub val:   &'d [Example],
    pub bleu:  &'d [Example],
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub metrics:    EpochMetrics,
    pub checkpoint: CheckpointRecord,
}

// ─── Trainer ──────────────────────────────────────────────────────────────────

pub struct Trainer<'v> {
    cfg:           TrainerConfig,
    src_vocab:     &'v Vocabulary,
    trg_vocab:     &'v Vocabulary,
    train_batcher: AdaptiveBatcher<LengthKey>,
    val_batcher:   AdaptiveBatcher<LengthKey>,
    checkpoints:   CheckpointManager,
    metrics:       Option<MetricsLogger>,
    stop:          StopSignal,
}

impl<'v> Trainer<'v> {
    pub fn new(
        cfg:         TrainerConfig,
        src_vocab:   &'v Vocabulary,
        trg_vocab:   &'v Vocabulary,
        checkpoints: CheckpointManager,
    ) -> Self {
        Self {
            train_batcher: AdaptiveBatcher::new(cfg.batch.train_budget).with_pool_factor(cfg.batch.pool_factor),
            val_batcher:   AdaptiveBatcher::new(cfg.batch.val_budget).with_pool_factor(cfg.batch.pool_factor),
            cfg,
            src_vocab,
            trg_vocab,
            checkpoints,
            metrics: None,
            stop: StopSignal::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsLogger) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    fn evaluator(&self, epoch: usize) -> BleuEvaluator<'v> {
        let mut eval = BleuEvaluator::new(self.src_vocab, self.trg_vocab)
            .with_batcher(AdaptiveBatcher::new(self.cfg.batch.bleu_budget).with_pool_factor(self.cfg.batch.pool_factor))
            .with_max_len(self.cfg.max_len_bleu)
            .with_stop_signal(self.stop.clone())
            .with_progress(self.cfg.progress);
        if self.cfg.side_files {
            eval = eval.with_side_files(SideFiles::in_dir(self.checkpoints.dir(), &format!("E{epoch}")));
        }
        eval
    }

    /// Run `cfg.epochs` epochs, continuing after the last stored
    /// checkpoint. Checkpoints are written from `host`.
    pub fn fit<B, M, L>(
        &mut self,
        model: &mut M,
        loss:  &mut L,
        data:  EpochData<'_>,
        host:  &B::Device,
    ) -> Result<Vec<EpochSummary>>
    where
        B: Backend,
        M: TranslationModel<B>,
        L: LossCompute<B, M>,
    {
        let first = self.checkpoints.last_epoch().map_or(0, |e| e + 1);
        let last  = first + self.cfg.epochs;
        let rebatcher = Rebatcher::new(self.src_vocab, self.trg_vocab);

        let mut best_bleu = self
            .checkpoints
            .records()
            .iter()
            .filter_map(|r| r.bleu)
            .reduce(f64::max);
        let mut summaries = Vec::with_capacity(self.cfg.epochs);

        tracing::info!(
            "Training epochs {}..{} ({} train / {} val / {} BLEU examples)",
            first,
            last,
            data.train.len(),
            data.val.len(),
            data.bleu.len(),
        );

        for epoch in first..last {
            // ── Train pass ────────────────────────────────────────────────────
            let train_loss = if self.cfg.run_train {
                model.set_mode(ModelMode::Train);
                let pass = Pass::Train { seed: self.cfg.batch.seed.wrapping_add(epoch as u64) };
                let pb = pass_bar(self.train_batcher.count(data.train, pass), "train", self.cfg.progress);
                let batches = self.train_batcher.batches(data.train, pass);
                Some(
                    run_epoch::<B, M, L, _>(batches, &rebatcher, model, loss, Phase::Train, &self.stop, &pb)
                        .with_context(|| format!("Train pass failed in epoch {epoch}"))?,
                )
            } else {
                None
            };

            // ── Validation pass ───────────────────────────────────────────────
            let val_loss = if self.cfg.run_validation {
                let mut guarded = EvalMode::<B, M>::enter(model);
                let pb = pass_bar(self.val_batcher.count(data.val, Pass::Eval), "valid", self.cfg.progress);
                let batches = self.val_batcher.batches(data.val, Pass::Eval);
                Some(
                    run_epoch::<B, M, L, _>(batches, &rebatcher, &mut *guarded, loss, Phase::Validate, &self.stop, &pb)
                        .with_context(|| format!("Validation pass failed in epoch {epoch}"))?,
                )
            } else {
                None
            };

            // ── BLEU pass ─────────────────────────────────────────────────────
            let bleu = match self.cfg.bleu_method {
                Some(method) if epoch >= self.cfg.bleu_threshold => {
                    let report = self
                        .evaluator(epoch)
                        .score::<B, M>(method, model, data.bleu)
                        .with_context(|| format!("BLEU pass failed in epoch {epoch}; checkpoint skipped"))?;
                    Some(report.score)
                }
                _ => None,
            };

            let metrics = EpochMetrics::new(epoch, train_loss, val_loss, bleu);

            // ── Checkpoint ────────────────────────────────────────────────────
            let checkpoint = {
                let placed = HostPlacement::<B, M>::enter(model, host);
                self.checkpoints.save::<B, M>(&placed, &metrics)?
            };

            if let Some(log) = &self.metrics {
                log.log(&metrics)?;
            }

            tracing::info!(
                "Epoch {:>3}/{} | train_loss={} | val_loss={} | BLEU={}",
                epoch,
                last - 1,
                fmt_opt(train_loss, 1.0),
                fmt_opt(val_loss, 1.0),
                fmt_opt(bleu, 100.0),
            );
            if metrics.is_improvement(best_bleu) {
                tracing::info!("New best BLEU {:.2} at epoch {}", metrics.bleu.unwrap_or(0.0) * 100.0, epoch);
                best_bleu = metrics.bleu;
            }

            summaries.push(EpochSummary { metrics, checkpoint });
        }

        tracing::info!("Training complete!");
        Ok(summaries)
    }
}

fn fmt_opt(v: Option<f64>, scale: f64) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{:.4}", x * scale))
}
