// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// One checkpoint per epoch, never overwritten, epochs strictly
// increasing. Each checkpoint is two files:
//
//   {task}_E{epoch}_{timestamp}_{host}.mpk         weights (CompactRecorder)
//   {task}_E{epoch}_{timestamp}_{host}.meta.json   CheckpointRecord
//
// The record carries everything the old filename used to encode
// (epoch, BLEU, losses, time, host, model class) as typed fields.
// `legacy_name` still renders that filename for tools that parse it:
//
//   pt_to_en_E3_BLEU_27.41_TransformerL_2.1034_1718031337_gpu01.pt
//
// with `unscored` in place of the BLEU field when the epoch was
// not scored.
//
// Also stores train_config.json next to the checkpoints.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, FileRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::domain::PipelineError;
use crate::infra::metrics::EpochMetrics;
use crate::ml::model::TranslationModel;

const RECORD_SUFFIX: &str = ".meta.json";
const CONFIG_FILE: &str = "train_config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub task:        String,
    pub epoch:       usize,
    /// In [0, 1]; None when the epoch was not scored
    pub bleu:        Option<f64>,
    pub train_loss:  Option<f64>,
    pub val_loss:    Option<f64>,
    /// Unix seconds
    pub timestamp:   u64,
    pub host:        String,
    pub model_class: String,
    /// Weights file, relative to the checkpoint directory
    pub artifact:    String,
    pub legacy_name: String,
}

impl CheckpointRecord {
    pub fn render_legacy_name(
        task:        &str,
        epoch:       usize,
        bleu:        Option<f64>,
        model_class: &str,
        val_loss:    Option<f64>,
        timestamp:   u64,
        host:        &str,
    ) -> String {
        let score = bleu.map_or_else(|| "unscored".to_string(), |b| format!("{:.2}", b * 100.0));
        let loss  = val_loss.map_or_else(|| "na".to_string(), |l| format!("{l:.4}"));
        format!("{task}_E{epoch}_BLEU_{score}_{model_class}L_{loss}_{timestamp}_{host}.pt")
    }
}

pub struct CheckpointManager {
    dir:     PathBuf,
    task:    String,
    host:    String,
    records: Vec<CheckpointRecord>,
}

impl CheckpointManager {
    /// Create `dir` if needed and pick up every record of `task`
    /// already stored there.
    pub fn open(dir: impl Into<PathBuf>, task: &str) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;

        let mut records = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| PipelineError::io(&dir, e))? {
            let path = entry.map_err(|e| PipelineError::io(&dir, e))?.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(RECORD_SUFFIX));
            if !is_record {
                continue;
            }
            let json = fs::read_to_string(&path).map_err(|e| PipelineError::io(&path, e))?;
            let record: CheckpointRecord = serde_json::from_str(&json)
                .with_context(|| format!("Corrupt checkpoint record '{}'", path.display()))?;
            if record.task == task {
                records.push(record);
            }
        }
        records.sort_by_key(|r| r.epoch);

        if let Some(last) = records.last() {
            tracing::info!("Found {} checkpoints for '{}', last epoch {}", records.len(), task, last.epoch);
        }

        Ok(Self {
            dir,
            task: task.to_string(),
            host: host_name(),
            records,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn records(&self) -> &[CheckpointRecord] {
        &self.records
    }

    pub fn latest(&self) -> Option<&CheckpointRecord> {
        self.records.last()
    }

    pub fn last_epoch(&self) -> Option<usize> {
        self.latest().map(|r| r.epoch)
    }

    /// Persist `model` for the epoch described by `metrics`.
    pub fn save<B, M>(&mut self, model: &M, metrics: &EpochMetrics) -> Result<CheckpointRecord>
    where
        B: Backend,
        M: TranslationModel<B>,
    {
        let epoch = metrics.epoch;
        if let Some(last) = self.last_epoch() {
            if epoch <= last {
                return Err(PipelineError::NonMonotonicEpoch { epoch, last }.into());
            }
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let stem = format!("{}_E{}_{}_{}", self.task, epoch, timestamp, self.host);

        let record_path = self.dir.join(format!("{stem}{RECORD_SUFFIX}"));
        if record_path.exists() {
            return Err(PipelineError::CheckpointExists(record_path).into());
        }

        let written = model
            .save(&self.dir.join(&stem))
            .with_context(|| format!("Failed to save checkpoint for epoch {epoch}"))?;
        let artifact = written
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| stem.clone());

        let model_class = model.class_name();
        let record = CheckpointRecord {
            legacy_name: CheckpointRecord::render_legacy_name(
                &self.task,
                epoch,
                metrics.bleu,
                &model_class,
                metrics.val_loss,
                timestamp,
                &self.host,
            ),
            task: self.task.clone(),
            epoch,
            bleu: metrics.bleu,
            train_loss: metrics.train_loss,
            val_loss: metrics.val_loss,
            timestamp,
            host: self.host.clone(),
            model_class,
            artifact,
        };

        fs::write(&record_path, serde_json::to_string_pretty(&record)?)
            .map_err(|e| PipelineError::io(&record_path, e))?;

        tracing::info!("Checkpoint saved: {} ({})", record.artifact, record.legacy_name);
        self.records.push(record.clone());
        Ok(record)
    }

    pub fn save_config<T: Serialize>(&self, cfg: &T) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config<T: DeserializeOwned>(&self) -> Result<T> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Burn records ─────────────────────────────────────────────────────────────

/// Write `module` with CompactRecorder under `path` (extension
/// added by the recorder) and return the file written.
pub fn record_module<B: Backend, M: Module<B>>(module: &M, path: &Path) -> Result<PathBuf> {
    Recorder::<B>::record(&CompactRecorder::new(), module.clone().into_record(), path.to_path_buf())
        .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
    Ok(path.with_extension(<CompactRecorder as FileRecorder<B>>::file_extension()))
}

/// HOSTNAME, then /etc/hostname, then "localhost"; reduced to
/// characters that are safe inside a file stem.
fn host_name() -> String {
    let raw = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string());
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}
