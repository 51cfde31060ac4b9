// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch to checkpoints/metrics.csv:
//
//   epoch,train_loss,val_loss,bleu
//   0,,,0.184100
//   1,3.124500,3.089200,0.213000
//
// A phase that did not run leaves its cell empty. Losses are
// per-token averages, BLEU is in [0, 1].

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const HEADER: &str = "epoch,train_loss,val_loss,bleu";

/// One row of metrics for a single epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    pub train_loss: Option<f64>,
    pub val_loss:   Option<f64>,
    pub bleu:       Option<f64>,
}

impl EpochMetrics {
    pub fn new(
        epoch:      usize,
        train_loss: Option<f64>,
        val_loss:   Option<f64>,
        bleu:       Option<f64>,
    ) -> Self {
        Self { epoch, train_loss, val_loss, bleu }
    }

    /// True if this epoch was scored and beats `best_bleu`.
    pub fn is_improvement(&self, best_bleu: Option<f64>) -> bool {
        match (self.bleu, best_bleu) {
            (Some(b), Some(best)) => b > best,
            (Some(_), None)       => true,
            (None, _)             => false,
        }
    }

    fn csv_row(&self) -> String {
        let cell = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
        format!(
            "{},{},{},{}",
            self.epoch,
            cell(self.train_loss),
            cell(self.val_loss),
            cell(self.bleu),
        )
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header only when the file is new, so resumed runs
    /// keep appending to the same log.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", m.csv_row())?;
        tracing::debug!("Logged epoch {} metrics", m.epoch);
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, None, None, Some(0.25));
        assert!(m.is_improvement(Some(0.20)));
        assert!(!m.is_improvement(Some(0.30)));
        assert!(m.is_improvement(None));
        assert!(!EpochMetrics::new(3, None, None, None).is_improvement(None));
    }

    #[test]
    fn test_missing_phases_leave_blank_cells() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(0, None, None, Some(0.5))).unwrap();
        logger.log(&EpochMetrics::new(1, Some(1.25), Some(1.5), None)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![HEADER, "0,,,0.500000", "1,1.250000,1.500000,"]);
    }

    #[test]
    fn test_reopening_keeps_single_header() {
        let dir = tempfile::tempdir().unwrap();
        MetricsLogger::new(dir.path()).unwrap().log(&EpochMetrics::new(0, None, None, None)).unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        let text = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(text.matches(HEADER).count(), 1);
    }
}
