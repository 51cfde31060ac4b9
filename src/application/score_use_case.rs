// ============================================================
// Layer 2 — ScoreUseCase
// ============================================================
// Re-scores hypothesis / reference side files written by an
// earlier corpus BLEU pass (or by any external system) with
// either BLEU method.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::infra::side_files::SideFiles;
use crate::ml::evaluator::{score_side_files, BleuMethod, BleuReport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub files:  SideFiles,
    /// "sentence" or "corpus"
    pub method: String,
}

pub struct ScoreUseCase {
    config: ScoreConfig,
}

impl ScoreUseCase {
    pub fn new(config: ScoreConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<BleuReport> {
        let method: BleuMethod = self.config.method.parse()?;
        let report = score_side_files(method, &self.config.files).with_context(|| {
            format!(
                "Cannot score '{}' against '{}'",
                self.config.files.hypotheses.display(),
                self.config.files.references.display()
            )
        })?;
        tracing::info!("{} BLEU = {:.2} over {} sentences", method, report.percent(), report.sentences);
        Ok(report)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PipelineError;
    use std::fs;

    fn files(dir: &std::path::Path, hyp: &str, refs: &str) -> SideFiles {
        let files = SideFiles::in_dir(dir, "test");
        fs::write(&files.hypotheses, hyp).unwrap();
        fs::write(&files.references, refs).unwrap();
        files
    }

    #[test]
    fn test_identical_files_score_max() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path(), "the cat sat\nhello\n", "the cat sat\nhello\n");
        for method in ["sentence", "corpus"] {
            let report = ScoreUseCase::new(ScoreConfig { files: files.clone(), method: method.into() })
                .execute()
                .unwrap();
            assert!((report.score - 1.0).abs() < 1e-9);
            assert_eq!(report.sentences, 2);
        }
    }

    #[test]
    fn test_rescoring_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path(), "a cat sat on a mat\nhi\n", "the cat sat on the mat\nhello\n");
        let cfg = ScoreConfig { files, method: "corpus".into() };
        let first = ScoreUseCase::new(cfg.clone()).execute().unwrap();
        let second = ScoreUseCase::new(cfg).execute().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_method() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path(), "a\n", "a\n");
        let err = ScoreUseCase::new(ScoreConfig { files, method: "ter".into() })
            .execute()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnsupportedMetric(_))
        ));
    }

    #[test]
    fn test_line_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path(), "a\nb\n", "a\n");
        let err = ScoreUseCase::new(ScoreConfig { files, method: "sentence".into() })
            .execute()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ReferenceCountMismatch { hypotheses: 2, references: 1 })
        ));
    }
}
