// ============================================================
// Layer 6 — Hypothesis / Reference Side Files
// ============================================================
// Plain text, one detokenised sentence per line, so a corpus
// BLEU run can be re-scored later (or by an external tool).

use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::domain::PipelineError;

/// Where a corpus BLEU pass persists its two streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideFiles {
    pub hypotheses: PathBuf,
    pub references: PathBuf,
}

impl SideFiles {
    /// `hyp.<tag>.txt` / `ref.<tag>.txt` under `dir`.
    pub fn in_dir(dir: &Path, tag: &str) -> Self {
        Self {
            hypotheses: dir.join(format!("hyp.{tag}.txt")),
            references: dir.join(format!("ref.{tag}.txt")),
        }
    }

    pub fn write(&self, hypotheses: &[String], references: &[String]) -> Result<(), PipelineError> {
        write_lines(&self.hypotheses, hypotheses)?;
        write_lines(&self.references, references)
    }

    pub fn read(&self) -> Result<(Vec<String>, Vec<String>), PipelineError> {
        Ok((read_lines(&self.hypotheses)?, read_lines(&self.references)?))
    }
}

pub fn write_lines(path: &Path, lines: &[String]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let file = fs::File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let mut out = BufWriter::new(file);
    for line in lines {
        writeln!(out, "{line}").map_err(|e| PipelineError::io(path, e))?;
    }
    out.flush().map_err(|e| PipelineError::io(path, e))?;
    tracing::debug!("Wrote {} lines to '{}'", lines.len(), path.display());
    Ok(())
}

/// One entry per line; the empty line a trailing newline leaves
/// behind is dropped, interior empty lines are kept.
pub fn read_lines(path: &Path) -> Result<Vec<String>, PipelineError> {
    let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let mut lines: Vec<String> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect();
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    Ok(lines)
}
