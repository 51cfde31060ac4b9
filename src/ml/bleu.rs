// ============================================================
// Layer 5 — BLEU
// ============================================================
// Two BLEU flavours with deliberately different semantics:
//
// sentence_bleu — one hypothesis vs one reference, on the tokens
//   as given. Uniform 4-gram weights, re-weighted to 1/k over the
//   k available orders when the hypothesis is shorter than 4
//   tokens. No smoothing: an order with zero matches contributes
//   the smallest positive f64, which drives the score to ~0.
//
// corpus_bleu — n-gram matches and totals are summed over the
//   whole corpus first, then combined once. Sentences are
//   re-tokenised with the mteval-v13a rules, zero-match orders
//   use exponential smoothing (1 / (2^k · total)).
//
// Both return a score in [0, 1].
//
//   BLEU = BP · exp( Σ w_n · ln p_n )
//   BP   = 1                 if c > r
//        = exp(1 - r / c)    otherwise   (0 when c = 0)

use std::{collections::HashMap, fmt};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::PipelineError;

pub const MAX_ORDER: usize = 4;

fn ngram_counts<S: AsRef<str>>(tokens: &[S], n: usize) -> HashMap<Vec<&str>, usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }
    for window in tokens.windows(n) {
        let key: Vec<&str> = window.iter().map(AsRef::as_ref).collect();
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// (clipped matches, hypothesis n-grams) for order `n`.
fn clipped_matches<S: AsRef<str>>(hypothesis: &[S], reference: &[S], n: usize) -> (usize, usize) {
    let hyp = ngram_counts(hypothesis, n);
    let refs = ngram_counts(reference, n);
    let matched = hyp
        .iter()
        .map(|(gram, &c)| c.min(refs.get(gram).copied().unwrap_or(0)))
        .sum();
    (matched, hyp.values().sum())
}

fn brevity_penalty(ref_len: usize, hyp_len: usize) -> f64 {
    if hyp_len > ref_len {
        1.0
    } else if hyp_len == 0 {
        0.0
    } else {
        (1.0 - ref_len as f64 / hyp_len as f64).exp()
    }
}

// ─── Sentence BLEU ────────────────────────────────────────────────────────────

pub fn sentence_bleu<S: AsRef<str>>(reference: &[S], hypothesis: &[S]) -> f64 {
    let hyp_len = hypothesis.len();
    if hyp_len == 0 {
        return 0.0;
    }

    let orders  = hyp_len.min(MAX_ORDER);
    let weight  = 1.0 / orders as f64;
    let mut log_sum = 0.0;

    for n in 1..=orders {
        let (matched, total) = clipped_matches(hypothesis, reference, n);
        if n == 1 && matched == 0 {
            return 0.0;
        }
        let p = if matched == 0 {
            f64::MIN_POSITIVE
        } else {
            matched as f64 / total.max(1) as f64
        };
        log_sum += weight * p.ln();
    }

    brevity_penalty(reference.len(), hyp_len) * log_sum.exp()
}

// ─── Corpus BLEU ──────────────────────────────────────────────────────────────

static PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{-~\[-` -&(-+:-@/])").expect("13a punctuation regex"));
static PERIOD_COMMA_AFTER_NONDIGIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^0-9])([.,])").expect("13a period regex"));
static PERIOD_COMMA_BEFORE_NONDIGIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.,])([^0-9])").expect("13a comma regex"));
static DASH_AFTER_DIGIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9])(-)").expect("13a dash regex"));

/// mteval-v13a tokenisation.
pub fn tokenize_13a(line: &str) -> Vec<String> {
    let mut norm = line
        .replace("<skipped>", "")
        .replace("-\n", "")
        .replace('\n', " ");
    if norm.contains('&') {
        norm = norm
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">");
    }

    let norm = format!(" {norm} ");
    let norm = PUNCT_RE.replace_all(&norm, " $1 ").into_owned();
    let norm = PERIOD_COMMA_AFTER_NONDIGIT_RE.replace_all(&norm, "$1 $2 ").into_owned();
    let norm = PERIOD_COMMA_BEFORE_NONDIGIT_RE.replace_all(&norm, " $1 $2").into_owned();
    let norm = DASH_AFTER_DIGIT_RE.replace_all(&norm, "$1 $2 ").into_owned();

    norm.split_whitespace().map(str::to_string).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusBleu {
    pub score:      f64,
    pub counts:     [usize; MAX_ORDER],
    pub totals:     [usize; MAX_ORDER],
    pub precisions: [f64; MAX_ORDER],
    pub bp:         f64,
    pub sys_len:    usize,
    pub ref_len:    usize,
}

impl fmt::Display for CorpusBleu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p: Vec<String> = self
            .precisions
            .iter()
            .map(|p| format!("{:.1}", p * 100.0))
            .collect();
        let ratio = if self.ref_len == 0 {
            0.0
        } else {
            self.sys_len as f64 / self.ref_len as f64
        };
        write!(
            f,
            "BLEU = {:.2} {} (BP = {:.3} ratio = {:.3} hyp_len = {} ref_len = {})",
            self.score * 100.0,
            p.join("/"),
            self.bp,
            ratio,
            self.sys_len,
            self.ref_len,
        )
    }
}

/// Score detokenised sentences, one hypothesis per reference.
pub fn corpus_bleu<H, R>(hypotheses: &[H], references: &[R]) -> Result<CorpusBleu, PipelineError>
where
    H: AsRef<str>,
    R: AsRef<str>,
{
    if hypotheses.len() != references.len() {
        return Err(PipelineError::ReferenceCountMismatch {
            hypotheses: hypotheses.len(),
            references: references.len(),
        });
    }

    let mut counts  = [0usize; MAX_ORDER];
    let mut totals  = [0usize; MAX_ORDER];
    let mut sys_len = 0usize;
    let mut ref_len = 0usize;

    for (hyp, reference) in hypotheses.iter().zip(references) {
        let hyp = tokenize_13a(hyp.as_ref());
        let reference = tokenize_13a(reference.as_ref());
        sys_len += hyp.len();
        ref_len += reference.len();
        for n in 1..=MAX_ORDER {
            let (matched, _) = clipped_matches(&hyp, &reference, n);
            counts[n - 1] += matched;
            totals[n - 1] += (hyp.len() + 1).saturating_sub(n);
        }
    }

    let mut precisions = [0.0f64; MAX_ORDER];
    let mut smooth = 1.0f64;
    for n in 0..MAX_ORDER {
        if totals[n] == 0 {
            break;
        }
        precisions[n] = if counts[n] == 0 {
            smooth *= 2.0;
            1.0 / (smooth * totals[n] as f64)
        } else {
            counts[n] as f64 / totals[n] as f64
        };
    }

    let bp = if sys_len < ref_len {
        if sys_len > 0 {
            (1.0 - ref_len as f64 / sys_len as f64).exp()
        } else {
            0.0
        }
    } else {
        1.0
    };

    let score = if precisions.iter().any(|&p| p == 0.0) {
        0.0
    } else {
        let mean_log = precisions.iter().map(|p| p.ln()).sum::<f64>() / MAX_ORDER as f64;
        bp * mean_log.exp()
    };

    Ok(CorpusBleu { score, counts, totals, precisions, bp, sys_len, ref_len })
}
