// ============================================================
// Layer 4 — Rebatcher
// ============================================================
// Turns a raw batch of Examples into model-ready tensors.
//
// For a batch of N examples:
//
//   src        [N, S]     source ids, padded with <blank>
//   trg_input  [N, T]     <s> y1 … yk          (target minus last)
//   trg_output [N, T]     y1 … yk </s>         (target minus first)
//   src_mask   [N, S]     true where src is not padding
//   trg_mask   [N, T, T]  causal & key-not-padding:
//                         mask[n][i][j] = j <= i && trg_input[n][j] != pad
//
// so trg_output[n][k] == trg_input[n][k + 1] inside the unpadded span
// and the loss target of every position is the next token.
//
// The padding is done on host vectors first (PaddedBatch, fully
// testable without a backend) and converted to Burn tensors last,
// the same flatten → from_ints → reshape route as any Burn batcher.

use burn::prelude::*;

use crate::data::batcher::RawBatch;
use crate::domain::{Example, PipelineError, Vocabulary};

// ─── Host-side batch ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    pub src:        Vec<Vec<u32>>,
    pub trg_input:  Vec<Vec<u32>>,
    pub trg_output: Vec<Vec<u32>>,
    pub src_mask:   Vec<Vec<bool>>,
    pub trg_mask:   Vec<Vec<Vec<bool>>>,
    /// Non-padding positions of trg_output (loss normaliser)
    pub ntokens:    usize,
    pub pad_id:     u32,
}

impl PaddedBatch {
    pub fn batch_size(&self) -> usize {
        self.src.len()
    }

    pub fn src_len(&self) -> usize {
        self.src.first().map_or(0, Vec::len)
    }

    pub fn trg_len(&self) -> usize {
        self.trg_input.first().map_or(0, Vec::len)
    }

    /// The padded, unshifted target of row `n`: `<s> y1 … yk </s> <blank>…`.
    pub fn full_target(&self, n: usize) -> Vec<u32> {
        let mut row = Vec::with_capacity(self.trg_len() + 1);
        row.extend(self.trg_input[n].first().copied());
        row.extend_from_slice(&self.trg_output[n]);
        row
    }

    /// Share of padding in the source and target tensors together.
    pub fn padding_ratio(&self) -> f64 {
        let total = self.batch_size() * (self.src_len() + self.trg_len());
        if total == 0 {
            return 0.0;
        }
        let pad = self
            .src
            .iter()
            .chain(self.trg_input.iter())
            .flatten()
            .filter(|&&id| id == self.pad_id)
            .count();
        pad as f64 / total as f64
    }

    /// Move the batch onto `device` as Burn tensors.
    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> TranslationBatch<B> {
        let n = self.batch_size();
        let s = self.src_len();
        let t = self.trg_len();

        let src        = int_matrix::<B>(&self.src, n, s, device);
        let trg_input  = int_matrix::<B>(&self.trg_input, n, t, device);
        let trg_output = int_matrix::<B>(&self.trg_output, n, t, device);

        let src_mask = src.clone().not_equal_elem(self.pad_id as i32);

        let mask_flat: Vec<i32> = self
            .trg_mask
            .iter()
            .flatten()
            .flatten()
            .map(|&m| m as i32)
            .collect();
        let trg_mask = Tensor::<B, 1, Int>::from_ints(mask_flat.as_slice(), device)
            .reshape([n, t, t])
            .equal_elem(1);

        TranslationBatch {
            src,
            trg_input,
            trg_output,
            src_mask,
            trg_mask,
            ntokens: self.ntokens,
        }
    }
}

fn int_matrix<B: Backend>(
    rows:   &[Vec<u32>],
    n:      usize,
    width:  usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let flat: Vec<i32> = rows.iter().flatten().map(|&x| x as i32).collect();
    Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([n, width])
}

// ─── Tensor batch ─────────────────────────────────────────────────────────────

/// A rebatched batch on a Burn backend.
#[derive(Debug, Clone)]
pub struct TranslationBatch<B: Backend> {
    pub src:        Tensor<B, 2, Int>,
    pub trg_input:  Tensor<B, 2, Int>,
    pub trg_output: Tensor<B, 2, Int>,
    pub src_mask:   Tensor<B, 2, Bool>,
    pub trg_mask:   Tensor<B, 3, Bool>,
    pub ntokens:    usize,
}

// ─── Masks ────────────────────────────────────────────────────────────────────

/// Lower-triangular `size × size` mask, row-major: position `i` may
/// attend to every `j <= i`.
pub fn subsequent_mask(size: usize) -> Vec<Vec<bool>> {
    (0..size)
        .map(|i| (0..size).map(|j| j <= i).collect())
        .collect()
}

// ─── Rebatcher ────────────────────────────────────────────────────────────────

pub struct Rebatcher<'v> {
    src_vocab: &'v Vocabulary,
    trg_vocab: &'v Vocabulary,
}

impl<'v> Rebatcher<'v> {
    pub fn new(src_vocab: &'v Vocabulary, trg_vocab: &'v Vocabulary) -> Self {
        Self { src_vocab, trg_vocab }
    }

    pub fn pad_id(&self) -> u32 {
        self.trg_vocab.pad_id()
    }

    /// Numericalise and pad one raw batch.
    pub fn rebatch(&self, batch: &RawBatch<'_>) -> Result<PaddedBatch, PipelineError> {
        let src: Vec<Vec<u32>> = batch
            .iter()
            .map(|ex: &&Example| self.src_vocab.encode_source(&ex.source))
            .collect();
        let trg: Vec<Vec<u32>> = batch
            .iter()
            .map(|ex| self.trg_vocab.encode_target(&ex.target))
            .collect();
        self.pad(src, trg)
    }

    /// Pad already-numericalised sides. Targets must carry their
    /// `<s>` / `</s>` wrappers.
    pub fn pad(
        &self,
        src: Vec<Vec<u32>>,
        trg: Vec<Vec<u32>>,
    ) -> Result<PaddedBatch, PipelineError> {
        if src.len() != trg.len() {
            return Err(PipelineError::BatchSizeMismatch {
                src: src.len(),
                trg: trg.len(),
            });
        }

        let pad     = self.pad_id();
        let src_len = src.iter().map(Vec::len).max().unwrap_or(0);
        let full    = trg.iter().map(Vec::len).max().unwrap_or(0);
        // trg_input / trg_output are each one shorter than the full target
        let trg_len = full.saturating_sub(1);

        let src: Vec<Vec<u32>> = src.into_iter().map(|row| pad_row(row, src_len, pad)).collect();
        let trg: Vec<Vec<u32>> = trg.into_iter().map(|row| pad_row(row, full, pad)).collect();

        let trg_input: Vec<Vec<u32>> = trg
            .iter()
            .map(|row| row[..trg_len].to_vec())
            .collect();
        let trg_output: Vec<Vec<u32>> = trg
            .iter()
            .map(|row| row[full - trg_len..].to_vec())
            .collect();

        let src_mask = src
            .iter()
            .map(|row| row.iter().map(|&id| id != pad).collect())
            .collect();

        let causal = subsequent_mask(trg_len);
        let trg_mask = trg_input
            .iter()
            .map(|row| {
                causal
                    .iter()
                    .map(|allowed| {
                        allowed
                            .iter()
                            .zip(row)
                            .map(|(&a, &id)| a && id != pad)
                            .collect()
                    })
                    .collect()
            })
            .collect();

        let ntokens = trg_output
            .iter()
            .flatten()
            .filter(|&&id| id != pad)
            .count();

        Ok(PaddedBatch {
            src,
            trg_input,
            trg_output,
            src_mask,
            trg_mask,
            ntokens,
            pad_id: pad,
        })
    }
}

fn pad_row(mut row: Vec<u32>, width: usize, pad: u32) -> Vec<u32> {
    row.resize(width, pad);
    row
}
