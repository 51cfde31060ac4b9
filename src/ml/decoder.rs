// ============================================================
// Layer 5 — Greedy Decoder
// ============================================================
// Autoregressive decoding: start every row with <s>, run the
// model on the prefix decoded so far, append the argmax of the
// last position, repeat.
//
// Stops after `max_len` total tokens (including <s>) or as soon as
// every row has produced </s>. Rows that finished early keep
// receiving tokens until the whole batch is done; callers truncate
// at the first </s>.

use burn::prelude::*;

use crate::data::rebatch::subsequent_mask;
use crate::ml::model::TranslationModel;

/// Causal mask `[n, t, t]` for an unpadded prefix.
pub fn causal_mask<B: Backend>(n: usize, t: usize, device: &B::Device) -> Tensor<B, 3, Bool> {
    let single: Vec<i32> = subsequent_mask(t)
        .into_iter()
        .flatten()
        .map(|m| m as i32)
        .collect();
    let flat: Vec<i32> = single.iter().copied().cycle().take(n * t * t).collect();
    Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device)
        .reshape([n, t, t])
        .equal_elem(1)
}

/// Returns `[N, L]` token ids, `L <= max_len`, column 0 is `start_symbol`.
pub fn greedy_decode<B, M>(
    model:        &M,
    src:          Tensor<B, 2, Int>,
    src_mask:     Tensor<B, 2, Bool>,
    max_len:      usize,
    start_symbol: u32,
    end_symbol:   u32,
) -> Tensor<B, 2, Int>
where
    B: Backend,
    M: TranslationModel<B>,
{
    let [n, _] = src.dims();
    let device = src.device();

    let start: Vec<i32> = vec![start_symbol as i32; n];
    let mut ys = Tensor::<B, 1, Int>::from_ints(start.as_slice(), &device).reshape([n, 1]);
    let mut finished = vec![false; n];

    for _ in 1..max_len {
        let t = ys.dims()[1];
        let logits = model.forward(
            src.clone(),
            ys.clone(),
            src_mask.clone(),
            causal_mask::<B>(n, t, &device),
        );
        let [_, steps, vocab] = logits.dims();

        let next = logits
            .slice([0..n, steps - 1..steps, 0..vocab])
            .argmax(2)
            .reshape([n, 1]);

        for (done, id) in finished.iter_mut().zip(next.clone().into_data().iter::<i64>()) {
            *done |= id == end_symbol as i64;
        }
        ys = Tensor::cat(vec![ys, next], 1);

        if finished.iter().all(|&d| d) {
            break;
        }
    }
    ys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::testing::{CopyModel, TestBackend, EOS, PAD};

    fn rows(t: Tensor<TestBackend, 2, Int>) -> Vec<Vec<i64>> {
        let [_, w] = t.dims();
        let flat: Vec<i64> = t.into_data().iter::<i64>().collect();
        flat.chunks(w).map(<[i64]>::to_vec).collect()
    }

    #[test]
    fn test_copies_source_then_stops() {
        let model = CopyModel::new(10);
        let device = Default::default();
        let src = Tensor::<TestBackend, 1, Int>::from_ints([5, 6, 7, 8, 9, PAD as i32], &device)
            .reshape([2, 3]);
        let src_mask = src.clone().not_equal_elem(PAD as i32);

        let out = rows(greedy_decode(&model, src, src_mask, 20, 2, EOS));
        assert_eq!(out[0], vec![2, 5, 6, 7, EOS as i64]);
        // Row 1 finished one step earlier and keeps emitting </s>
        assert_eq!(out[1], vec![2, 8, 9, EOS as i64, EOS as i64]);
    }

    #[test]
    fn test_respects_max_len() {
        let model = CopyModel::new(10);
        let device = Default::default();
        let src = Tensor::<TestBackend, 1, Int>::from_ints([5, 6, 7, 8], &device).reshape([1, 4]);
        let src_mask = src.clone().not_equal_elem(PAD as i32);

        let out = rows(greedy_decode(&model, src, src_mask, 3, 2, EOS));
        assert_eq!(out[0], vec![2, 5, 6]);
    }

    #[test]
    fn test_causal_mask_shape() {
        let device = Default::default();
        let m = causal_mask::<TestBackend>(2, 3, &device);
        assert_eq!(m.dims(), [2, 3, 3]);
        let flat: Vec<i64> = m.int().into_data().iter::<i64>().collect();
        assert_eq!(&flat[..9], &[1, 0, 0, 1, 1, 0, 1, 1, 1]);
    }
}
