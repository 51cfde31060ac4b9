// Test doubles shared by the ml/ and application/ unit tests.
//
// CopyModel is a scripted "translator": at target position k it puts
// all the probability mass on source token k, and on </s> once the
// source (or its unpadded span) is exhausted. Greedy decoding over it
// therefore reproduces the source sentence followed by </s>.

use std::path::{Path, PathBuf};

use anyhow::Result;
use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

use crate::data::rebatch::TranslationBatch;
use crate::infra::checkpoint::record_module;
use crate::ml::model::{ModelMode, TranslationModel};
use crate::ml::trainer::{LossCompute, Phase};

pub type TestBackend = burn::backend::NdArray;

pub const PAD: u32 = 1;
pub const EOS: u32 = 3;

/// Gives the double real parameters to serialise.
#[derive(Module, Debug)]
pub struct TinyModule<B: Backend> {
    linear: Linear<B>,
}

pub struct CopyModel {
    vocab_size:   usize,
    mode:         ModelMode,
    device:       <TestBackend as Backend>::Device,
    moves:        usize,
    emit_padding: bool,
    weights:      TinyModule<TestBackend>,
}

impl CopyModel {
    pub fn new(vocab_size: usize) -> Self {
        let device = Default::default();
        Self {
            vocab_size,
            mode: ModelMode::Train,
            weights: TinyModule { linear: LinearConfig::new(2, 2).init(&device) },
            device,
            moves: 0,
            emit_padding: false,
        }
    }

    /// Emit <blank> at target position 1 (a broken decoder).
    pub fn emitting_padding(mut self) -> Self {
        self.emit_padding = true;
        self
    }

    pub fn moves(&self) -> usize {
        self.moves
    }
}

impl TranslationModel<TestBackend> for CopyModel {
    fn forward(
        &self,
        src:        Tensor<TestBackend, 2, Int>,
        trg_input:  Tensor<TestBackend, 2, Int>,
        src_mask:   Tensor<TestBackend, 2, Bool>,
        _trg_mask:  Tensor<TestBackend, 3, Bool>,
    ) -> Tensor<TestBackend, 3> {
        let [n, s] = src.dims();
        let [_, t] = trg_input.dims();
        let v = self.vocab_size;
        let device = src.device();

        let ids: Vec<i64>  = src.into_data().iter::<i64>().collect();
        let mask: Vec<i64> = src_mask.int().into_data().iter::<i64>().collect();

        let mut logits = vec![0.0f32; n * t * v];
        for row in 0..n {
            for k in 0..t {
                let next = if self.emit_padding && k == 1 {
                    PAD as usize
                } else if k < s && mask[row * s + k] == 1 {
                    ids[row * s + k] as usize
                } else {
                    EOS as usize
                };
                logits[(row * t + k) * v + next] = 10.0;
            }
        }

        Tensor::<TestBackend, 1>::from_floats(logits.as_slice(), &device).reshape([n, t, v])
    }

    fn mode(&self) -> ModelMode {
        self.mode
    }

    fn set_mode(&mut self, mode: ModelMode) {
        self.mode = mode;
    }

    fn device(&self) -> <TestBackend as Backend>::Device {
        self.device.clone()
    }

    fn move_to(&mut self, device: &<TestBackend as Backend>::Device) {
        self.device = device.clone();
        self.moves += 1;
    }

    fn save(&self, path: &Path) -> Result<PathBuf> {
        record_module(&self.weights, path)
    }

    fn class_name(&self) -> String {
        "CopyModel".to_string()
    }
}

/// Loss of `per_token` for every target token; records the phases seen.
#[derive(Debug, Default)]
pub struct FixedLoss {
    pub per_token: f64,
    pub phases:    Vec<Phase>,
}

impl FixedLoss {
    pub fn new(per_token: f64) -> Self {
        Self { per_token, phases: Vec::new() }
    }
}

impl LossCompute<TestBackend, CopyModel> for FixedLoss {
    fn compute(
        &mut self,
        model: &mut CopyModel,
        batch: &TranslationBatch<TestBackend>,
        phase: Phase,
    ) -> Result<f64> {
        let expected = match phase {
            Phase::Train    => ModelMode::Train,
            Phase::Validate => ModelMode::Eval,
        };
        anyhow::ensure!(model.mode() == expected, "{:?} pass ran in {:?} mode", phase, model.mode());
        self.phases.push(phase);
        Ok(batch.ntokens as f64 * self.per_token)
    }
}
