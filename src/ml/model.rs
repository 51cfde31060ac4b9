// ============================================================
// Layer 5 — Translation Model Seam
// ============================================================
// The encoder-decoder itself is supplied from outside; this is
// the narrow contract the pipeline consumes, plus two scoped
// guards that give every mode/device change a guaranteed undo:
//
//   EvalMode      capture mode → force Eval → restore on drop
//   HostPlacement capture device → move to host → move back on drop
//
// Drop runs on every exit path, including `?` early returns.

use std::{
    marker::PhantomData,
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
};

use anyhow::Result;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelMode {
    Train,
    Eval,
}

pub trait TranslationModel<B: Backend> {
    /// src [N, S], trg_input [N, T], src_mask [N, S], trg_mask [N, T, T]
    /// → logits [N, T, V]
    fn forward(
        &self,
        src:       Tensor<B, 2, Int>,
        trg_input: Tensor<B, 2, Int>,
        src_mask:  Tensor<B, 2, Bool>,
        trg_mask:  Tensor<B, 3, Bool>,
    ) -> Tensor<B, 3>;

    fn mode(&self) -> ModelMode;

    fn set_mode(&mut self, mode: ModelMode);

    fn device(&self) -> B::Device;

    /// Blocking transfer of all parameters to `device`.
    fn move_to(&mut self, device: &B::Device);

    /// Serialise the weights under `path` (the implementation may add an
    /// extension) and return the file actually written.
    fn save(&self, path: &Path) -> Result<PathBuf>;

    /// Tag recorded in checkpoint metadata.
    fn class_name(&self) -> String;
}

// ─── EvalMode guard ───────────────────────────────────────────────────────────

pub struct EvalMode<'m, B: Backend, M: TranslationModel<B>> {
    model: &'m mut M,
    prior: ModelMode,
    _backend: PhantomData<B>,
}

impl<'m, B: Backend, M: TranslationModel<B>> EvalMode<'m, B, M> {
    pub fn enter(model: &'m mut M) -> Self {
        let prior = model.mode();
        model.set_mode(ModelMode::Eval);
        Self { model, prior, _backend: PhantomData }
    }
}

impl<B: Backend, M: TranslationModel<B>> Deref for EvalMode<'_, B, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.model
    }
}

impl<B: Backend, M: TranslationModel<B>> DerefMut for EvalMode<'_, B, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.model
    }
}

impl<B: Backend, M: TranslationModel<B>> Drop for EvalMode<'_, B, M> {
    fn drop(&mut self) {
        self.model.set_mode(self.prior);
    }
}

// ─── HostPlacement guard ──────────────────────────────────────────────────────

pub struct HostPlacement<'m, B: Backend, M: TranslationModel<B>> {
    model: &'m mut M,
    prior: B::Device,
}

impl<'m, B: Backend, M: TranslationModel<B>> HostPlacement<'m, B, M> {
    pub fn enter(model: &'m mut M, host: &B::Device) -> Self {
        let prior = model.device();
        model.move_to(host);
        Self { model, prior }
    }
}

impl<B: Backend, M: TranslationModel<B>> Deref for HostPlacement<'_, B, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.model
    }
}

impl<B: Backend, M: TranslationModel<B>> Drop for HostPlacement<'_, B, M> {
    fn drop(&mut self) {
        self.model.move_to(&self.prior);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::testing::{CopyModel, TestBackend};

    fn failing_eval(model: &mut CopyModel) -> Result<()> {
        let guarded = EvalMode::<TestBackend, _>::enter(model);
        assert_eq!(guarded.mode(), ModelMode::Eval);
        anyhow::bail!("decode failed")
    }

    #[test]
    fn test_eval_mode_restores_on_error() {
        let mut model = CopyModel::new(8);
        model.set_mode(ModelMode::Train);
        assert!(failing_eval(&mut model).is_err());
        assert_eq!(model.mode(), ModelMode::Train);
    }

    #[test]
    fn test_eval_mode_keeps_eval_prior() {
        let mut model = CopyModel::new(8);
        model.set_mode(ModelMode::Eval);
        {
            let _g = EvalMode::<TestBackend, _>::enter(&mut model);
        }
        assert_eq!(model.mode(), ModelMode::Eval);
    }

    #[test]
    fn test_host_placement_moves_back() {
        let mut model = CopyModel::new(8);
        let host = Default::default();
        {
            let placed = HostPlacement::<TestBackend, _>::enter(&mut model, &host);
            assert_eq!(placed.moves(), 1);
        }
        assert_eq!(model.moves(), 2);
    }
}
