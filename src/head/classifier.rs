//! Classifier head: pooled latent ⊕ permission logits → softmax.

use ndarray::{concatenate, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::core::dense::{Activation, Dense};
use crate::error::{expect_batch, Error, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassifierHead {
    pub output: Dense,
}

impl ClassifierHead {
    /// `input_dim` is the concatenated width (latent dim + permission logits).
    pub fn new(input_dim: usize, n_categories: usize, rng: &mut StdRng) -> Self {
        Self {
            output: Dense::glorot(input_dim, n_categories, Activation::Softmax, rng),
        }
    }

    /// `pooled: [B, D]`, `permission_logits: [B, D/2]` → `[B, categories]`.
    pub fn forward(
        &self,
        pooled: ArrayView2<f32>,
        permission_logits: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        expect_batch(
            "pooled latent",
            pooled.nrows(),
            "permission logits",
            permission_logits.nrows(),
        )?;
        let joined = concatenate(Axis(1), &[pooled.view(), permission_logits.view()])
            .map_err(|e| Error::InvalidConfig(format!("cannot join head inputs: {}", e)))?;
        self.output.forward(joined.view())
    }

    pub fn param_count(&self) -> usize {
        self.output.param_count()
    }
}
