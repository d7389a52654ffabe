//! Dense encoder for the permission bit-vector.
//!
//! `P → (P + D) / 2 → D / 2`, ReLU after both layers.

use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::core::dense::{Activation, Dense};
use crate::error::Result;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PermissionEncoder {
    pub hidden: Dense,
    pub logits: Dense,
}

impl PermissionEncoder {
    pub fn new(n_permissions: usize, latent_dim: usize, rng: &mut StdRng) -> Self {
        let hidden_width = (n_permissions + latent_dim) / 2;
        Self {
            hidden: Dense::glorot(n_permissions, hidden_width, Activation::Relu, rng),
            logits: Dense::glorot(hidden_width, latent_dim / 2, Activation::Relu, rng),
        }
    }

    pub fn output_dim(&self) -> usize {
        self.logits.d_out()
    }

    /// `[B, P]` → `[B, D / 2]`.
    pub fn forward(&self, permissions: ArrayView2<f32>) -> Result<Array2<f32>> {
        let hidden = self.hidden.forward(permissions)?;
        self.logits.forward(hidden.view())
    }

    pub fn param_count(&self) -> usize {
        self.hidden.param_count() + self.logits.param_count()
    }
}
