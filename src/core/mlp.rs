//! Residual MLP step shared by every attention block.
//!
//! ```text
//! x   = norm(z + a)                     z: pre-attention latent, a: attention output
//! h   = drop(gelu(drop(gelu(x·W1 + b1))·W2 + b2))
//! out = norm(x + h)
//! ```
//!
//! The normaliser is passed in by the owning block: a block uses one set of
//! normalisation parameters for its query, context and residual steps.

use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::core::dense::{Activation, Dense};
use crate::core::norm::LayerNorm;
use crate::error::{expect_dim, Result};
use crate::kernels::dropout::{dropout, Mode};

/// Two-layer feed-forward transform of width `latent_dim`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResidualMlp {
    pub hidden: Dense,
    pub output: Dense,
    pub dropout_rate: f32,
}

impl ResidualMlp {
    pub fn new(latent_dim: usize, dropout_rate: f32, rng: &mut StdRng) -> Self {
        Self {
            hidden: Dense::glorot(latent_dim, latent_dim, Activation::Gelu, rng),
            output: Dense::glorot(latent_dim, latent_dim, Activation::Gelu, rng),
            dropout_rate,
        }
    }

    /// Zero feed-forward weights: the transform contributes `gelu(0) = 0`.
    pub fn zeros(latent_dim: usize, dropout_rate: f32) -> Self {
        Self {
            hidden: Dense::zeros(latent_dim, latent_dim, Activation::Gelu),
            output: Dense::zeros(latent_dim, latent_dim, Activation::Gelu),
            dropout_rate,
        }
    }

    /// Compose the attention output `attended` onto the pre-attention
    /// `latent`. Both are `[slots, latent_dim]`.
    pub fn forward(
        &self,
        norm: &LayerNorm,
        latent: ArrayView2<f32>,
        attended: ArrayView2<f32>,
        mode: &mut Mode<'_>,
    ) -> Result<Array2<f32>> {
        expect_dim("attention output", "slots", latent.nrows(), attended.nrows())?;
        expect_dim("attention output", "features", latent.ncols(), attended.ncols())?;

        let x = norm.forward((&latent + &attended).view())?;

        let h = self.hidden.forward(x.view())?;
        let h = dropout(h, self.dropout_rate, mode);
        let h = self.output.forward(h.view())?;
        let h = dropout(h, self.dropout_rate, mode);

        norm.forward((&x + &h).view())
    }

    pub fn param_count(&self) -> usize {
        self.hidden.param_count() + self.output.param_count()
    }
}
