//! Layer normalisation over the feature axis.
//!
//! ```text
//! y = (x - mean(x)) / sqrt(var(x) + ε) · γ + β
//! ```
//!
//! Statistics are computed per row (per latent slot or sequence position);
//! the variance is the population variance.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::LAYER_NORM_EPS;
use crate::error::{expect_dim, Result};

/// Learnable layer normalisation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerNorm {
    /// Scale γ ∈ R^{features}
    pub gamma: Array1<f32>,

    /// Shift β ∈ R^{features}
    pub beta: Array1<f32>,

    /// Variance stabiliser.
    pub eps: f32,
}

impl LayerNorm {
    /// Identity affine parameters (γ = 1, β = 0).
    pub fn new(features: usize) -> Self {
        Self {
            gamma: Array1::ones(features),
            beta: Array1::zeros(features),
            eps: LAYER_NORM_EPS,
        }
    }

    pub fn features(&self) -> usize {
        self.gamma.len()
    }

    /// Normalise every row of a `[rows, features]` matrix.
    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        expect_dim("layer norm input", "features", self.features(), x.ncols())?;

        let mut out = x.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            let mean = row.mean().unwrap_or(0.0);
            let var = row.mapv(|v| (v - mean) * (v - mean)).mean().unwrap_or(0.0);
            let inv_std = 1.0 / (var + self.eps).sqrt();
            row.mapv_inplace(|v| (v - mean) * inv_std);
            row *= &self.gamma;
            row += &self.beta;
        }
        Ok(out)
    }

    pub fn param_count(&self) -> usize {
        self.gamma.len() + self.beta.len()
    }
}
