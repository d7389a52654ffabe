//! Fully connected layer: `y = act(x · W + b)`.

use ndarray::{Array1, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{expect_dim, Result};
use crate::kernels::ops::{gelu, relu, softmax_rows_inplace};

/// Output activation of a dense layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Linear,
    Gelu,
    Relu,
    /// Row-wise softmax over the output features.
    Softmax,
}

impl Activation {
    fn apply(self, x: &mut Array2<f32>) {
        match self {
            Activation::Linear => {}
            Activation::Gelu => x.mapv_inplace(gelu),
            Activation::Relu => x.mapv_inplace(relu),
            Activation::Softmax => softmax_rows_inplace(x),
        }
    }
}

/// Weights for a dense layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dense {
    /// Kernel: W ∈ R^{in × out}
    pub weight: Array2<f32>,

    /// Bias: b ∈ R^{out}
    pub bias: Array1<f32>,

    pub activation: Activation,
}

impl Dense {
    /// Zero weights and bias.
    pub fn zeros(d_in: usize, d_out: usize, activation: Activation) -> Self {
        Self {
            weight: Array2::zeros((d_in, d_out)),
            bias: Array1::zeros(d_out),
            activation,
        }
    }

    /// Glorot-uniform kernel, zero bias.
    ///
    /// `W ~ U(-limit, limit)` with `limit = sqrt(6 / (fan_in + fan_out))`.
    pub fn glorot(d_in: usize, d_out: usize, activation: Activation, rng: &mut StdRng) -> Self {
        let fan = (d_in + d_out).max(1) as f32;
        let limit = (6.0 / fan).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        let weight = Array2::from_shape_simple_fn((d_in, d_out), || dist.sample(&mut *rng));
        Self {
            weight,
            bias: Array1::zeros(d_out),
            activation,
        }
    }

    pub fn d_in(&self) -> usize {
        self.weight.nrows()
    }

    pub fn d_out(&self) -> usize {
        self.weight.ncols()
    }

    /// Forward pass over a `[rows, in]` matrix.
    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        expect_dim("dense input", "features", self.d_in(), x.ncols())?;
        let mut y = x.dot(&self.weight) + &self.bias;
        self.activation.apply(&mut y);
        Ok(y)
    }

    pub fn param_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}
