//! Multi-head attention and the two latent attention blocks.
//!
//! Both block kinds share one type. They differ only in how the
//! query/key/value triple is formed before the shared residual MLP step:
//!
//! ```text
//! Cross:          kv = norm(context)   q = norm(latent)   a = mha₁(q, kv, kv)
//! SelfAttention:  n  = norm(latent)                       a = mha₂(n, n, n)
//! both:           out = residual_mlp(latent, a)
//! ```
//!
//! Each head projects to a key dimension equal to the latent length `L`, so
//! cross-attention costs O(L·N) for a context of N positions.

use ndarray::{s, Array2, ArrayView2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::config::{CROSS_ATTENTION_HEADS, SELF_ATTENTION_HEADS};
use crate::core::dense::{Activation, Dense};
use crate::core::mlp::ResidualMlp;
use crate::core::norm::LayerNorm;
use crate::error::{expect_dim, Error, Result};
use crate::kernels::dropout::Mode;
use crate::kernels::ops::softmax_rows_inplace;

/// Scaled dot-product attention with learned projections.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MultiHeadAttention {
    pub heads: usize,
    pub key_dim: usize,

    /// Query projection: `W_q ∈ R^{d_model × (heads · key_dim)}`
    pub query: Dense,

    /// Key projection: `W_k ∈ R^{d_model × (heads · key_dim)}`
    pub key: Dense,

    /// Value projection: `W_v ∈ R^{d_model × (heads · key_dim)}`
    pub value: Dense,

    /// Output projection: `W_o ∈ R^{(heads · key_dim) × d_model}`
    pub output: Dense,
}

impl MultiHeadAttention {
    pub fn new(d_model: usize, heads: usize, key_dim: usize, rng: &mut StdRng) -> Self {
        let inner = heads * key_dim;
        Self {
            heads,
            key_dim,
            query: Dense::glorot(d_model, inner, Activation::Linear, rng),
            key: Dense::glorot(d_model, inner, Activation::Linear, rng),
            value: Dense::glorot(d_model, inner, Activation::Linear, rng),
            output: Dense::glorot(inner, d_model, Activation::Linear, rng),
        }
    }

    pub fn zeros(d_model: usize, heads: usize, key_dim: usize) -> Self {
        let inner = heads * key_dim;
        Self {
            heads,
            key_dim,
            query: Dense::zeros(d_model, inner, Activation::Linear),
            key: Dense::zeros(d_model, inner, Activation::Linear),
            value: Dense::zeros(d_model, inner, Activation::Linear),
            output: Dense::zeros(inner, d_model, Activation::Linear),
        }
    }

    /// Attend `query: [Lq, d_model]` over `key`/`value: [N, d_model]`.
    ///
    /// Returns `[Lq, d_model]`. With no keys the weighted sum is empty, so
    /// every query row reads a zero context and only the output bias remains.
    pub fn forward(
        &self,
        query: ArrayView2<f32>,
        key: ArrayView2<f32>,
        value: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        expect_dim("attention values", "positions", key.nrows(), value.nrows())?;
        if key.nrows() == 0 {
            let context = Array2::zeros((query.nrows(), self.heads * self.key_dim));
            return self.output.forward(context.view());
        }

        let scale = 1.0 / (self.key_dim.max(1) as f32).sqrt();
        let q = self.query.forward(query)? * scale;
        let k = self.key.forward(key)?;
        let v = self.value.forward(value)?;

        let mut context = Array2::zeros((query.nrows(), self.heads * self.key_dim));
        for h in 0..self.heads {
            let cols = s![.., h * self.key_dim..(h + 1) * self.key_dim];
            let q_h = q.slice(cols);
            let k_h = k.slice(cols);
            let v_h = v.slice(cols);

            // Scores: q · kᵀ / sqrt(key_dim) → [Lq, N]
            let mut scores = q_h.dot(&k_h.t());
            softmax_rows_inplace(&mut scores);

            context.slice_mut(cols).assign(&scores.dot(&v_h));
        }

        self.output.forward(context.view())
    }

    pub fn param_count(&self) -> usize {
        self.query.param_count()
            + self.key.param_count()
            + self.value.param_count()
            + self.output.param_count()
    }
}

/// How a block forms its query/key/value triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttentionKind {
    /// Latent queries an external sequence.
    Cross,
    /// Latent queries itself.
    SelfAttention,
}

impl AttentionKind {
    pub fn heads(self) -> usize {
        match self {
            AttentionKind::Cross => CROSS_ATTENTION_HEADS,
            AttentionKind::SelfAttention => SELF_ATTENTION_HEADS,
        }
    }
}

/// One attention block: normaliser, attention and residual MLP.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttentionBlock {
    pub kind: AttentionKind,
    pub norm: LayerNorm,
    pub attention: MultiHeadAttention,
    pub residual: ResidualMlp,
}

impl AttentionBlock {
    pub fn new(
        kind: AttentionKind,
        latent_dim: usize,
        latent_length: usize,
        dropout_rate: f32,
        rng: &mut StdRng,
    ) -> Self {
        Self {
            kind,
            norm: LayerNorm::new(latent_dim),
            attention: MultiHeadAttention::new(latent_dim, kind.heads(), latent_length, rng),
            residual: ResidualMlp::new(latent_dim, dropout_rate, rng),
        }
    }

    /// Block with all projection and MLP weights zeroed.
    pub fn zeros(
        kind: AttentionKind,
        latent_dim: usize,
        latent_length: usize,
        dropout_rate: f32,
    ) -> Self {
        Self {
            kind,
            norm: LayerNorm::new(latent_dim),
            attention: MultiHeadAttention::zeros(latent_dim, kind.heads(), latent_length),
            residual: ResidualMlp::zeros(latent_dim, dropout_rate),
        }
    }

    pub fn latent_dim(&self) -> usize {
        self.norm.features()
    }

    /// Refine `latent: [L, D]`.
    ///
    /// Cross blocks require `context: [N, D]`, possibly with `N = 0`; self
    /// blocks take no context.
    pub fn forward(
        &self,
        latent: ArrayView2<f32>,
        context: Option<ArrayView2<f32>>,
        mode: &mut Mode<'_>,
    ) -> Result<Array2<f32>> {
        expect_dim("latent state", "features", self.latent_dim(), latent.ncols())?;

        let attended = match (self.kind, context) {
            (AttentionKind::Cross, Some(context)) => {
                expect_dim("context sequence", "features", self.latent_dim(), context.ncols())?;
                let kv = self.norm.forward(context)?;
                let q = self.norm.forward(latent)?;
                self.attention.forward(q.view(), kv.view(), kv.view())?
            }
            (AttentionKind::SelfAttention, None) => {
                let n = self.norm.forward(latent)?;
                self.attention.forward(n.view(), n.view(), n.view())?
            }
            (AttentionKind::Cross, None) => {
                return Err(Error::InvalidConfig(
                    "cross-attention block requires a context sequence".into(),
                ))
            }
            (AttentionKind::SelfAttention, Some(_)) => {
                return Err(Error::InvalidConfig(
                    "self-attention block does not take a context sequence".into(),
                ))
            }
        };

        self.residual
            .forward(&self.norm, latent, attended.view(), mode)
    }

    pub fn param_count(&self) -> usize {
        self.norm.param_count() + self.attention.param_count() + self.residual.param_count()
    }
}
