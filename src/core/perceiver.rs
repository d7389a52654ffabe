//! Perceiver stack: one cross-attention read, then `S` self-attention
//! refinements of the latent state.
//!
//! ```text
//! x = cross(latent, input)
//! x = self₀(x)
//! ...
//! x = self_{S-1}(x)
//! ```
//!
//! The self-attention blocks form a fixed-length array: their count and order
//! are part of the architecture, not runtime data.

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::core::attention::{AttentionBlock, AttentionKind};
use crate::error::{expect_batch, expect_dim, Result};
use crate::kernels::batch::map_examples;
use crate::kernels::dropout::Mode;

/// Cross-attention followed by `S` self-attention blocks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PerceiverStack<const S: usize> {
    pub cross: AttentionBlock,

    #[serde(with = "crate::core::fixed_array")]
    pub self_blocks: [AttentionBlock; S],
}

impl<const S: usize> PerceiverStack<S> {
    /// Independently initialised blocks drawn from `rng`.
    pub fn new(
        latent_dim: usize,
        latent_length: usize,
        dropout_rate: f32,
        rng: &mut StdRng,
    ) -> Self {
        let cross = AttentionBlock::new(
            AttentionKind::Cross,
            latent_dim,
            latent_length,
            dropout_rate,
            rng,
        );
        let self_blocks = std::array::from_fn(|_| {
            AttentionBlock::new(
                AttentionKind::SelfAttention,
                latent_dim,
                latent_length,
                dropout_rate,
                rng,
            )
        });
        Self { cross, self_blocks }
    }

    /// Stack with all projection and MLP weights zeroed.
    pub fn zeros(latent_dim: usize, latent_length: usize, dropout_rate: f32) -> Self {
        Self {
            cross: AttentionBlock::zeros(
                AttentionKind::Cross,
                latent_dim,
                latent_length,
                dropout_rate,
            ),
            self_blocks: std::array::from_fn(|_| {
                AttentionBlock::zeros(
                    AttentionKind::SelfAttention,
                    latent_dim,
                    latent_length,
                    dropout_rate,
                )
            }),
        }
    }

    pub const fn self_block_count(&self) -> usize {
        S
    }

    pub fn latent_dim(&self) -> usize {
        self.cross.latent_dim()
    }

    /// Single-example forward: `latent: [L, D]`, `input: [N, D]` → `[L, D]`.
    pub fn forward(
        &self,
        latent: ArrayView2<f32>,
        input: ArrayView2<f32>,
        mode: &mut Mode<'_>,
    ) -> Result<Array2<f32>> {
        let mut x = self.cross.forward(latent, Some(input), mode)?;
        for block in &self.self_blocks {
            x = block.forward(x.view(), None, mode)?;
        }
        Ok(x)
    }

    /// Batched forward: `latent: [B, L, D]`, `input: [B, N, D]` → `[B, L, D]`.
    pub fn forward_batch(
        &self,
        latent: ArrayView3<f32>,
        input: ArrayView3<f32>,
        mode: &mut Mode<'_>,
    ) -> Result<Array3<f32>> {
        let (batch, slots, dim) = latent.dim();
        expect_batch("latent state", batch, "modality input", input.dim().0)?;
        expect_dim("latent state", "features", self.latent_dim(), dim)?;
        expect_dim("modality input", "features", self.latent_dim(), input.dim().2)?;

        map_examples(batch, slots, dim, mode, |b, mode| {
            self.forward(latent.slice(s![b, .., ..]), input.slice(s![b, .., ..]), mode)
        })
    }

    pub fn param_count(&self) -> usize {
        self.cross.param_count()
            + self
                .self_blocks
                .iter()
                .map(|b| b.param_count())
                .sum::<usize>()
    }
}
