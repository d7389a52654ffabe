//! # MALCEIVER
//!
//! **Latent-bottleneck attention over instruction streams**: classifies a
//! variable-length opcode sequence together with its method boundaries and a
//! fixed permission bit-vector.
//!
//! ## Components
//!
//! 1. **Perceiver stacks**: one cross-attention read followed by a fixed
//!    array of self-attention blocks, all operating on a small latent state
//! 2. **Segment aggregation**: per-method averages of per-position features
//!    via cumulative sums with clamped span indices
//! 3. **Modality fusion**: opcode stream, then method aggregates, then a
//!    single global pooled feature, threaded through one latent state
//! 4. **Head**: latent average pooling, permission encoder and softmax
//!    classifier over five detection categories
//!
//! Feature extraction (embedding, convolution) and training are left to
//! external collaborators: the model consumes a `(batch, N, D)` feature tensor.

pub mod core;
pub mod error;
pub mod head;
pub mod input;
pub mod kernels;
pub mod runtime;

pub use error::{Error, Result};

/// Model-wide constants.
pub mod config {
    /// Number of latent slots (L).
    pub const LATENT_LENGTH: usize = 32;

    /// Feature width of every latent slot and attention projection (D).
    pub const HIDDEN_DIM: usize = 16;

    /// Width of the permission bit-vector.
    pub const N_PERMISSIONS: usize = 50;

    /// Number of detection categories.
    pub const N_CATEGORIES: usize = 5;

    /// Self-attention blocks per perceiver stack.
    pub const SELF_ATTENTION_BLOCKS: usize = 2;

    /// Attention heads in the cross-attention block.
    pub const CROSS_ATTENTION_HEADS: usize = 1;

    /// Attention heads in each self-attention block.
    pub const SELF_ATTENTION_HEADS: usize = 2;

    /// Dropout rate after each MLP layer (training mode only).
    pub const DROPOUT_RATE: f32 = 0.1;

    /// Layer normalisation epsilon.
    pub const LAYER_NORM_EPS: f32 = 1e-3;

    /// Instruction budget per sample when assembling method spans.
    pub const OPCODE_CAP: usize = 512_000;

    /// Default initialisation seed.
    pub const DEFAULT_SEED: u64 = 0x6d61_6c63;

    /// Number of modality stacks threaded through the latent state.
    pub const N_MODALITIES: usize = 3;
}
