//! Head: turns the fused latent state into category probabilities.
//!
//! Pooling, the permission encoder and the softmax classifier sit outside the
//! latent-attention core and consume its `[B, L, D]` output.

pub mod classifier;
pub mod detection;
pub mod permissions;
pub mod pooling;
