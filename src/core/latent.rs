//! Latent state: the fixed-size working memory threaded through every stack.
//!
//! The initial slots are drawn once from `N(0, 1)` at model build and are
//! only read afterwards: each forward pass broadcasts them to the batch and
//! produces new tensors rather than mutating the stored slots.

use ndarray::{Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// Initial latent slots: `[latent_length, latent_dim]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatentState {
    pub slots: Array2<f32>,
}

impl LatentState {
    /// Draw slots from a standard normal using the caller's RNG.
    pub fn sample(latent_length: usize, latent_dim: usize, rng: &mut StdRng) -> Self {
        let slots = Array2::from_shape_simple_fn((latent_length, latent_dim), || {
            StandardNormal.sample(&mut *rng)
        });
        Self { slots }
    }

    /// Draw slots from a standard normal seeded with `seed`.
    pub fn seeded(latent_length: usize, latent_dim: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::sample(latent_length, latent_dim, &mut rng)
    }

    pub fn latent_length(&self) -> usize {
        self.slots.nrows()
    }

    pub fn latent_dim(&self) -> usize {
        self.slots.ncols()
    }

    /// Copy the slots once per example: `[batch, latent_length, latent_dim]`.
    pub fn broadcast(&self, batch: usize) -> Array3<f32> {
        self.slots
            .view()
            .insert_axis(Axis(0))
            .broadcast((batch, self.latent_length(), self.latent_dim()))
            .map(|view| view.to_owned())
            .unwrap_or_else(|| Array3::zeros((batch, self.latent_length(), self.latent_dim())))
    }

    /// Check the slots for NaN or Inf.
    pub fn is_healthy(&self) -> bool {
        self.slots.iter().all(|v| v.is_finite())
    }
}
