//! Forward-pass mode and inverted dropout.
//!
//! Evaluation mode never touches randomness, so two evaluation passes over the
//! same weights and inputs are bit-identical. Training mode borrows a seeded
//! RNG from the caller; every dropout call draws a fresh mask from it.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;

/// Forward-pass mode.
pub enum Mode<'a> {
    /// Deterministic inference; dropout is the identity.
    Eval,

    /// Training; dropout masks are drawn from the borrowed RNG.
    Train(&'a mut StdRng),
}

impl<'a> Mode<'a> {
    pub fn train(rng: &'a mut StdRng) -> Self {
        Mode::Train(rng)
    }

    pub fn is_training(&self) -> bool {
        matches!(self, Mode::Train(_))
    }

    /// Short-lived copy of this mode for a nested call.
    pub fn reborrow(&mut self) -> Mode<'_> {
        match self {
            Mode::Eval => Mode::Eval,
            Mode::Train(rng) => Mode::Train(&mut **rng),
        }
    }
}

/// Inverted dropout: zero each element with probability `rate` and scale the
/// survivors by `1 / (1 - rate)`. Identity in evaluation mode.
pub fn dropout(x: Array2<f32>, rate: f32, mode: &mut Mode<'_>) -> Array2<f32> {
    match mode {
        Mode::Eval => x,
        Mode::Train(rng) => {
            if rate <= 0.0 {
                return x;
            }
            if rate >= 1.0 {
                return Array2::zeros(x.raw_dim());
            }
            let scale = 1.0 / (1.0 - rate);
            x.mapv_into(|v| if rng.gen::<f32>() < rate { 0.0 } else { v * scale })
        }
    }
}
