//! Elementwise activations and row-wise softmax.
//!
//! All functions are pure; the `*_inplace` variants overwrite their input.

use ndarray::{Array2, ArrayViewMut1, Axis};

// ──────────────────────────────────────────────────────────────
// 1. Activations
// ──────────────────────────────────────────────────────────────

/// Exact GELU: `x · Φ(x) = 0.5 · x · (1 + erf(x / √2))`.
pub fn gelu(x: f32) -> f32 {
    0.5 * x * (1.0 + libm::erff(x * std::f32::consts::FRAC_1_SQRT_2))
}

/// Rectified linear unit.
pub fn relu(x: f32) -> f32 {
    x.max(0.0)
}

// ──────────────────────────────────────────────────────────────
// 2. Softmax
// ──────────────────────────────────────────────────────────────

/// Numerically stable softmax over a single lane.
pub fn softmax_lane_inplace(mut lane: ArrayViewMut1<f32>) {
    if lane.is_empty() {
        return;
    }

    let max_val = lane.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    lane.mapv_inplace(|v| (v - max_val).exp());
    let sum = lane.sum();

    if sum > 0.0 && sum.is_finite() {
        lane.mapv_inplace(|v| v / sum);
    } else {
        let uniform = 1.0 / lane.len() as f32;
        lane.fill(uniform);
    }
}

/// Softmax along the last axis of a `[rows, cols]` matrix.
pub fn softmax_rows_inplace(x: &mut Array2<f32>) {
    for row in x.axis_iter_mut(Axis(0)) {
        softmax_lane_inplace(row);
    }
}
