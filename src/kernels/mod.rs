//! Numeric kernels shared by every block.
//!
//! - **ops**: activations and softmax
//! - **dropout**: forward-pass mode and inverted dropout
//! - **batch**: per-example functions lifted over a batch (rayon in eval)

pub mod batch;
pub mod dropout;
pub mod ops;

pub use dropout::Mode;
