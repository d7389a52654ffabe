//! Core module: latent-bottleneck attention and segment aggregation.

pub mod attention;
pub mod dense;
pub(crate) mod fixed_array;
pub mod latent;
pub mod mlp;
pub mod model;
pub mod norm;
pub mod perceiver;
pub mod segment;
