//! Batch-level parallelism.
//!
//! Every block of the model is written against a single example. This module
//! lifts a per-example function to a `[batch, rows, cols]` tensor:
//! - evaluation mode distributes examples across rayon worker threads
//! - training mode walks examples in order so one seeded RNG drives all
//!   dropout masks reproducibly

use ndarray::{s, Array2, Array3};
use rayon::prelude::*;

use crate::error::{expect_dim, Result};
use crate::kernels::dropout::Mode;

/// Apply `f` to every example index in `0..batch` and stack the results into
/// a `[batch, rows, cols]` tensor.
///
/// Each per-example output must be exactly `[rows, cols]`.
pub fn map_examples<F>(
    batch: usize,
    rows: usize,
    cols: usize,
    mode: &mut Mode<'_>,
    f: F,
) -> Result<Array3<f32>>
where
    F: Fn(usize, &mut Mode<'_>) -> Result<Array2<f32>> + Sync,
{
    let outputs: Vec<Array2<f32>> = if mode.is_training() {
        (0..batch)
            .map(|b| f(b, &mut mode.reborrow()))
            .collect::<Result<_>>()?
    } else {
        (0..batch)
            .into_par_iter()
            .map(|b| f(b, &mut Mode::Eval))
            .collect::<Result<_>>()?
    };

    let mut out = Array3::zeros((batch, rows, cols));
    for (b, example) in outputs.iter().enumerate() {
        expect_dim("example output", "rows", rows, example.nrows())?;
        expect_dim("example output", "cols", cols, example.ncols())?;
        out.slice_mut(s![b, .., ..]).assign(example);
    }
    Ok(out)
}
