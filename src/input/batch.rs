//! Batch assembly: zero-pad variable-length examples to a common shape.

use ndarray::{s, Array1, Array2, Array3};

use crate::error::{expect_dim, Error, Result};

/// Stack `[N_b, D]` feature matrices into `[B, max N_b, D]`, zero padding
/// the tail of shorter examples.
pub fn pad_features(examples: &[Array2<f32>]) -> Result<Array3<f32>> {
    let Some(first) = examples.first() else {
        return Err(Error::EmptySequence { tensor: "batch" });
    };
    let dim = first.ncols();
    let max_len = examples.iter().map(|e| e.nrows()).max().unwrap_or(0);

    let mut out = Array3::zeros((examples.len(), max_len, dim));
    for (b, example) in examples.iter().enumerate() {
        expect_dim("example features", "features", dim, example.ncols())?;
        out.slice_mut(s![b, ..example.nrows(), ..]).assign(example);
    }
    Ok(out)
}

/// Stack per-example span lists into `[B, max M_b, 2]`.
///
/// Missing spans are `(0, 0)`. A batch without any methods yields an empty
/// method axis.
pub fn pad_spans(examples: &[Vec<[i64; 2]>]) -> Array3<i64> {
    let max_len = examples.iter().map(|e| e.len()).max().unwrap_or(0);
    let mut out = Array3::zeros((examples.len(), max_len, 2));
    for (b, spans) in examples.iter().enumerate() {
        for (m, &[start, end]) in spans.iter().enumerate() {
            out[[b, m, 0]] = start;
            out[[b, m, 1]] = end;
        }
    }
    out
}

/// Stack permission vectors into `[B, P]`.
pub fn stack_permissions(examples: &[Array1<f32>]) -> Result<Array2<f32>> {
    let width = examples.first().map(|e| e.len()).unwrap_or(0);
    let mut out = Array2::zeros((examples.len(), width));
    for (b, bits) in examples.iter().enumerate() {
        expect_dim("permission vector", "permissions", width, bits.len())?;
        out.row_mut(b).assign(bits);
    }
    Ok(out)
}
