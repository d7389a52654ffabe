//! Sequence pooling.

use ndarray::{Array2, Array3, ArrayView3, Axis};

use crate::error::{Error, Result};

/// Max over positions, keeping a length-1 position axis:
/// `[B, N, D]` → `[B, 1, D]`.
pub fn global_max_pool(x: ArrayView3<f32>) -> Result<Array3<f32>> {
    if x.dim().1 == 0 {
        return Err(Error::EmptySequence {
            tensor: "pooled features",
        });
    }
    let pooled = x.fold_axis(Axis(1), f32::NEG_INFINITY, |&acc, &v| acc.max(v));
    Ok(pooled.insert_axis(Axis(1)))
}

/// Mean over latent slots: `[B, L, D]` → `[B, D]`.
pub fn mean_pool(x: ArrayView3<f32>) -> Result<Array2<f32>> {
    x.mean_axis(Axis(1)).ok_or(Error::EmptySequence {
        tensor: "latent slots",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_global_max_pool() {
        let x = array![[[1.0_f32, -5.0], [3.0, -2.0], [2.0, -9.0]]];
        let pooled = global_max_pool(x.view()).unwrap();
        assert_eq!(pooled, array![[[3.0, -2.0]]]);
    }

    #[test]
    fn test_mean_pool() {
        let x = array![[[1.0_f32, 2.0], [3.0, 4.0]], [[0.0, 0.0], [2.0, -2.0]]];
        let pooled = mean_pool(x.view()).unwrap();
        assert_eq!(pooled, array![[2.0, 3.0], [1.0, -1.0]]);
    }

    #[test]
    fn test_empty_sequence() {
        let x = Array3::<f32>::zeros((2, 0, 4));
        assert!(global_max_pool(x.view()).is_err());
        assert!(mean_pool(x.view()).is_err());
    }
}
