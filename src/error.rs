//! Error taxonomy for the numeric core.
//!
//! Out-of-range span indices are not errors: they are clamped by the segment
//! aggregator. Everything here is fatal for the call that returns it.

use thiserror::Error;

/// Errors raised by model construction and forward passes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A tensor dimension disagrees with the configured shape.
    #[error("shape mismatch for {tensor}: expected {expected} along {axis}, got {actual}")]
    ShapeMismatch {
        tensor: &'static str,
        axis: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Batch dimensions disagree across inputs of the same call.
    #[error("batch mismatch: {left} has {left_batch} examples, {right} has {right_batch}")]
    BatchMismatch {
        left: &'static str,
        left_batch: usize,
        right: &'static str,
        right_batch: usize,
    },

    /// A sequence that must hold at least one position is empty.
    #[error("{tensor} has no positions")]
    EmptySequence { tensor: &'static str },

    /// Model configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias for the numeric core.
pub type Result<T> = std::result::Result<T, Error>;

/// Check one dimension against its expected size.
pub(crate) fn expect_dim(
    tensor: &'static str,
    axis: &'static str,
    expected: usize,
    actual: usize,
) -> Result<()> {
    if expected != actual {
        return Err(Error::ShapeMismatch {
            tensor,
            axis,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Check that two inputs carry the same number of examples.
pub(crate) fn expect_batch(
    left: &'static str,
    left_batch: usize,
    right: &'static str,
    right_batch: usize,
) -> Result<()> {
    if left_batch != right_batch {
        return Err(Error::BatchMismatch {
            left,
            left_batch,
            right,
            right_batch,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_dim() {
        assert!(expect_dim("latent", "features", 16, 16).is_ok());
        let err = expect_dim("latent", "features", 16, 8).unwrap_err();
        assert_eq!(
            err,
            Error::ShapeMismatch {
                tensor: "latent",
                axis: "features",
                expected: 16,
                actual: 8,
            }
        );
    }

    #[test]
    fn test_error_display() {
        let err = expect_batch("features", 2, "spans", 3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "batch mismatch: features has 2 examples, spans has 3"
        );
    }
}
