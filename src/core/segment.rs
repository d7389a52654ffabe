//! Segment feature aggregation: per-method averages of per-position features.
//!
//! For a sequence of `N` feature vectors and `M` method spans `(start, end)`:
//!
//! ```text
//! P[i]     = Σ_{j ≤ i} x[j]                 running sum, one pass over N
//! s, e     = clamp(start, 0, N-1), clamp(end, 0, N-1)
//! sum      = P[e] - P[s-1]                   (P[-1] = 0)
//! out[m]   = sum / (e - s + 1)
//! ```
//!
//! This is O(N + M) per example and equals the direct mean of
//! `x[s..=e]`. Out-of-range indices are clamped, never rejected: upstream
//! spans may reference a nominal length that differs from the feature
//! tensor (e.g. after convolution or truncation).
//!
//! Spans whose clamped start lies past their clamped end are degenerate; what
//! happens to them is decided by [`SpanPolicy`].

use ndarray::{s, Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{expect_batch, expect_dim, Error, Result};

/// Treatment of spans with clamped `start > end`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanPolicy {
    /// Divide the raw range difference by the raw length `e - s + 1`, which
    /// may be zero (inf/NaN) or negative.
    #[default]
    Unguarded,

    /// Treat the range as empty: zero sum over a length of at least one.
    ClampLength,
}

/// A span after clamping into `[0, N-1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClampedSpan {
    pub start: usize,
    pub end: usize,
}

impl ClampedSpan {
    /// Clamp `start` and `end` independently into `[0, seq_len - 1]`.
    ///
    /// `seq_len` must be at least 1.
    pub fn clamp(start: i64, end: i64, seq_len: usize) -> Self {
        let last = seq_len.saturating_sub(1) as i64;
        Self {
            start: start.clamp(0, last) as usize,
            end: end.clamp(0, last) as usize,
        }
    }

    /// `end - start + 1`; zero or negative for degenerate spans.
    pub fn length(&self) -> i64 {
        self.end as i64 - self.start as i64 + 1
    }

    pub fn is_degenerate(&self) -> bool {
        self.start > self.end
    }
}

/// Counters for one aggregation call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpanStats {
    /// Spans with at least one index moved by clamping.
    pub clamped: usize,

    /// Spans with clamped `start > end`.
    pub degenerate: usize,
}

impl SpanStats {
    fn merge(&mut self, other: SpanStats) {
        self.clamped += other.clamped;
        self.degenerate += other.degenerate;
    }
}

/// Running sum along positions: row `i` holds `Σ_{j ≤ i} x[j]`.
///
/// Accumulates in `f64` so long sequences do not lose the small tail.
pub fn cumulative_sum(features: ArrayView2<f32>) -> Array2<f64> {
    let mut out = features.mapv(f64::from);
    let mut running = Array1::<f64>::zeros(features.ncols());
    for mut row in out.axis_iter_mut(Axis(0)) {
        running += &row;
        row.assign(&running);
    }
    out
}

/// Averages features over index spans.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentAggregator {
    pub policy: SpanPolicy,
}

impl SegmentAggregator {
    pub fn new(policy: SpanPolicy) -> Self {
        Self { policy }
    }

    /// Aggregate one example: `features: [N, D]`, `spans: [M, 2]` → `[M, D]`.
    pub fn aggregate_example(
        &self,
        features: ArrayView2<f32>,
        spans: ArrayView2<i64>,
    ) -> Result<(Array2<f32>, SpanStats)> {
        expect_dim("method spans", "pair", 2, spans.ncols())?;
        let seq_len = features.nrows();
        if seq_len == 0 {
            return Err(Error::EmptySequence {
                tensor: "opcode features",
            });
        }

        let prefix = cumulative_sum(features);
        let dim = features.ncols();
        let mut out = Array2::zeros((spans.nrows(), dim));
        let mut stats = SpanStats::default();

        for (m, pair) in spans.axis_iter(Axis(0)).enumerate() {
            let (raw_start, raw_end) = (pair[0], pair[1]);
            let span = ClampedSpan::clamp(raw_start, raw_end, seq_len);
            if span.start as i64 != raw_start || span.end as i64 != raw_end {
                stats.clamped += 1;
            }

            if span.is_degenerate() {
                stats.degenerate += 1;
                if self.policy == SpanPolicy::ClampLength {
                    // Empty range: zero sum, output row stays zero.
                    continue;
                }
            }
            let end_sum = prefix.row(span.end);
            let mut row = out.row_mut(m);
            let divisor = span.length() as f64;
            if span.start == 0 {
                row.assign(&end_sum.mapv(|v| (v / divisor) as f32));
            } else {
                let before = prefix.row(span.start - 1);
                for ((o, &e), &b) in row.iter_mut().zip(end_sum.iter()).zip(before.iter()) {
                    *o = ((e - b) / divisor) as f32;
                }
            }
        }

        Ok((out, stats))
    }

    /// Aggregate a batch: `features: [B, N, D]`, `spans: [B, M, 2]` → `[B, M, D]`.
    pub fn aggregate(
        &self,
        features: ArrayView3<f32>,
        spans: ArrayView3<i64>,
    ) -> Result<Array3<f32>> {
        let (batch, _, dim) = features.dim();
        let (span_batch, n_spans, pair) = spans.dim();
        expect_batch("opcode features", batch, "method spans", span_batch)?;
        expect_dim("method spans", "pair", 2, pair)?;

        let mut stats = SpanStats::default();
        let mut out = Array3::zeros((batch, n_spans, dim));
        for b in 0..batch {
            let (example, example_stats) = self.aggregate_example(
                features.slice(s![b, .., ..]),
                spans.slice(s![b, .., ..]),
            )?;
            out.slice_mut(s![b, .., ..]).assign(&example);
            stats.merge(example_stats);
        }

        if stats.clamped > 0 {
            tracing::trace!(clamped = stats.clamped, "method spans clamped into range");
        }
        if stats.degenerate > 0 {
            tracing::warn!(
                degenerate = stats.degenerate,
                policy = ?self.policy,
                "method spans with start past end after clamping"
            );
        }

        Ok(out)
    }
}
