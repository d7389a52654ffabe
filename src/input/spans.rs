//! Method spans from per-method instruction counts.
//!
//! Methods are laid out back to back in the opcode stream: a method with `k`
//! instructions starting at `index` covers `(index, index + k - 1)`.

/// Spans for consecutive methods of the given instruction counts.
///
/// Stops after the method that brings the running total to `cap` or beyond;
/// that method is still included. Empty methods produce `(index, index - 1)`,
/// which the segment aggregator treats as degenerate.
pub fn method_spans(lengths: &[usize], cap: usize) -> Vec<[i64; 2]> {
    let mut spans = Vec::with_capacity(lengths.len());
    let mut index: i64 = 0;
    for &len in lengths {
        let next = index + len as i64;
        spans.push([index, next - 1]);
        index = next;
        if index >= cap as i64 {
            break;
        }
    }
    spans
}

/// Total instructions covered by `method_spans(lengths, cap)`.
pub fn covered_length(lengths: &[usize], cap: usize) -> usize {
    let mut total = 0;
    for &len in lengths {
        total += len;
        if total >= cap {
            break;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_to_back_spans() {
        let spans = method_spans(&[3, 1, 4], 100);
        assert_eq!(spans, vec![[0, 2], [3, 3], [4, 7]]);
        assert_eq!(covered_length(&[3, 1, 4], 100), 8);
    }

    #[test]
    fn test_cap_includes_crossing_method() {
        let spans = method_spans(&[5, 5, 5, 5], 8);
        assert_eq!(spans, vec![[0, 4], [5, 9]]);
        assert_eq!(covered_length(&[5, 5, 5, 5], 8), 10);
    }

    #[test]
    fn test_empty_method() {
        let spans = method_spans(&[2, 0, 1], 100);
        assert_eq!(spans, vec![[0, 1], [2, 1], [2, 2]]);
    }

    #[test]
    fn test_no_methods() {
        assert!(method_spans(&[], 10).is_empty());
    }
}
