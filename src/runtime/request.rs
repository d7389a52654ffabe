//! Scan requests: JSON samples in, padded batches out.
//!
//! A request carries pre-extracted opcode features plus either explicit
//! method spans or per-method instruction counts:
//!
//! ```text
//! { "features": [[..D..], ...],
//!   "method_lengths": [12, 40, 7],
//!   "permissions": ["android.permission.INTERNET", "SEND_SMS"] }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use ndarray::{Array1, Array2, Array3};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::config::OPCODE_CAP;
use crate::input::batch::{pad_features, pad_spans, stack_permissions};
use crate::input::permissions::{permission_vector, PERMISSIONS};
use crate::input::spans::{covered_length, method_spans};
use crate::runtime::classifier::ClassifierInputs;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleRequest {
    /// Per-position feature rows, all the same width.
    pub features: Vec<Vec<f32>>,

    /// Explicit inclusive `(start, end)` method spans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spans: Option<Vec<[i64; 2]>>,

    /// Instruction count per method, laid out back to back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_lengths: Option<Vec<usize>>,

    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RequestFile {
    Many(Vec<SampleRequest>),
    One(SampleRequest),
}

/// One request converted to arrays.
#[derive(Clone, Debug)]
pub struct Example {
    pub features: Array2<f32>,
    pub spans: Vec<[i64; 2]>,
    pub permissions: Array1<f32>,
}

impl SampleRequest {
    /// Convert to arrays.
    ///
    /// Features beyond `OPCODE_CAP` positions are dropped. With method
    /// lengths, the stream ends where the methods do: after the method that
    /// crosses the cap. Without spans or method lengths the whole sequence is
    /// one method.
    pub fn to_example(&self) -> anyhow::Result<Example> {
        let mut positions = self.features.len().min(OPCODE_CAP);
        if let Some(lengths) = &self.method_lengths {
            let covered = covered_length(lengths, OPCODE_CAP);
            if covered != self.features.len() {
                tracing::warn!(
                    covered,
                    rows = self.features.len(),
                    "method lengths do not match the feature rows"
                );
            }
            if covered > 0 {
                positions = self.features.len().min(covered);
            }
        }
        if positions == 0 {
            bail!("sample has no feature rows");
        }
        let dim = self.features[0].len();
        let mut flat = Vec::with_capacity(positions * dim);
        for (i, row) in self.features.iter().take(positions).enumerate() {
            if row.len() != dim {
                bail!("feature row {} has width {}, expected {}", i, row.len(), dim);
            }
            flat.extend_from_slice(row);
        }
        let features = Array2::from_shape_vec((positions, dim), flat)
            .context("shaping feature rows")?;

        let spans = match (&self.spans, &self.method_lengths) {
            (Some(_), Some(_)) => bail!("give either spans or method_lengths, not both"),
            (Some(spans), None) => spans.clone(),
            (None, Some(lengths)) => method_spans(lengths, OPCODE_CAP),
            (None, None) => vec![[0, positions as i64 - 1]],
        };

        Ok(Example {
            features,
            spans,
            permissions: permission_vector(self.permissions.as_slice()),
        })
    }
}

/// Read a JSON file holding one request or an array of them.
pub fn load_requests(path: impl AsRef<Path>) -> anyhow::Result<Vec<SampleRequest>> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).with_context(|| format!("reading requests {}", path.display()))?;
    let file: RequestFile = serde_json::from_str(&text)
        .with_context(|| format!("parsing requests {}", path.display()))?;
    Ok(match file {
        RequestFile::Many(requests) => requests,
        RequestFile::One(request) => vec![request],
    })
}

/// Random sample for smoke runs: normal features, `methods` roughly equal
/// methods and a random permission subset.
pub fn synthetic_sample(
    seq_len: usize,
    methods: usize,
    dim: usize,
    rng: &mut StdRng,
) -> SampleRequest {
    let features = (0..seq_len)
        .map(|_| (0..dim).map(|_| rng.sample(StandardNormal)).collect())
        .collect();

    let methods = methods.clamp(1, seq_len.max(1));
    let base = seq_len / methods;
    let method_lengths = (0..methods)
        .map(|m| base + usize::from(m < seq_len % methods))
        .collect();

    let permissions = PERMISSIONS
        .iter()
        .filter(|_| rng.gen_bool(0.2))
        .map(|p| p.to_string())
        .collect();

    SampleRequest {
        features,
        spans: None,
        method_lengths: Some(method_lengths),
        permissions,
    }
}

/// Padded arrays for a batch of examples.
#[derive(Clone, Debug)]
pub struct Batch {
    pub features: Array3<f32>,
    pub spans: Array3<i64>,
    pub permissions: Array2<f32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.features.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn inputs(&self) -> ClassifierInputs<'_> {
        ClassifierInputs {
            features: self.features.view(),
            spans: self.spans.view(),
            permissions: self.permissions.view(),
        }
    }
}

pub fn assemble_batch(requests: &[SampleRequest]) -> anyhow::Result<Batch> {
    let examples = requests
        .iter()
        .enumerate()
        .map(|(i, r)| r.to_example().with_context(|| format!("sample {}", i)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let features: Vec<_> = examples.iter().map(|e| e.features.clone()).collect();
    let spans: Vec<_> = examples.iter().map(|e| e.spans.clone()).collect();
    let permissions: Vec<_> = examples.iter().map(|e| e.permissions.clone()).collect();

    Ok(Batch {
        features: pad_features(&features)?,
        spans: pad_spans(&spans),
        permissions: stack_permissions(&permissions)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn request(rows: usize, dim: usize) -> SampleRequest {
        SampleRequest {
            features: (0..rows).map(|i| vec![i as f32; dim]).collect(),
            spans: None,
            method_lengths: None,
            permissions: vec![],
        }
    }

    #[test]
    fn test_parse_single_and_many() {
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("one.json");
        fs::write(
            &one,
            r#"{"features": [[1, 2], [3, 4]], "method_lengths": [1, 1], "permissions": ["INTERNET"]}"#,
        )
        .unwrap();
        let parsed = load_requests(&one).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].method_lengths, Some(vec![1, 1]));

        let many = dir.path().join("many.json");
        fs::write(&many, r#"[{"features": [[0.5]]}, {"features": [[1.0]], "spans": [[0, 0]]}]"#)
            .unwrap();
        let parsed = load_requests(&many).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].permissions.is_empty());
        assert_eq!(parsed[1].spans, Some(vec![[0, 0]]));
    }

    #[test]
    fn test_to_example_spans() {
        let mut r = request(6, 2);
        assert_eq!(r.to_example().unwrap().spans, vec![[0, 5]]);

        r.method_lengths = Some(vec![2, 4]);
        assert_eq!(r.to_example().unwrap().spans, vec![[0, 1], [2, 5]]);

        r.spans = Some(vec![[1, 1]]);
        assert!(r.to_example().is_err());
    }

    #[test]
    fn test_method_lengths_bound_the_stream() {
        let mut r = request(6, 2);
        r.method_lengths = Some(vec![2, 1]);
        let example = r.to_example().unwrap();
        assert_eq!(example.features.dim(), (3, 2));
        assert_eq!(example.spans, vec![[0, 1], [2, 2]]);

        r.method_lengths = Some(vec![]);
        let example = r.to_example().unwrap();
        assert_eq!(example.features.dim(), (6, 2));
        assert!(example.spans.is_empty());

        let batch = assemble_batch(&[r]).unwrap();
        assert_eq!(batch.spans.dim(), (1, 0, 2));
    }

    #[test]
    fn test_to_example_rejects_ragged_rows() {
        let mut r = request(3, 2);
        r.features[1].push(9.0);
        assert!(r.to_example().is_err());
        assert!(request(0, 2).to_example().is_err());
    }

    #[test]
    fn test_assemble_batch_pads() {
        let mut a = request(4, 3);
        a.method_lengths = Some(vec![1, 1, 2]);
        a.permissions = vec!["android.permission.CAMERA".into()];
        let b = request(2, 3);

        let batch = assemble_batch(&[a, b]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.features.dim(), (2, 4, 3));
        assert_eq!(batch.spans.dim(), (2, 3, 2));
        assert_eq!(batch.permissions.dim(), (2, 50));
        assert_eq!(batch.permissions[[0, 8]], 1.0);
        assert_eq!(batch.features[[1, 3, 0]], 0.0);
        assert_eq!(batch.spans[[1, 0, 1]], 1);
    }

    #[test]
    fn test_synthetic_sample() {
        let mut rng = StdRng::seed_from_u64(4);
        let sample = synthetic_sample(10, 3, 5, &mut rng);
        assert_eq!(sample.features.len(), 10);
        assert!(sample.features.iter().all(|row| row.len() == 5));
        let lengths = sample.method_lengths.clone().unwrap();
        assert_eq!(lengths, vec![4, 3, 3]);
        assert_eq!(sample.to_example().unwrap().spans.last(), Some(&[7, 9]));
    }
}
