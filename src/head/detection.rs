//! Detection categories and per-sample predictions.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Malware category, in classifier output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detection {
    Adware,
    Banking,
    Benign,
    Riskware,
    Sms,
}

impl Detection {
    pub const ALL: [Detection; 5] = [
        Detection::Adware,
        Detection::Banking,
        Detection::Benign,
        Detection::Riskware,
        Detection::Sms,
    ];
}

impl TryFrom<usize> for Detection {
    type Error = usize;

    /// Fails with the offending index.
    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Detection::ALL.get(value).copied().ok_or(value)
    }
}

impl std::fmt::Display for Detection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Detection::Adware => "adware",
            Detection::Banking => "banking",
            Detection::Benign => "benign",
            Detection::Riskware => "riskware",
            Detection::Sms => "sms",
        };
        write!(f, "{}", name)
    }
}

/// Most likely category for one sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "det")]
    pub detection: Detection,

    #[serde(rename = "proba")]
    pub probability: f32,
}

impl Prediction {
    /// Argmax of each row of a `[B, categories]` probability matrix.
    ///
    /// Rows whose argmax has no category (more columns than categories, or an
    /// empty row) yield `None`. NaN entries never win.
    pub fn from_probabilities(probabilities: ArrayView2<f32>) -> Vec<Option<Prediction>> {
        probabilities
            .rows()
            .into_iter()
            .map(|row| {
                let (idx, &proba) = row
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| !p.is_nan())
                    .max_by(|(_, a), (_, b)| a.total_cmp(b))?;
                let detection = Detection::try_from(idx).ok()?;
                Some(Prediction {
                    detection,
                    probability: proba,
                })
            })
            .collect()
    }
}
