//! End-to-end classifier: perceiver core plus the detection head.
//!
//! ```text
//! features [B, N, D] ──► max pool ──► global [B, 1, D]
//! features, spans, global ──► PerceiverCore ──► latent [B, L, D]
//! latent ──► mean pool [B, D] ─┐
//! permissions [B, P] ──► encoder [B, D/2] ─┴─► concat ──► softmax [B, C]
//! ```

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::core::latent::LatentState;
use crate::core::model::{ModalityInputs, ModelConfig, PerceiverCore};
use crate::error::{expect_batch, expect_dim, Error, Result};
use crate::head::classifier::ClassifierHead;
use crate::head::detection::Prediction;
use crate::head::permissions::PermissionEncoder;
use crate::head::pooling::{global_max_pool, mean_pool};
use crate::kernels::Mode;

/// One padded batch as seen by the classifier.
#[derive(Clone, Copy)]
pub struct ClassifierInputs<'a> {
    /// `[B, N, D]`
    pub features: ArrayView3<'a, f32>,
    /// `[B, M, 2]`
    pub spans: ArrayView3<'a, i64>,
    /// `[B, P]`
    pub permissions: ArrayView2<'a, f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Malceiver {
    pub config: ModelConfig,
    pub core: PerceiverCore,
    pub permissions: PermissionEncoder,
    pub head: ClassifierHead,
}

impl Malceiver {
    /// Build a freshly initialised model; everything derives from `config.seed`.
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let latent = LatentState::sample(config.latent_length, config.latent_dim, &mut rng);
        let core = PerceiverCore::new(&config, latent, &mut rng)?;
        let permissions = PermissionEncoder::new(config.n_permissions, config.latent_dim, &mut rng);
        let head = ClassifierHead::new(
            config.latent_dim + permissions.output_dim(),
            config.n_categories,
            &mut rng,
        );

        let model = Self {
            config,
            core,
            permissions,
            head,
        };
        tracing::info!(
            latent_dim = model.config.latent_dim,
            latent_length = model.config.latent_length,
            seed = model.config.seed,
            params = model.param_count(),
            "built malceiver"
        );
        Ok(model)
    }

    /// Final latent state after all modalities: `[B, L, D]`.
    pub fn embed(&self, inputs: &ClassifierInputs<'_>, mode: &mut Mode<'_>) -> Result<Array3<f32>> {
        let global = global_max_pool(inputs.features)?;
        let modalities = ModalityInputs {
            features: inputs.features.view(),
            spans: inputs.spans.view(),
            global: global.view(),
        };
        self.core.forward(&modalities, mode)
    }

    /// Category probabilities: `[B, n_categories]`, rows sum to one.
    pub fn predict_proba(
        &self,
        inputs: &ClassifierInputs<'_>,
        mode: &mut Mode<'_>,
    ) -> Result<Array2<f32>> {
        let (batch, _, _) = inputs.features.dim();
        let (perm_batch, perm_width) = inputs.permissions.dim();
        expect_dim("permissions", "permissions", self.config.n_permissions, perm_width)?;
        expect_batch("opcode features", batch, "permissions", perm_batch)?;

        let latent = self.embed(inputs, mode)?;
        let pooled = mean_pool(latent.view())?;
        let permission_logits = self.permissions.forward(inputs.permissions)?;
        self.head.forward(pooled.view(), permission_logits.view())
    }

    /// Most likely category per sample, evaluation mode.
    pub fn predict(&self, inputs: &ClassifierInputs<'_>) -> Result<Vec<Prediction>> {
        let probabilities = self.predict_proba(inputs, &mut Mode::Eval)?;
        Prediction::from_probabilities(probabilities.view())
            .into_iter()
            .enumerate()
            .map(|(row, prediction)| {
                prediction.ok_or_else(|| {
                    Error::InvalidConfig(format!("no detection category for sample {}", row))
                })
            })
            .collect()
    }

    pub fn param_count(&self) -> usize {
        self.core.param_count() + self.permissions.param_count() + self.head.param_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::head::detection::Detection;
    use ndarray::{s, Array3};

    fn small_config() -> ModelConfig {
        ModelConfig {
            latent_dim: 8,
            latent_length: 4,
            ..Default::default()
        }
    }

    struct Batch {
        features: Array3<f32>,
        spans: Array3<i64>,
        permissions: Array2<f32>,
    }

    impl Batch {
        fn new(batch: usize, n: usize, d: usize) -> Self {
            let features =
                Array3::from_shape_fn((batch, n, d), |(b, i, j)| ((b * 5 + i * 3 + j) as f32).sin());
            let half = (n / 2) as i64;
            let spans = Array3::from_shape_fn((batch, 2, 2), |(_, m, k)| match (m, k) {
                (0, 0) => 0,
                (0, _) => half.max(1) - 1,
                (_, 0) => half,
                _ => n as i64 - 1,
            });
            let permissions = Array2::from_shape_fn((batch, 50), |(b, p)| ((b + p) % 3 == 0) as u8 as f32);
            Self {
                features,
                spans,
                permissions,
            }
        }

        fn inputs(&self) -> ClassifierInputs<'_> {
            ClassifierInputs {
                features: self.features.view(),
                spans: self.spans.view(),
                permissions: self.permissions.view(),
            }
        }
    }

    #[test]
    fn test_predict_proba_rows_are_distributions() {
        let model = Malceiver::new(small_config()).unwrap();
        let batch = Batch::new(3, 20, 8);
        let probs = model.predict_proba(&batch.inputs(), &mut Mode::Eval).unwrap();
        assert_eq!(probs.dim(), (3, 5));
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_embed_shape() {
        let model = Malceiver::new(small_config()).unwrap();
        let batch = Batch::new(2, 9, 8);
        let latent = model.embed(&batch.inputs(), &mut Mode::Eval).unwrap();
        assert_eq!(latent.dim(), (2, 4, 8));
    }

    #[test]
    fn test_predict_matches_argmax() {
        let model = Malceiver::new(small_config()).unwrap();
        let batch = Batch::new(2, 12, 8);
        let probs = model.predict_proba(&batch.inputs(), &mut Mode::Eval).unwrap();
        let predictions = model.predict(&batch.inputs()).unwrap();
        assert_eq!(predictions.len(), 2);
        for (row, prediction) in probs.rows().into_iter().zip(&predictions) {
            let best = row.iter().cloned().fold(f32::MIN, f32::max);
            assert_eq!(prediction.probability, best);
            assert!(Detection::ALL.contains(&prediction.detection));
        }
    }

    #[test]
    fn test_seed_controls_weights() {
        let a = Malceiver::new(small_config()).unwrap();
        let b = Malceiver::new(small_config()).unwrap();
        let c = Malceiver::new(ModelConfig {
            seed: 7,
            ..small_config()
        })
        .unwrap();
        let batch = Batch::new(1, 10, 8);
        let pa = a.predict_proba(&batch.inputs(), &mut Mode::Eval).unwrap();
        let pb = b.predict_proba(&batch.inputs(), &mut Mode::Eval).unwrap();
        let pc = c.predict_proba(&batch.inputs(), &mut Mode::Eval).unwrap();
        assert_eq!(pa, pb);
        assert_ne!(pa, pc);
    }

    #[test]
    fn test_training_mode_is_seeded() {
        let model = Malceiver::new(small_config()).unwrap();
        let batch = Batch::new(2, 10, 8);
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            model
                .predict_proba(&batch.inputs(), &mut Mode::train(&mut rng))
                .unwrap()
        };
        assert_eq!(run(3), run(3));
        let eval = model.predict_proba(&batch.inputs(), &mut Mode::Eval).unwrap();
        assert_ne!(run(3), eval);
    }

    #[test]
    fn test_permission_width_checked() {
        let model = Malceiver::new(small_config()).unwrap();
        let batch = Batch::new(2, 10, 8);
        let narrow = batch.permissions.slice(s![.., ..40]).to_owned();
        let inputs = ClassifierInputs {
            permissions: narrow.view(),
            ..batch.inputs()
        };
        assert!(matches!(
            model.predict(&inputs),
            Err(Error::ShapeMismatch { .. })
        ));

        let one = batch.permissions.slice(s![..1, ..]).to_owned();
        let inputs = ClassifierInputs {
            permissions: one.view(),
            ..batch.inputs()
        };
        assert!(matches!(
            model.predict(&inputs),
            Err(Error::BatchMismatch { .. })
        ));
    }

    #[test]
    fn test_extra_categories_have_no_label() {
        let model = Malceiver::new(ModelConfig {
            n_categories: 7,
            ..small_config()
        })
        .unwrap();
        let batch = Batch::new(1, 6, 8);
        let probs = model.predict_proba(&batch.inputs(), &mut Mode::Eval).unwrap();
        assert_eq!(probs.dim(), (1, 7));
        let best = probs
            .row(0)
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(model.predict(&batch.inputs()).is_err(), best >= 5);
    }
}
