//! Perceiver core: wires the latent state, the segment aggregator and the
//! three modality stacks.
//!
//! ```text
//! latent ─► opcode stack ◄── features [B, N, D]
//!        ─► method stack ◄── aggregate(features, spans) [B, M, D]
//!        ─► global stack ◄── pooled features [B, 1, D]
//!        ─► [B, L, D]
//! ```
//!
//! Each modality owns an independently initialised stack. The order in which
//! the stacks see the latent is part of the learned semantics; the default is
//! opcode → method → global.

use ndarray::{Array3, ArrayView3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_SEED, DROPOUT_RATE, HIDDEN_DIM, LATENT_LENGTH, N_CATEGORIES, N_MODALITIES,
    N_PERMISSIONS, SELF_ATTENTION_BLOCKS,
};
use crate::core::latent::LatentState;
use crate::core::perceiver::PerceiverStack;
use crate::core::segment::{SegmentAggregator, SpanPolicy};
use crate::error::{expect_batch, expect_dim, Error, Result};
use crate::kernels::dropout::Mode;

/// One input view fused into the latent state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    /// Per-position opcode features.
    Opcode,
    /// Per-method averages of opcode features.
    Method,
    /// Single globally pooled feature vector.
    Global,
}

/// Coarse-to-fine fusion order used by trained models.
pub const DEFAULT_MODALITY_ORDER: [Modality; N_MODALITIES] =
    [Modality::Opcode, Modality::Method, Modality::Global];

/// Runtime model configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Feature width of every latent slot (D).
    pub latent_dim: usize,

    /// Number of latent slots (L).
    pub latent_length: usize,

    /// Width of the permission bit-vector.
    pub n_permissions: usize,

    /// Number of output categories.
    pub n_categories: usize,

    /// Dropout after each MLP layer, training mode only.
    pub dropout_rate: f32,

    /// Handling of spans with clamped start past end.
    pub span_policy: SpanPolicy,

    /// Order in which the modality stacks see the latent state.
    pub modality_order: [Modality; N_MODALITIES],

    /// Seed for the latent state and all weights.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            latent_dim: HIDDEN_DIM,
            latent_length: LATENT_LENGTH,
            n_permissions: N_PERMISSIONS,
            n_categories: N_CATEGORIES,
            dropout_rate: DROPOUT_RATE,
            span_policy: SpanPolicy::default(),
            modality_order: DEFAULT_MODALITY_ORDER,
            seed: DEFAULT_SEED,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.latent_dim < 2 {
            return Err(Error::InvalidConfig(format!(
                "latent_dim must be at least 2, got {}",
                self.latent_dim
            )));
        }
        if self.latent_length == 0 {
            return Err(Error::InvalidConfig("latent_length must be positive".into()));
        }
        if self.n_permissions == 0 || self.n_categories == 0 {
            return Err(Error::InvalidConfig(
                "n_permissions and n_categories must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(Error::InvalidConfig(format!(
                "dropout_rate must lie in [0, 1), got {}",
                self.dropout_rate
            )));
        }
        for modality in DEFAULT_MODALITY_ORDER {
            let count = self
                .modality_order
                .iter()
                .filter(|&&m| m == modality)
                .count();
            if count != 1 {
                return Err(Error::InvalidConfig(format!(
                    "modality_order must name each modality once, {:?} appears {} times",
                    modality, count
                )));
            }
        }
        Ok(())
    }
}

/// Inputs for one batched forward pass.
#[derive(Clone, Copy)]
pub struct ModalityInputs<'a> {
    /// Per-position features: `[B, N, D]`.
    pub features: ArrayView3<'a, f32>,

    /// Method spans `(start, end)`: `[B, M, 2]`.
    pub spans: ArrayView3<'a, i64>,

    /// Pre-pooled global feature: `[B, 1, D]`.
    pub global: ArrayView3<'a, f32>,
}

/// Latent state plus the three modality stacks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PerceiverCore {
    pub latent: LatentState,
    pub opcode: PerceiverStack<SELF_ATTENTION_BLOCKS>,
    pub method: PerceiverStack<SELF_ATTENTION_BLOCKS>,
    pub global: PerceiverStack<SELF_ATTENTION_BLOCKS>,
    pub aggregator: SegmentAggregator,
    pub modality_order: [Modality; N_MODALITIES],
}

impl PerceiverCore {
    /// Build around an explicit initial latent; stack weights come from `rng`.
    pub fn new(config: &ModelConfig, latent: LatentState, rng: &mut StdRng) -> Result<Self> {
        config.validate()?;
        expect_dim("initial latent", "features", config.latent_dim, latent.latent_dim())?;
        expect_dim("initial latent", "slots", config.latent_length, latent.latent_length())?;

        let (d, l, p) = (config.latent_dim, config.latent_length, config.dropout_rate);
        let opcode = PerceiverStack::new(d, l, p, rng);
        let method = PerceiverStack::new(d, l, p, rng);
        let global = PerceiverStack::new(d, l, p, rng);

        Ok(Self {
            latent,
            opcode,
            method,
            global,
            aggregator: SegmentAggregator::new(config.span_policy),
            modality_order: config.modality_order,
        })
    }

    /// Seed the latent and all weights from `config.seed`.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let latent = LatentState::sample(config.latent_length, config.latent_dim, &mut rng);
        Self::new(config, latent, &mut rng)
    }

    pub fn latent_dim(&self) -> usize {
        self.latent.latent_dim()
    }

    pub fn latent_length(&self) -> usize {
        self.latent.latent_length()
    }

    pub fn stack(&self, modality: Modality) -> &PerceiverStack<SELF_ATTENTION_BLOCKS> {
        match modality {
            Modality::Opcode => &self.opcode,
            Modality::Method => &self.method,
            Modality::Global => &self.global,
        }
    }

    /// Validate shapes shared by every forward entry point.
    fn check_inputs(&self, inputs: &ModalityInputs<'_>) -> Result<usize> {
        let d = self.latent_dim();
        let (batch, _, feature_dim) = inputs.features.dim();
        let (span_batch, _, pair) = inputs.spans.dim();
        let (global_batch, global_len, global_dim) = inputs.global.dim();

        expect_dim("opcode features", "features", d, feature_dim)?;
        expect_dim("global features", "features", d, global_dim)?;
        expect_dim("global features", "positions", 1, global_len)?;
        expect_dim("method spans", "pair", 2, pair)?;
        expect_batch("opcode features", batch, "method spans", span_batch)?;
        expect_batch("opcode features", batch, "global features", global_batch)?;
        Ok(batch)
    }

    /// Fuse all three modalities into the latent state: returns `[B, L, D]`.
    pub fn forward(&self, inputs: &ModalityInputs<'_>, mode: &mut Mode<'_>) -> Result<Array3<f32>> {
        let batch = self.check_inputs(inputs)?;
        let method_features = self.aggregator.aggregate(inputs.features, inputs.spans)?;

        tracing::debug!(
            batch,
            positions = inputs.features.dim().1,
            methods = method_features.dim().1,
            training = mode.is_training(),
            "perceiver forward"
        );

        let mut latent = self.latent.broadcast(batch);
        for modality in self.modality_order {
            let sequence = match modality {
                Modality::Opcode => inputs.features.view(),
                Modality::Method => method_features.view(),
                Modality::Global => inputs.global.view(),
            };
            latent = self
                .stack(modality)
                .forward_batch(latent.view(), sequence, mode)?;
        }
        Ok(latent)
    }

    pub fn param_count(&self) -> usize {
        self.latent.slots.len()
            + self.opcode.param_count()
            + self.method.param_count()
            + self.global.param_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
        global: Array3<f32>,
    }

    impl Batch {
        fn new(batch: usize, n: usize, d: usize) -> Self {
            let features = Array3::from_shape_fn((batch, n, d), |(b, i, j)| {
                ((b * 13 + i * 7 + j) as f32 * 0.29).cos()
            });
            let spans = Array3::from_shape_fn((batch, 3, 2), |(_, m, k)| {
                let start = (m * n / 3) as i64;
                let end = (((m + 1) * n / 3) as i64 - 1).max(start);
                if k == 0 {
                    start
                } else {
                    end
                }
            });
            let global = Array3::from_shape_fn((batch, 1, d), |(b, _, j)| (b + j) as f32 * 0.1);
            Self {
                features,
                spans,
                global,
            }
        }

        fn inputs(&self) -> ModalityInputs<'_> {
            ModalityInputs {
                features: self.features.view(),
                spans: self.spans.view(),
                global: self.global.view(),
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.latent_dim, 16);
        assert_eq!(config.latent_length, 32);
        assert_eq!(config.modality_order, DEFAULT_MODALITY_ORDER);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let bad_order = ModelConfig {
            modality_order: [Modality::Opcode, Modality::Opcode, Modality::Global],
            ..Default::default()
        };
        assert!(bad_order.validate().is_err());

        let bad_dropout = ModelConfig {
            dropout_rate: 1.0,
            ..Default::default()
        };
        assert!(bad_dropout.validate().is_err());

        let bad_dim = ModelConfig {
            latent_dim: 1,
            ..Default::default()
        };
        assert!(PerceiverCore::from_config(&bad_dim).is_err());
    }

    #[test]
    fn test_forward_shape() {
        let core = PerceiverCore::from_config(&small_config()).unwrap();
        for n in [1, 8, 500] {
            let batch = Batch::new(2, n, 8);
            let out = core.forward(&batch.inputs(), &mut Mode::Eval).unwrap();
            assert_eq!(out.dim(), (2, 4, 8));
            assert!(out.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_forward_deterministic_in_eval() {
        let core = PerceiverCore::from_config(&small_config()).unwrap();
        let batch = Batch::new(3, 40, 8);
        let a = core.forward(&batch.inputs(), &mut Mode::Eval).unwrap();
        let b = core.forward(&batch.inputs(), &mut Mode::Eval).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_seed_same_model() {
        let a = PerceiverCore::from_config(&small_config()).unwrap();
        let b = PerceiverCore::from_config(&small_config()).unwrap();
        assert_eq!(a.latent, b.latent);
        assert_eq!(a.opcode.cross.attention.key.weight, b.opcode.cross.attention.key.weight);
    }

    #[test]
    fn test_stacks_independently_weighted() {
        let core = PerceiverCore::from_config(&small_config()).unwrap();
        let w = |m: Modality| core.stack(m).cross.attention.query.weight.clone();
        assert_ne!(w(Modality::Opcode), w(Modality::Method));
        assert_ne!(w(Modality::Method), w(Modality::Global));
    }

    #[test]
    fn test_modality_order_is_load_bearing() {
        let forward = small_config();
        let swapped = ModelConfig {
            modality_order: [Modality::Global, Modality::Method, Modality::Opcode],
            ..small_config()
        };
        let core_a = PerceiverCore::from_config(&forward).unwrap();
        let core_b = PerceiverCore::from_config(&swapped).unwrap();
        // Same seed: identical weights, only the order differs.
        assert_eq!(core_a.latent, core_b.latent);

        let batch = Batch::new(2, 30, 8);
        let a = core_a.forward(&batch.inputs(), &mut Mode::Eval).unwrap();
        let b = core_b.forward(&batch.inputs(), &mut Mode::Eval).unwrap();
        let diff: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum();
        assert!(diff > 1e-3, "order swap changed nothing (diff {})", diff);
    }

    #[test]
    fn test_latent_not_mutated_by_forward() {
        let core = PerceiverCore::from_config(&small_config()).unwrap();
        let before = core.latent.clone();
        let batch = Batch::new(1, 10, 8);
        core.forward(&batch.inputs(), &mut Mode::Eval).unwrap();
        assert_eq!(core.latent, before);
    }

    #[test]
    fn test_examples_do_not_interact() {
        let core = PerceiverCore::from_config(&small_config()).unwrap();
        let batch = Batch::new(2, 12, 8);
        let both = core.forward(&batch.inputs(), &mut Mode::Eval).unwrap();

        let single = Batch {
            features: batch.features.slice(s![1..2, .., ..]).to_owned(),
            spans: batch.spans.slice(s![1..2, .., ..]).to_owned(),
            global: batch.global.slice(s![1..2, .., ..]).to_owned(),
        };
        let alone = core.forward(&single.inputs(), &mut Mode::Eval).unwrap();
        assert_eq!(both.slice(s![1..2, .., ..]), alone);
    }

    #[test]
    fn test_concurrent_forward_calls() {
        let core = PerceiverCore::from_config(&small_config()).unwrap();
        let batch = Batch::new(2, 16, 8);
        let reference = core.forward(&batch.inputs(), &mut Mode::Eval).unwrap();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| core.forward(&batch.inputs(), &mut Mode::Eval).unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), reference);
            }
        });
    }

    #[test]
    fn test_shape_mismatches() {
        let core = PerceiverCore::from_config(&small_config()).unwrap();
        let good = Batch::new(2, 10, 8);

        let wrong_dim = Batch::new(2, 10, 6);
        assert!(matches!(
            core.forward(&wrong_dim.inputs(), &mut Mode::Eval),
            Err(Error::ShapeMismatch { .. })
        ));

        let wrong_batch = ModalityInputs {
            global: good.global.slice(s![0..1, .., ..]),
            ..good.inputs()
        };
        assert!(matches!(
            core.forward(&wrong_batch, &mut Mode::Eval),
            Err(Error::BatchMismatch { .. })
        ));

        let wide_global = Array3::zeros((2, 3, 8));
        let wrong_global = ModalityInputs {
            global: wide_global.view(),
            ..good.inputs()
        };
        assert!(matches!(
            core.forward(&wrong_global, &mut Mode::Eval),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_methods() {
        let core = PerceiverCore::from_config(&small_config()).unwrap();
        let batch = Batch::new(1, 10, 8);
        let no_methods = Array3::<i64>::zeros((1, 0, 2));
        let inputs = ModalityInputs {
            spans: no_methods.view(),
            ..batch.inputs()
        };
        let out = core.forward(&inputs, &mut Mode::Eval).unwrap();
        assert_eq!(out.dim(), (1, 4, 8));
        assert!(out.iter().all(|v| v.is_finite()));

        // An empty method read differs from reading a span over position 0.
        let first = Array3::<i64>::zeros((1, 1, 2));
        let one_span = ModalityInputs {
            spans: first.view(),
            ..batch.inputs()
        };
        let other = core.forward(&one_span, &mut Mode::Eval).unwrap();
        assert_ne!(out, other);
    }

    #[test]
    fn test_explicit_latent_must_match_config() {
        let mut rng = StdRng::seed_from_u64(0);
        let latent = LatentState::seeded(5, 8, 1);
        assert!(PerceiverCore::new(&small_config(), latent, &mut rng).is_err());
    }
}
