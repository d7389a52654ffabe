//! MALCEIVER: latent-bottleneck malware classifier.
//!
//! This is the CLI binary entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use malceiver::config;
use malceiver::core::model::ModelConfig;
use malceiver::core::segment::SpanPolicy;
use malceiver::runtime::request::{assemble_batch, load_requests, synthetic_sample};
use malceiver::runtime::Malceiver;

/// MALCEIVER inference CLI.
#[derive(Parser, Debug)]
#[command(
    name = "malceiver",
    about = "MALCEIVER: perceiver-style malware classification over opcode features",
    version
)]
struct Cli {
    /// JSON file with one sample or an array of samples. Without it a
    /// synthetic sample is classified.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Load a weight snapshot instead of initialising from the flags below.
    #[arg(short, long)]
    weights: Option<PathBuf>,

    /// Write the model's weight snapshot here after classifying.
    #[arg(long)]
    save_weights: Option<PathBuf>,

    /// Latent slot width (D); must match the feature width.
    #[arg(long, default_value_t = config::HIDDEN_DIM)]
    latent_dim: usize,

    /// Number of latent slots (L).
    #[arg(long, default_value_t = config::LATENT_LENGTH)]
    latent_length: usize,

    /// Initialisation seed for the latent state and weights.
    #[arg(long, default_value_t = config::DEFAULT_SEED)]
    seed: u64,

    /// Treat reversed spans as empty instead of dividing by their raw length.
    #[arg(long, default_value_t = false)]
    clamp_spans: bool,

    /// Positions in the synthetic sample.
    #[arg(long, default_value_t = 256)]
    seq_len: usize,

    /// Methods in the synthetic sample.
    #[arg(long, default_value_t = 8)]
    methods: usize,
}

fn main() -> anyhow::Result<()> {
    // Initialise tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    tracing::info!("MALCEIVER v{}", env!("CARGO_PKG_VERSION"));

    let model = match &cli.weights {
        Some(path) => Malceiver::load(path)?,
        None => {
            let span_policy = if cli.clamp_spans {
                SpanPolicy::ClampLength
            } else {
                SpanPolicy::Unguarded
            };
            Malceiver::new(ModelConfig {
                latent_dim: cli.latent_dim,
                latent_length: cli.latent_length,
                span_policy,
                seed: cli.seed,
                ..Default::default()
            })?
        }
    };

    tracing::info!(
        "Config: L={}, D={}, {} params, order {:?}",
        model.config.latent_length,
        model.config.latent_dim,
        model.param_count(),
        model.config.modality_order,
    );

    let requests = match &cli.input {
        Some(path) => load_requests(path)?,
        None => {
            tracing::warn!("No input provided. Classifying a synthetic sample.");
            let mut rng = StdRng::seed_from_u64(cli.seed ^ 0x5a5a);
            vec![synthetic_sample(
                cli.seq_len,
                cli.methods,
                model.config.latent_dim,
                &mut rng,
            )]
        }
    };
    let batch = assemble_batch(&requests)?;
    tracing::info!(
        "Batch: {} samples, {} positions, {} methods",
        batch.len(),
        batch.features.dim().1,
        batch.spans.dim().1,
    );

    let predictions = model.predict(&batch.inputs())?;
    println!(
        "{}",
        serde_json::to_string_pretty(&predictions).context("encoding predictions")?
    );

    if let Some(path) = &cli.save_weights {
        model.save(path)?;
    }

    tracing::info!("Done.");
    Ok(())
}
