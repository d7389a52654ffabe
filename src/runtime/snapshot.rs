//! Weight snapshots: the full model (config, latent, every weight) as bincode.
//!
//! A snapshot starts with a format version so stale files fail loudly
//! instead of deserialising into garbage.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::runtime::classifier::Malceiver;

/// Bumped whenever the serialised layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    model: &'a Malceiver,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    model: Malceiver,
}

impl Malceiver {
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            model: self,
        };
        bincode::serialize(&snapshot).context("serialising model snapshot")
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let snapshot: Snapshot =
            bincode::deserialize(bytes).context("deserialising model snapshot")?;
        if snapshot.version != SNAPSHOT_VERSION {
            bail!(
                "snapshot version {} is not supported (expected {})",
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }

        let model = snapshot.model;
        model.config.validate()?;
        if model.core.latent_dim() != model.config.latent_dim
            || model.core.latent_length() != model.config.latent_length
        {
            bail!(
                "snapshot latent is {}x{}, config says {}x{}",
                model.core.latent_length(),
                model.core.latent_dim(),
                model.config.latent_length,
                model.config.latent_dim
            );
        }
        if model.core.modality_order != model.config.modality_order {
            bail!(
                "snapshot core fuses modalities as {:?}, config says {:?}",
                model.core.modality_order,
                model.config.modality_order
            );
        }
        if model.core.aggregator.policy != model.config.span_policy {
            bail!(
                "snapshot core uses span policy {:?}, config says {:?}",
                model.core.aggregator.policy,
                model.config.span_policy
            );
        }
        if !model.core.latent.is_healthy() {
            bail!("snapshot latent contains non-finite values");
        }
        Ok(model)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        fs::write(path, &bytes)
            .with_context(|| format!("writing snapshot to {}", path.display()))?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "saved snapshot");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("reading snapshot {}", path.display()))?;
        let model = Self::from_bytes(&bytes)
            .with_context(|| format!("loading snapshot {}", path.display()))?;
        tracing::info!(path = %path.display(), params = model.param_count(), "loaded snapshot");
        Ok(model)
    }
}
