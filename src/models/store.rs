//! Model persistence: named binary slots under the models directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

/// Slot name for the anomaly-detector parameters.
pub const ANOMALY_MODEL_SLOT: &str = "anomaly_iforest";

/// Slot name for the risk-model parameters.
pub const RISK_MODEL_SLOT: &str = "risk_gbm";

/// Saves and restores opaque model blobs by slot name.
#[derive(Debug, Clone)]
pub struct ModelStore {
    models_dir: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
        }
    }

    fn slot_path(&self, name: &str) -> PathBuf {
        self.models_dir.join(format!("{name}.bin"))
    }

    /// Persist a model under the named slot, overwriting any previous blob.
    pub fn save<T: Serialize>(&self, name: &str, model: &T) -> Result<()> {
        fs::create_dir_all(&self.models_dir)
            .with_context(|| format!("failed to create models dir {:?}", self.models_dir))?;

        let path = self.slot_path(name);
        let file = File::create(&path)
            .with_context(|| format!("failed to create model file {path:?}"))?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, model)
            .with_context(|| format!("failed to serialize model '{name}'"))?;

        info!(slot = %name, path = %path.display(), "saved model");
        Ok(())
    }

    /// Restore a model from the named slot; `None` when the slot is empty.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.slot_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let file =
            File::open(&path).with_context(|| format!("failed to open model file {path:?}"))?;
        let reader = BufReader::new(file);
        let model = bincode::deserialize_from(reader)
            .with_context(|| format!("failed to deserialize model '{name}'"))?;

        info!(slot = %name, path = %path.display(), "restored model");
        Ok(Some(model))
    }
}
