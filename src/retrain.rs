//! Periodic risk-model retraining.
//!
//! Runs as its own task on a fixed cadence, fully decoupled from ingestion:
//! each tick reads the whole history, trains a fresh candidate model, and
//! swaps it in as the new generation through the watch channel. Scoring
//! callers see either the old generation or the new one, never a mix, and
//! a failed tick always leaves the previous generation in place.

use crate::history::HistoryStore;
use crate::models::risk::{RiskModel, RiskModelConfig};
use crate::models::store::{ModelStore, RISK_MODEL_SLOT};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Keeps the risk model current without ever pausing ingestion.
pub struct RetrainScheduler {
    history_path: PathBuf,
    model_store: ModelStore,
    risk_tx: watch::Sender<Arc<RiskModel>>,
    interval: Duration,
    min_rows: usize,
    model_config: RiskModelConfig,
}

impl RetrainScheduler {
    pub fn new(
        history_path: PathBuf,
        model_store: ModelStore,
        risk_tx: watch::Sender<Arc<RiskModel>>,
        interval: Duration,
        min_rows: usize,
        model_config: RiskModelConfig,
    ) -> Self {
        Self {
            history_path,
            model_store,
            risk_tx,
            interval,
            min_rows,
            model_config,
        }
    }

    /// Run the retrain loop forever at the configured cadence.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        loop {
            interval.tick().await;
            // Best-effort: a failed tick leaves the previous generation in place
            if let Err(e) = self.tick() {
                error!(error = %e, "Retrain tick failed");
            }
        }
    }

    /// One retrain attempt. Returns whether a new generation was swapped in.
    pub fn tick(&self) -> anyhow::Result<bool> {
        let rows = HistoryStore::read_all(&self.history_path)?;
        if rows.len() < self.min_rows {
            info!(
                rows = rows.len(),
                min_rows = self.min_rows,
                "Not enough history to retrain"
            );
            return Ok(false);
        }

        let mut candidate = RiskModel::new(self.model_config.clone());
        if !candidate.train(&rows) {
            info!(rows = rows.len(), "Training declined the batch");
            return Ok(false);
        }

        // Persisting the parameters is best-effort; the in-memory swap
        // must happen either way
        if let Err(e) = self.model_store.save(RISK_MODEL_SLOT, &candidate) {
            warn!(error = %e, "Failed to persist retrained risk model");
        }

        self.risk_tx.send_replace(Arc::new(candidate));
        info!(rows = rows.len(), "Risk model retrained and swapped in");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::sample::{AnnotatedRow, RawSample};
    use chrono::Utc;

    fn hot_row() -> AnnotatedRow {
        AnnotatedRow::new(
            RawSample {
                temperature: 60.0,
                vibration: 7.0,
                rpm: 1200,
                current: 8.0,
                load: 70,
                timestamp: Utc::now(),
            },
            false,
            0.0,
        )
    }

    fn scheduler(
        dir: &std::path::Path,
    ) -> (RetrainScheduler, watch::Receiver<Arc<RiskModel>>) {
        let (tx, rx) = watch::channel(Arc::new(RiskModel::new(RiskModelConfig::default())));
        let scheduler = RetrainScheduler::new(
            dir.join("history.csv"),
            ModelStore::new(dir.join("models")),
            tx,
            Duration::from_secs(60),
            30,
            RiskModelConfig::default(),
        );
        (scheduler, rx)
    }

    #[test]
    fn test_tick_skips_when_history_is_short() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::open(dir.path().join("history.csv")).unwrap();
        for _ in 0..10 {
            store.append(&hot_row()).unwrap();
        }

        let (scheduler, rx) = scheduler(dir.path());
        assert!(!scheduler.tick().unwrap());
        assert!(!rx.borrow().is_fitted());
    }

    #[test]
    fn test_tick_with_missing_history_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, rx) = scheduler(dir.path());
        assert!(!scheduler.tick().unwrap());
        assert!(!rx.borrow().is_fitted());
    }

    #[test]
    fn test_tick_trains_swaps_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::open(dir.path().join("history.csv")).unwrap();
        for _ in 0..35 {
            store.append(&hot_row()).unwrap();
        }

        let (scheduler, rx) = scheduler(dir.path());
        assert!(scheduler.tick().unwrap());

        let generation = Arc::clone(&rx.borrow());
        assert!(generation.is_fitted());
        assert!(generation.predict_single(&hot_row().sample) > 0.6);

        // Parameters must be restorable from the named slot
        let restored: RiskModel = ModelStore::new(dir.path().join("models"))
            .load(RISK_MODEL_SLOT)
            .unwrap()
            .expect("risk model slot should exist after a successful tick");
        assert!(restored.is_fitted());
    }
}
