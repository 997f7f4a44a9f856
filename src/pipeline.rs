//! Per-sample ingestion pipeline.
//!
//! Drives one state machine instance per arriving payload:
//! parse → featurize → score → persist → alert decision. The pipeline is the
//! sole writer of the history store and processes samples strictly in
//! arrival order. It reads model parameters without ever waiting on the
//! retrainer: the current risk-model generation is cloned out of a `watch`
//! channel, so a retrain in progress can never stall scoring.

use crate::feature_extractor::FeatureExtractor;
use crate::history::HistoryStore;
use crate::models::anomaly::AnomalyDetector;
use crate::models::risk::RiskModel;
use crate::types::alert::Alert;
use crate::types::sample::{AnnotatedRow, RawSample};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// What became of one delivered payload.
#[derive(Debug)]
pub enum Outcome {
    /// Malformed payload, logged and discarded
    Dropped,
    /// Sample scored and durably persisted
    Processed {
        row: AnnotatedRow,
        /// Present iff the alert predicate held for this row
        alert: Option<Alert>,
    },
}

/// The non-blocking per-sample scoring path.
pub struct IngestionPipeline {
    extractor: FeatureExtractor,
    anomaly: Arc<AnomalyDetector>,
    risk_rx: watch::Receiver<Arc<RiskModel>>,
    history: HistoryStore,
    alert_threshold: f64,
}

impl IngestionPipeline {
    pub fn new(
        anomaly: Arc<AnomalyDetector>,
        risk_rx: watch::Receiver<Arc<RiskModel>>,
        history: HistoryStore,
        alert_threshold: f64,
    ) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            anomaly,
            risk_rx,
            history,
            alert_threshold,
        }
    }

    /// Process one raw payload end to end.
    ///
    /// Malformed input yields `Outcome::Dropped` (never an error). An error
    /// return means the durable append failed; the caller must treat that as
    /// fatal, since continuing would silently drop rows.
    pub fn process(&mut self, payload: &[u8]) -> Result<Outcome> {
        let sample: RawSample = match serde_json::from_slice(payload) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, "Dropping malformed sample");
                return Ok(Outcome::Dropped);
            }
        };

        let features = self.extractor.extract(&sample);
        let anomaly = self.anomaly.score(std::slice::from_ref(&features))[0];

        // Clone the current generation out of the watch cell, then drop the
        // borrow before scoring so a concurrent swap is never waited on.
        let risk_model = Arc::clone(&self.risk_rx.borrow());
        let risk_score = risk_model.predict_single(&sample);

        let row = AnnotatedRow::new(sample, anomaly, risk_score);
        self.history
            .append(&row)
            .context("failed to persist annotated row")?;

        debug!(
            temperature = row.sample.temperature,
            vibration = row.sample.vibration,
            rpm = row.sample.rpm,
            anomaly = row.anomaly,
            risk_score = row.risk_score,
            "Twin updated"
        );

        let alert = if Alert::should_raise(row.anomaly, row.risk_score, self.alert_threshold) {
            Some(Alert::from_row(&row))
        } else {
            None
        };

        Ok(Outcome::Processed { row, alert })
    }

    /// Path of the underlying history file.
    pub fn history_path(&self) -> &std::path::Path {
        self.history.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::risk::RiskModelConfig;

    fn fresh_pipeline(dir: &std::path::Path) -> IngestionPipeline {
        let anomaly = Arc::new(AnomalyDetector::new(0.05, 42));
        let (_tx, rx) = watch::channel(Arc::new(RiskModel::new(RiskModelConfig::default())));
        let history = HistoryStore::open(dir.join("history.csv")).unwrap();
        IngestionPipeline::new(anomaly, rx, history, 0.6)
    }

    #[test]
    fn test_valid_sample_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = fresh_pipeline(dir.path());

        let payload = br#"{"temperature": 22.0, "vibration": 0.0, "rpm": 0, "current": 0.0, "load": 0}"#;
        match pipeline.process(payload).unwrap() {
            Outcome::Processed { row, alert } => {
                assert!(!row.anomaly);
                assert_eq!(row.risk_score, 0.0);
                assert!(alert.is_none());
            }
            Outcome::Dropped => panic!("valid sample was dropped"),
        }

        let rows = HistoryStore::read_all(dir.path().join("history.csv")).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_malformed_sample_is_dropped_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = fresh_pipeline(dir.path());

        for payload in [
            &b"not json at all"[..],
            br#"{"vibration": 1.0, "current": 2.0}"#,
            br#"{"temperature": "hot", "vibration": 1.0, "current": 2.0}"#,
        ] {
            assert!(matches!(
                pipeline.process(payload).unwrap(),
                Outcome::Dropped
            ));
        }

        let rows = HistoryStore::read_all(dir.path().join("history.csv")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_risk_model_swap_is_visible_to_next_sample() {
        let dir = tempfile::tempdir().unwrap();
        let anomaly = Arc::new(AnomalyDetector::new(0.05, 42));
        let (tx, rx) = watch::channel(Arc::new(RiskModel::new(RiskModelConfig::default())));
        let history = HistoryStore::open(dir.path().join("history.csv")).unwrap();
        let mut pipeline = IngestionPipeline::new(anomaly, rx, history, 0.6);

        let hot = br#"{"temperature": 60.0, "vibration": 7.0, "rpm": 1200, "current": 8.0, "load": 70}"#;

        // Unfitted generation: zero risk, no alert
        match pipeline.process(hot).unwrap() {
            Outcome::Processed { row, alert } => {
                assert_eq!(row.risk_score, 0.0);
                assert!(alert.is_none());
            }
            Outcome::Dropped => panic!("sample dropped"),
        }

        // Train a new generation and swap it in
        let mut trained = RiskModel::new(RiskModelConfig::default());
        let rows: Vec<AnnotatedRow> = (0..35)
            .map(|_| {
                let sample: RawSample = serde_json::from_slice(hot).unwrap();
                AnnotatedRow::new(sample, false, 0.0)
            })
            .collect();
        assert!(trained.train(&rows));
        tx.send_replace(Arc::new(trained));

        match pipeline.process(hot).unwrap() {
            Outcome::Processed { row, alert } => {
                assert!(row.risk_score > 0.6);
                assert!(alert.is_some());
            }
            Outcome::Dropped => panic!("sample dropped"),
        }
    }
}
