//! Alert payload and the alert predicate

use crate::types::sample::AnnotatedRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert emitted to the external sink when a scored sample trips the
/// alert predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Timestamp of the sample that triggered the alert
    pub timestamp: DateTime<Utc>,

    /// Whether the sample was flagged as an anomaly
    pub anomaly: bool,

    /// Predicted failure risk in [0, 1]
    pub risk_score: f64,
}

impl Alert {
    /// Alert predicate: anomalous, or risk strictly above the threshold.
    pub fn should_raise(anomaly: bool, risk_score: f64, risk_threshold: f64) -> bool {
        anomaly || risk_score > risk_threshold
    }

    /// Build the alert payload for a scored row.
    pub fn from_row(row: &AnnotatedRow) -> Self {
        Self {
            timestamp: row.sample.timestamp,
            anomaly: row.anomaly,
            risk_score: row.risk_score,
        }
    }
}
