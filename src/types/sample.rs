//! Telemetry sample data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One telemetry reading from the monitored machine.
///
/// `temperature`, `vibration` and `current` are required; a payload missing
/// any of them is malformed and gets dropped by the pipeline. `rpm` and
/// `load` default to 0, and samples without a timestamp are stamped at
/// receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSample {
    /// Temperature in degrees Celsius
    pub temperature: f64,

    /// Vibration in mm/s
    pub vibration: f64,

    /// Rotational speed in rotations per minute
    #[serde(default)]
    pub rpm: u32,

    /// Motor current in amperes
    pub current: f64,

    /// Machine load in percent (0-100)
    #[serde(default)]
    pub load: u32,

    /// Reading timestamp (optional on the wire)
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// A scored sample: the unit persisted to the history store.
///
/// Created exactly once per accepted sample with the annotations that were
/// valid when it was scored; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedRow {
    #[serde(flatten)]
    pub sample: RawSample,

    /// Flagged as a statistical outlier by the anomaly detector
    pub anomaly: bool,

    /// Predicted failure risk in [0, 1]
    pub risk_score: f64,
}

impl AnnotatedRow {
    pub fn new(sample: RawSample, anomaly: bool, risk_score: f64) -> Self {
        Self {
            sample,
            anomaly,
            risk_score,
        }
    }
}
