//! Feature extraction for anomaly detection and risk scoring.
//!
//! Both models are trained and queried with the same fixed-order encoding
//! of a sample; the ordering here is the single source of truth.

use crate::types::sample::RawSample;

/// Number of features in a [`FeatureVector`].
pub const FEATURE_COUNT: usize = 5;

/// Fixed-order numeric encoding of a sample:
/// `[temperature, vibration, rpm, current, load]`.
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Extracts feature vectors from raw samples.
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the feature vector for a sample.
    ///
    /// Non-finite values map to 0 so a NaN reading can never poison a model.
    pub fn extract(&self, sample: &RawSample) -> FeatureVector {
        [
            finite_or_zero(sample.temperature),
            finite_or_zero(sample.vibration),
            sample.rpm as f64,
            finite_or_zero(sample.current),
            sample.load as f64,
        ]
    }

    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn feature_names(&self) -> [&'static str; FEATURE_COUNT] {
        ["temperature", "vibration", "rpm", "current", "load"]
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
