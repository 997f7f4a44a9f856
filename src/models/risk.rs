//! Predictive-maintenance risk model.
//!
//! A gradient-boosted ensemble of decision stumps trained on historical
//! rows. No external failure labels exist, so ground truth is derived from a
//! fixed rule over the raw readings; the rule is deliberately conservative
//! and must stay bit-for-bit compatible with the persisted history.
//!
//! Like the anomaly detector, the model fails open: unfitted means a risk of
//! exactly 0.0, never an error.

use crate::feature_extractor::{FeatureExtractor, FeatureVector, FEATURE_COUNT};
use crate::types::sample::{AnnotatedRow, RawSample};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Risk model hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskModelConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to each stump's contribution
    pub learning_rate: f64,
    /// Minimum rows required before training mutates the model
    pub min_rows: usize,
    /// Fraction of rows held out of training for evaluation
    pub holdout_fraction: f64,
    /// Seed for the reproducible train/held-out split
    pub seed: u64,
}

impl Default for RiskModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            learning_rate: 0.1,
            min_rows: 30,
            holdout_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Supervised classifier producing a failure-risk estimate in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskModel {
    config: RiskModelConfig,
    stumps: Vec<DecisionStump>,
    base_score: f64,
    fitted: bool,
}

impl RiskModel {
    pub fn new(config: RiskModelConfig) -> Self {
        Self {
            config,
            stumps: Vec::new(),
            base_score: 0.0,
            fitted: false,
        }
    }

    /// Derived label rule: a reading is "at risk" iff any field exceeds its
    /// fixed threshold.
    pub fn label(sample: &RawSample) -> u8 {
        let at_risk = sample.vibration > 6.0
            || sample.temperature > 75.0
            || sample.rpm > 1700
            || sample.current > 11.0;
        at_risk as u8
    }

    /// Train from historical rows.
    ///
    /// Returns `false` without touching the fitted state when fewer than
    /// `min_rows` rows are available (a scheduling no-op, not an error).
    /// Otherwise performs a seeded 80/20 train/held-out split, fits the
    /// boosted ensemble on the train portion and marks the model fitted.
    pub fn train(&mut self, rows: &[AnnotatedRow]) -> bool {
        if rows.len() < self.config.min_rows {
            return false;
        }

        let extractor = FeatureExtractor::new();
        let mut indices: Vec<usize> = (0..rows.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        indices.shuffle(&mut rng);

        let holdout_len = (rows.len() as f64 * self.config.holdout_fraction).floor() as usize;
        let (holdout_idx, train_idx) = indices.split_at(holdout_len);

        let features: Vec<FeatureVector> = train_idx
            .iter()
            .map(|&i| extractor.extract(&rows[i].sample))
            .collect();
        let labels: Vec<f64> = train_idx
            .iter()
            .map(|&i| Self::label(&rows[i].sample) as f64)
            .collect();

        self.fit_boosted(&features, &labels);
        self.fitted = true;

        // Held-out accuracy is informational only
        if !holdout_idx.is_empty() {
            let correct = holdout_idx
                .iter()
                .filter(|&&i| {
                    let predicted = self.predict_features(&extractor.extract(&rows[i].sample));
                    (predicted > 0.5) == (Self::label(&rows[i].sample) == 1)
                })
                .count();
            debug!(
                holdout = holdout_idx.len(),
                accuracy = correct as f64 / holdout_idx.len() as f64,
                "held-out evaluation after training"
            );
        }

        true
    }

    /// Failure-risk estimate for one sample; 0.0 when unfitted.
    pub fn predict_single(&self, sample: &RawSample) -> f64 {
        if !self.fitted {
            return 0.0;
        }
        self.predict_features(&FeatureExtractor::new().extract(sample))
    }

    /// Row-wise risk estimates; all zeros of matching length when unfitted.
    pub fn predict_batch(&self, rows: &[AnnotatedRow]) -> Vec<f64> {
        if !self.fitted {
            return vec![0.0; rows.len()];
        }
        let extractor = FeatureExtractor::new();
        rows.iter()
            .map(|row| self.predict_features(&extractor.extract(&row.sample)))
            .collect()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn fit_boosted(&mut self, features: &[FeatureVector], labels: &[f64]) {
        self.stumps.clear();
        self.base_score = mean(labels);

        let mut predictions = vec![self.base_score; features.len()];
        for _ in 0..self.config.n_estimators {
            let residuals: Vec<f64> = labels
                .iter()
                .zip(predictions.iter())
                .map(|(y, p)| y - p)
                .collect();
            if residuals.iter().all(|r| r.abs() < 1e-9) {
                break;
            }

            let stump = DecisionStump::fit(features, &residuals);
            for (i, f) in features.iter().enumerate() {
                predictions[i] += self.config.learning_rate * stump.predict(f);
            }
            self.stumps.push(stump);
        }
    }

    fn predict_features(&self, features: &FeatureVector) -> f64 {
        let mut score = self.base_score;
        for stump in &self.stumps {
            score += self.config.learning_rate * stump.predict(features);
        }
        score.clamp(0.0, 1.0)
    }
}

/// A single-split regression tree fit to residuals.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DecisionStump {
    split: Option<Split>,
    default_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Split {
    feature_idx: usize,
    threshold: f64,
    left_value: f64,
    right_value: f64,
}

impl DecisionStump {
    /// Pick the split minimizing weighted residual variance across all five
    /// features; falls back to the mean residual when no split helps.
    fn fit(features: &[FeatureVector], residuals: &[f64]) -> Self {
        let mut best_gain = 0.0_f64;
        let mut best_split: Option<Split> = None;
        let total_var = variance(residuals);

        for feature_idx in 0..FEATURE_COUNT {
            let mut values: Vec<f64> = features.iter().map(|f| f[feature_idx]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            for threshold in values.iter().skip(1) {
                let mut left = Vec::new();
                let mut right = Vec::new();
                for (f, r) in features.iter().zip(residuals.iter()) {
                    if f[feature_idx] < *threshold {
                        left.push(*r);
                    } else {
                        right.push(*r);
                    }
                }
                if left.is_empty() || right.is_empty() {
                    continue;
                }

                let left_weight = left.len() as f64 / residuals.len() as f64;
                let right_weight = right.len() as f64 / residuals.len() as f64;
                let gain =
                    total_var - (left_weight * variance(&left) + right_weight * variance(&right));

                if gain > best_gain {
                    best_gain = gain;
                    best_split = Some(Split {
                        feature_idx,
                        threshold: *threshold,
                        left_value: mean(&left),
                        right_value: mean(&right),
                    });
                }
            }
        }

        Self {
            split: best_split,
            default_value: if best_gain > 0.0 { 0.0 } else { mean(residuals) },
        }
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        match &self.split {
            Some(split) => {
                if features[split.feature_idx] < split.threshold {
                    split.left_value
                } else {
                    split.right_value
                }
            }
            None => self.default_value,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(temperature: f64, vibration: f64, rpm: u32, current: f64, load: u32) -> RawSample {
        RawSample {
            temperature,
            vibration,
            rpm,
            current,
            load,
            timestamp: Utc::now(),
        }
    }

    fn row(s: RawSample) -> AnnotatedRow {
        AnnotatedRow::new(s, false, 0.0)
    }

    fn idle_row() -> AnnotatedRow {
        row(sample(22.0, 0.0, 0, 0.0, 0))
    }

    fn hot_row() -> AnnotatedRow {
        row(sample(82.0, 7.5, 1850, 12.5, 95))
    }

    #[test]
    fn test_label_rule_boundaries() {
        assert_eq!(RiskModel::label(&sample(75.0, 0.0, 0, 0.0, 0)), 0);
        assert_eq!(RiskModel::label(&sample(75.01, 0.0, 0, 0.0, 0)), 1);
        assert_eq!(RiskModel::label(&sample(22.0, 6.0, 0, 0.0, 0)), 0);
        assert_eq!(RiskModel::label(&sample(22.0, 6.01, 0, 0.0, 0)), 1);
        assert_eq!(RiskModel::label(&sample(22.0, 0.0, 1700, 0.0, 0)), 0);
        assert_eq!(RiskModel::label(&sample(22.0, 0.0, 1701, 0.0, 0)), 1);
        assert_eq!(RiskModel::label(&sample(22.0, 0.0, 0, 11.0, 0)), 0);
        assert_eq!(RiskModel::label(&sample(22.0, 0.0, 0, 11.01, 0)), 1);
    }

    #[test]
    fn test_unfitted_model_predicts_zero() {
        let model = RiskModel::new(RiskModelConfig::default());
        assert_eq!(model.predict_single(&sample(90.0, 9.0, 1900, 14.0, 100)), 0.0);

        let rows = vec![hot_row(), idle_row(), hot_row()];
        assert_eq!(model.predict_batch(&rows), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_train_requires_minimum_rows() {
        let mut model = RiskModel::new(RiskModelConfig::default());
        let rows: Vec<AnnotatedRow> = (0..29).map(|_| hot_row()).collect();

        assert!(!model.train(&rows));
        assert!(!model.is_fitted());
        assert_eq!(model.predict_single(&hot_row().sample), 0.0);
    }

    #[test]
    fn test_train_on_all_positive_rows_predicts_high_risk() {
        let mut model = RiskModel::new(RiskModelConfig::default());
        let rows: Vec<AnnotatedRow> = (0..35)
            .map(|_| row(sample(60.0, 7.0, 1200, 8.0, 70)))
            .collect();

        assert!(model.train(&rows));
        assert!(model.is_fitted());

        let risk = model.predict_single(&sample(60.0, 7.0, 1200, 8.0, 70));
        assert!(risk > 0.6, "expected high risk, got {risk}");
    }

    #[test]
    fn test_train_separates_idle_from_hot() {
        let mut model = RiskModel::new(RiskModelConfig::default());
        let mut rows: Vec<AnnotatedRow> = (0..50).map(|_| idle_row()).collect();
        rows.extend((0..50).map(|_| hot_row()));

        assert!(model.train(&rows));

        let idle_risk = model.predict_single(&idle_row().sample);
        let hot_risk = model.predict_single(&hot_row().sample);
        assert!(
            hot_risk > idle_risk,
            "hot {hot_risk} should exceed idle {idle_risk}"
        );
        assert!(hot_risk > 0.6);
        assert!(idle_risk < 0.4);
    }

    #[test]
    fn test_training_is_deterministic_for_fixed_seed() {
        let mut rows: Vec<AnnotatedRow> = (0..40).map(|_| idle_row()).collect();
        rows.extend((0..40).map(|_| hot_row()));

        let mut a = RiskModel::new(RiskModelConfig::default());
        let mut b = RiskModel::new(RiskModelConfig::default());
        assert!(a.train(&rows));
        assert!(b.train(&rows));

        let probe = sample(70.0, 5.0, 1600, 10.0, 80);
        assert_eq!(a.predict_single(&probe), b.predict_single(&probe));
    }

    #[test]
    fn test_prediction_stays_in_unit_interval() {
        let mut model = RiskModel::new(RiskModelConfig::default());
        let rows: Vec<AnnotatedRow> = (0..60).map(|_| hot_row()).collect();
        assert!(model.train(&rows));

        for s in [
            sample(0.0, 0.0, 0, 0.0, 0),
            sample(200.0, 50.0, 9000, 99.0, 100),
        ] {
            let risk = model.predict_single(&s);
            assert!((0.0..=1.0).contains(&risk));
        }
    }
}
