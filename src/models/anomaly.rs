//! Isolation-forest anomaly detector.
//!
//! Outliers are easier to isolate with random axis-parallel splits, so they
//! end up with shorter average path lengths across the forest. The decision
//! threshold is derived from the training scores themselves: the fraction of
//! training data assumed anomalous (contamination) sets the cut-off quantile.
//!
//! An unfitted detector abstains: `score` reports every input as not
//! anomalous rather than erroring, so the ingestion path never blocks on a
//! model that has not been trained yet.

use crate::feature_extractor::{FeatureVector, FEATURE_COUNT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Default fraction of training data assumed anomalous.
pub const DEFAULT_CONTAMINATION: f64 = 0.05;

const NUM_TREES: usize = 100;
const MAX_TREE_SAMPLES: usize = 256;

/// Unsupervised outlier detector over feature vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyDetector {
    trees: Vec<TreeNode>,
    sample_size: usize,
    contamination: f64,
    threshold: f64,
    seed: u64,
    fitted: bool,
}

impl AnomalyDetector {
    pub fn new(contamination: f64, seed: u64) -> Self {
        Self {
            trees: Vec::new(),
            sample_size: 0,
            contamination,
            threshold: 1.0,
            seed,
            fitted: false,
        }
    }

    /// Train the forest on a batch of feature vectors.
    ///
    /// Deterministic for a fixed seed. Empty input leaves the detector
    /// unfitted.
    pub fn fit(&mut self, vectors: &[FeatureVector]) {
        if vectors.is_empty() {
            return;
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.sample_size = vectors.len().min(MAX_TREE_SAMPLES);
        let max_depth = (self.sample_size as f64).log2().ceil() as usize;

        self.trees.clear();
        for _ in 0..NUM_TREES {
            // Sample with replacement
            let subsample: Vec<FeatureVector> = (0..self.sample_size)
                .map(|_| vectors[rng.gen_range(0..vectors.len())])
                .collect();
            self.trees
                .push(TreeNode::build(&subsample, 0, max_depth, &mut rng));
        }

        // Cut-off at the contamination quantile of the training scores;
        // only samples scoring strictly above it are flagged.
        let mut scores: Vec<f64> = vectors.iter().map(|v| self.score_sample(v)).collect();
        scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let cut = ((self.contamination * vectors.len() as f64).floor() as usize)
            .min(vectors.len() - 1);
        self.threshold = scores[cut];

        self.fitted = true;
    }

    /// Flag each vector in the batch as outlier or not.
    ///
    /// Fail-open: an unfitted detector (or an empty batch) yields all-false
    /// of matching length.
    pub fn score(&self, vectors: &[FeatureVector]) -> Vec<bool> {
        if !self.fitted || vectors.is_empty() {
            return vec![false; vectors.len()];
        }

        vectors
            .iter()
            .map(|v| self.score_sample(v) > self.threshold)
            .collect()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Anomaly score in (0, 1): `2^(-E[h(x)] / c(n))`.
    fn score_sample(&self, vector: &FeatureVector) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }

        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(vector, 0.0))
            .sum();
        let avg_path = total / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size);
        if norm == 0.0 {
            return 0.5;
        }

        2.0_f64.powf(-avg_path / norm)
    }
}

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + 0.5772156649) - 2.0 * (n - 1.0) / n
}

/// One node of an isolation tree; a node without children is a leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeNode {
    split_feature: usize,
    split_value: f64,
    size: usize,
    left: Option<Box<TreeNode>>,
    right: Option<Box<TreeNode>>,
}

impl TreeNode {
    fn leaf(size: usize) -> Self {
        Self {
            split_feature: 0,
            split_value: 0.0,
            size,
            left: None,
            right: None,
        }
    }

    fn build(samples: &[FeatureVector], depth: usize, max_depth: usize, rng: &mut StdRng) -> Self {
        let size = samples.len();
        if size <= 1 || depth >= max_depth {
            return Self::leaf(size);
        }

        let feature = rng.gen_range(0..FEATURE_COUNT);
        let mut min_val = samples[0][feature];
        let mut max_val = min_val;
        for row in samples {
            min_val = min_val.min(row[feature]);
            max_val = max_val.max(row[feature]);
        }
        if (max_val - min_val).abs() < 1e-12 {
            return Self::leaf(size);
        }

        let split_value = min_val + rng.gen::<f64>() * (max_val - min_val);
        let (left, right): (Vec<FeatureVector>, Vec<FeatureVector>) =
            samples.iter().partition(|row| row[feature] < split_value);
        if left.is_empty() || right.is_empty() {
            return Self::leaf(size);
        }

        Self {
            split_feature: feature,
            split_value,
            size,
            left: Some(Box::new(Self::build(&left, depth + 1, max_depth, rng))),
            right: Some(Box::new(Self::build(&right, depth + 1, max_depth, rng))),
        }
    }

    fn path_length(&self, vector: &FeatureVector, depth: f64) -> f64 {
        match (&self.left, &self.right) {
            (Some(left), Some(right)) => {
                if vector[self.split_feature] < self.split_value {
                    left.path_length(vector, depth + 1.0)
                } else {
                    right.path_length(vector, depth + 1.0)
                }
            }
            // Leaf: credit the remaining depth of the unsplit subsample
            _ => depth + average_path_length(self.size),
        }
    }
}
