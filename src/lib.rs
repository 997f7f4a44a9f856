//! Digital Twin Engine Library
//!
//! Ingests a stream of machine-telemetry samples, scores each for
//! anomalousness and failure risk, persists an append-only history, and
//! periodically retrains the risk model from that history without blocking
//! ingestion.

pub mod config;
pub mod consumer;
pub mod feature_extractor;
pub mod history;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod retrain;
pub mod types;

pub use config::AppConfig;
pub use consumer::SensorConsumer;
pub use feature_extractor::{FeatureExtractor, FeatureVector};
pub use history::HistoryStore;
pub use models::{AnomalyDetector, ModelStore, RiskModel};
pub use pipeline::{IngestionPipeline, Outcome};
pub use producer::AlertPublisher;
pub use retrain::RetrainScheduler;
pub use types::{alert::Alert, sample::AnnotatedRow, sample::RawSample};
