//! Anomaly and failure-risk models plus their persistence slots

pub mod anomaly;
pub mod risk;
pub mod store;

pub use anomaly::AnomalyDetector;
pub use risk::{RiskModel, RiskModelConfig};
pub use store::{ModelStore, ANOMALY_MODEL_SLOT, RISK_MODEL_SLOT};
