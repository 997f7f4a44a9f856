//! NATS publisher for outgoing alerts

use crate::types::alert::Alert;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Publishes alerts to the alert subject.
///
/// Publishing is best-effort: a failure here is logged by the caller and
/// never affects the already-persisted row.
#[derive(Clone)]
pub struct AlertPublisher {
    client: Client,
    subject: String,
}

impl AlertPublisher {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish one alert.
    pub async fn publish(&self, alert: &Alert) -> Result<()> {
        let payload = serde_json::to_vec(alert)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            timestamp = %alert.timestamp,
            anomaly = alert.anomaly,
            risk_score = alert.risk_score,
            "Published alert"
        );

        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
