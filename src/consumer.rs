//! NATS consumer for incoming sensor samples

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Subscribes to the sensor-sample subject.
pub struct SensorConsumer {
    client: Client,
    subject: String,
}

impl SensorConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the sensor subject.
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to sensor subject");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
