//! Machine Sensor Simulator
//!
//! Generates synthetic machine telemetry and publishes it to NATS for
//! exercising the twin engine. A configurable fraction of readings simulates
//! a degrading machine (high vibration/temperature).

use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Telemetry payload matching the engine's inbound sample format
#[derive(Debug, Clone, Serialize)]
struct SensorReading {
    temperature: f64,
    vibration: f64,
    rpm: u32,
    current: f64,
    load: u32,
}

struct ReadingGenerator {
    rng: rand::rngs::ThreadRng,
}

impl ReadingGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Normal operating ranges of the simulated machine
    fn generate_nominal(&mut self) -> SensorReading {
        SensorReading {
            temperature: round2(self.rng.gen_range(50.0..85.0)),
            vibration: round2(self.rng.gen_range(1.0..8.0)),
            rpm: self.rng.gen_range(1000..2000),
            current: round2(self.rng.gen_range(5.0..15.0)),
            load: self.rng.gen_range(50..100),
        }
    }

    /// A degrading machine: everything pushed past the risk thresholds
    fn generate_faulty(&mut self) -> SensorReading {
        SensorReading {
            temperature: round2(self.rng.gen_range(78.0..100.0)),
            vibration: round2(self.rng.gen_range(6.5..15.0)),
            rpm: self.rng.gen_range(1750..2400),
            current: round2(self.rng.gen_range(11.5..20.0)),
            load: self.rng.gen_range(90..100),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sensor_sim=info".parse()?),
        )
        .init();

    info!("Starting Machine Sensor Simulator");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("nats://localhost:4222");
    let subject = args
        .get(2)
        .map(|s| s.as_str())
        .unwrap_or("factory.machine1.sensors");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0); // 0 = forever
    let fault_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(1000);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fault_rate = fault_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fault_rate, delay_ms).await;
        }
    };

    let mut generator = ReadingGenerator::new();
    let mut rng = rand::thread_rng();
    let mut published: u64 = 0;

    loop {
        let reading = if rng.gen_bool(fault_rate) {
            generator.generate_faulty()
        } else {
            generator.generate_nominal()
        };

        let payload = serde_json::to_vec(&reading)?;
        client.publish(subject.to_string(), payload.into()).await?;
        published += 1;

        if published % 10 == 0 {
            info!("Published {} readings (last: {:?})", published, reading);
        }

        if count > 0 && published >= count {
            break;
        }
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! Published {} readings", published);
    Ok(())
}

async fn run_dry_mode(count: u64, fault_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = ReadingGenerator::new();
    let mut rng = rand::thread_rng();
    let mut generated: u64 = 0;

    loop {
        let reading = if rng.gen_bool(fault_rate) {
            generator.generate_faulty()
        } else {
            generator.generate_nominal()
        };
        generated += 1;

        if generated % 10 == 0 || generated == 1 {
            info!(
                "Sample reading {}: {}",
                generated,
                serde_json::to_string(&reading)?
            );
        }

        if count > 0 && generated >= count {
            break;
        }
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
