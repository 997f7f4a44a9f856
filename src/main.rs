//! Digital Twin Engine - Main Entry Point
//!
//! Subscribes to sensor samples on NATS, scores each one for anomalousness
//! and failure risk, appends the annotated row to the durable history, and
//! publishes alerts. A background task periodically retrains the risk model
//! from the accumulated history.

use anyhow::Result;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};
use twin_engine::{
    config::AppConfig,
    consumer::SensorConsumer,
    history::HistoryStore,
    metrics::{EngineMetrics, MetricsReporter},
    models::risk::RiskModelConfig,
    models::{AnomalyDetector, ModelStore, RiskModel, ANOMALY_MODEL_SLOT, RISK_MODEL_SLOT},
    pipeline::{IngestionPipeline, Outcome},
    producer::AlertPublisher,
    retrain::RetrainScheduler,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("twin_engine=info".parse()?),
        )
        .init();

    info!("Starting Digital Twin Engine");

    // Load configuration
    let config = AppConfig::load()?;
    info!(
        "Retrain every {}s (min {} rows), contamination {:.2}, alert threshold {:.2}",
        config.retrain.interval_secs,
        config.retrain.min_rows,
        config.detection.contamination,
        config.detection.alert_threshold
    );

    let metrics = Arc::new(EngineMetrics::new());
    let model_store = ModelStore::new(&config.storage.models_dir);

    // Restore model generations from their slots where present
    let mut anomaly = AnomalyDetector::new(config.detection.contamination, config.detection.seed);
    match model_store.load::<AnomalyDetector>(ANOMALY_MODEL_SLOT) {
        Ok(Some(saved)) => anomaly = saved,
        Ok(None) => info!("No persisted anomaly detector, starting unfitted"),
        Err(e) => warn!(error = %e, "Could not restore anomaly detector, starting unfitted"),
    }
    let anomaly = Arc::new(anomaly);

    let risk_config = RiskModelConfig {
        min_rows: config.retrain.min_rows,
        seed: config.detection.seed,
        ..Default::default()
    };
    let mut risk = RiskModel::new(risk_config.clone());
    match model_store.load::<RiskModel>(RISK_MODEL_SLOT) {
        Ok(Some(saved)) => risk = saved,
        Ok(None) => info!("No persisted risk model, starting unfitted"),
        Err(e) => warn!(error = %e, "Could not restore risk model, starting unfitted"),
    }
    let (risk_tx, risk_rx) = watch::channel(Arc::new(risk));

    // Open the durable history (sole writer: the ingestion pipeline)
    let history = HistoryStore::open(&config.storage.history_path)?;
    info!(path = %history.path().display(), "History store ready");

    let mut pipeline = IngestionPipeline::new(
        Arc::clone(&anomaly),
        risk_rx,
        history,
        config.detection.alert_threshold,
    );

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = SensorConsumer::new(client.clone(), &config.nats.sensor_subject);
    let publisher = AlertPublisher::new(client.clone(), &config.nats.alert_subject);

    // Retrain task: the only writer of risk-model generations
    let scheduler = RetrainScheduler::new(
        PathBuf::from(&config.storage.history_path),
        model_store,
        risk_tx,
        Duration::from_secs(config.retrain.interval_secs),
        config.retrain.min_rows,
        risk_config,
    );
    tokio::spawn(scheduler.run());

    // Periodic metrics summary
    let reporter = MetricsReporter::new(Arc::clone(&metrics), 30);
    tokio::spawn(reporter.start());

    info!(
        "Listening on {}, publishing alerts to {}",
        config.nats.sensor_subject, config.nats.alert_subject
    );

    // Samples are processed strictly in arrival order: one state machine
    // instance at a time, so history order equals arrival order.
    let mut subscription = consumer.subscribe().await?;
    while let Some(message) = subscription.next().await {
        let started = Instant::now();

        match pipeline.process(&message.payload) {
            Ok(Outcome::Processed { row, alert }) => {
                metrics.record_sample(started.elapsed(), row.risk_score, row.anomaly);

                if let Some(alert) = alert {
                    // Alert delivery is best-effort; the row is already durable
                    match publisher.publish(&alert).await {
                        Ok(()) => {
                            metrics.record_alert();
                            info!(
                                anomaly = alert.anomaly,
                                risk_score = alert.risk_score,
                                "Alert published"
                            );
                        }
                        Err(e) => error!(error = %e, "Failed to publish alert"),
                    }
                }
            }
            Ok(Outcome::Dropped) => metrics.record_dropped(),
            Err(e) => {
                // Durable-append failure: continuing would silently drop rows
                error!(error = %e, "History append failed, stopping ingestion");
                metrics.print_summary();
                return Err(e);
            }
        }
    }

    info!("Sensor stream closed, shutting down");
    metrics.print_summary();

    Ok(())
}
