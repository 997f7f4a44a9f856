//! Pipeline counters and periodic summary reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the ingestion pipeline.
pub struct EngineMetrics {
    /// Samples scored and persisted
    pub samples_processed: AtomicU64,
    /// Malformed samples dropped
    pub samples_dropped: AtomicU64,
    /// Samples flagged anomalous
    pub anomalies_flagged: AtomicU64,
    /// Alerts published
    pub alerts_published: AtomicU64,
    /// Per-sample processing times in microseconds
    processing_times: RwLock<Vec<u64>>,
    /// Risk score distribution buckets (0.0-0.1, ..., 0.9-1.0)
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            samples_processed: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            anomalies_flagged: AtomicU64::new(0),
            alerts_published: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a processed (persisted) sample.
    pub fn record_sample(&self, processing_time: Duration, risk_score: f64, anomaly: bool) {
        self.samples_processed.fetch_add(1, Ordering::Relaxed);
        if anomaly {
            self.anomalies_flagged.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent window
            if times.len() > 10_000 {
                times.drain(0..5_000);
            }
        }

        let bucket = ((risk_score * 10.0).min(9.0).max(0.0)) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn record_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Current throughput in samples per second.
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.samples_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Processing time statistics over the recent window.
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) => times,
            Err(_) => return ProcessingStats::default(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();
        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Log a summary of all counters.
    pub fn print_summary(&self) {
        let processed = self.samples_processed.load(Ordering::Relaxed);
        let dropped = self.samples_dropped.load(Ordering::Relaxed);
        let anomalies = self.anomalies_flagged.load(Ordering::Relaxed);
        let alerts = self.alerts_published.load(Ordering::Relaxed);
        let stats = self.get_processing_stats();

        info!(
            processed = processed,
            dropped = dropped,
            anomalies = anomalies,
            alerts = alerts,
            throughput = format!("{:.1}/s", self.get_throughput()),
            mean_us = stats.mean_us,
            p95_us = stats.p95_us,
            p99_us = stats.p99_us,
            "Engine metrics summary"
        );

        let dist = self.get_score_distribution();
        let total: u64 = dist.iter().sum();
        if total > 0 {
            for (i, &count) in dist.iter().enumerate() {
                if count == 0 {
                    continue;
                }
                info!(
                    "risk {:.1}-{:.1}: {} ({:.1}%)",
                    i as f64 / 10.0,
                    (i + 1) as f64 / 10.0,
                    count,
                    count as f64 / total as f64 * 100.0
                );
            }
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
}

/// Periodically logs the metrics summary.
pub struct MetricsReporter {
    metrics: Arc<EngineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<EngineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = EngineMetrics::new();

        metrics.record_sample(Duration::from_micros(120), 0.2, false);
        metrics.record_sample(Duration::from_micros(250), 0.95, true);
        metrics.record_dropped();
        metrics.record_alert();

        assert_eq!(metrics.samples_processed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.samples_dropped.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.anomalies_flagged.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.alerts_published.load(Ordering::Relaxed), 1);

        let dist = metrics.get_score_distribution();
        assert_eq!(dist[2], 1);
        assert_eq!(dist[9], 1);
    }

    #[test]
    fn test_processing_stats() {
        let metrics = EngineMetrics::new();
        for us in [100, 200, 300, 400] {
            metrics.record_sample(Duration::from_micros(us), 0.1, false);
        }

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
    }
}
