//! Provider call metrics
//!
//! Keeps a rolling latency window and lifetime outcome counters for the calls the
//! client makes to its provider.

use crate::error::FetchFailure;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for latency percentiles
const MAX_SAMPLES: usize = 100;

/// Snapshot of provider call metrics
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderMetrics {
    /// Name of the provider
    pub provider_name: String,
    /// 50th percentile latency of successful calls in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful calls in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    pub total_requests: u64,
    pub failed_requests: u64,
    /// Failures that were HTTP 429
    pub rate_limited_requests: u64,
}

impl ProviderMetrics {
    /// Creates metrics with no data
    pub fn empty(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_requests: 0,
            failed_requests: 0,
            rate_limited_requests: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    samples: VecDeque<f64>,
    total: u64,
    failed: u64,
    rate_limited: u64,
}

/// Collects metrics for one provider
#[derive(Debug)]
pub struct MetricsCollector {
    provider_name: String,
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    pub fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            counters: RwLock::new(Counters::default()),
        }
    }

    /// Records a successful call and its latency
    pub async fn record_success(&self, duration: Duration) {
        let mut counters = self.counters.write().await;
        counters.total += 1;
        if counters.samples.len() >= MAX_SAMPLES {
            counters.samples.pop_front();
        }
        counters.samples.push_back(duration.as_secs_f64() * 1000.0);
    }

    /// Records a failed call
    pub async fn record_failure(&self, failure: FetchFailure) {
        let mut counters = self.counters.write().await;
        counters.total += 1;
        counters.failed += 1;
        if failure == FetchFailure::RateLimited {
            counters.rate_limited += 1;
        }
    }

    /// Computes current metrics
    pub async fn get_metrics(&self) -> ProviderMetrics {
        let counters = self.counters.read().await;
        if counters.total == 0 {
            return ProviderMetrics::empty(&self.provider_name);
        }

        let mut latencies: Vec<f64> = counters.samples.iter().copied().collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        ProviderMetrics {
            provider_name: self.provider_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate: (counters.total - counters.failed) as f64 / counters.total as f64,
            total_requests: counters.total,
            failed_requests: counters.failed,
            rate_limited_requests: counters.rate_limited,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
