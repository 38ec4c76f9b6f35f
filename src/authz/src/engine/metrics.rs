//! Prometheus metrics collection for the hats controller

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Lifecycle operations tracked by the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateTopHat,
    CreateHat,
    Mint,
    Transfer,
    Renounce,
    SetWearerStatus,
    SetHatStatus,
    /// Eligibility refresh from a live query
    SyncEligibility,
    /// Active-status refresh from a live query
    SyncStatus,
    /// Any admin-side property change
    ChangeHat,
}

/// Controller metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct HatsMetrics {
    pub hats_created: u64,
    pub top_hats_created: u64,
    pub mints: u64,
    pub transfers: u64,
    pub renounces: u64,
    pub wearer_status_updates: u64,
    pub hat_status_updates: u64,
    pub eligibility_syncs: u64,
    pub status_syncs: u64,
    pub hat_changes: u64,

    /// Operations rejected with an error
    pub failed_operations: u64,

    /// Live authority queries issued
    pub authority_queries: u64,

    /// Live authority queries that failed or timed out
    pub authority_failures: u64,

    /// Authority query latency (p50, p90, p99)
    pub authority_latency_p50_ms: f64,
    pub authority_latency_p90_ms: f64,
    pub authority_latency_p99_ms: f64,

    pub avg_authority_latency_ms: f64,
}

impl HatsMetrics {
    /// Successful transitions across every operation
    pub fn total_operations(&self) -> u64 {
        self.hats_created
            + self.top_hats_created
            + self.mints
            + self.transfers
            + self.renounces
            + self.wearer_status_updates
            + self.hat_status_updates
            + self.eligibility_syncs
            + self.status_syncs
            + self.hat_changes
    }

    /// Fraction of authority queries that failed
    pub fn authority_failure_rate(&self) -> f64 {
        if self.authority_queries == 0 {
            0.0
        } else {
            self.authority_failures as f64 / self.authority_queries as f64
        }
    }
}

/// Metrics collector with Prometheus-compatible storage
pub struct MetricsCollector {
    metrics: Arc<RwLock<HatsMetrics>>,

    /// Authority latency samples (ring buffer)
    latency_samples: Arc<RwLock<Vec<f64>>>,

    max_samples: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(HatsMetrics::default())),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(10_000))),
            max_samples: 10_000,
        }
    }

    /// Record a successful operation
    pub async fn record_operation(&self, operation: Operation) {
        let mut metrics = self.metrics.write().await;
        let counter = match operation {
            Operation::CreateTopHat => &mut metrics.top_hats_created,
            Operation::CreateHat => &mut metrics.hats_created,
            Operation::Mint => &mut metrics.mints,
            Operation::Transfer => &mut metrics.transfers,
            Operation::Renounce => &mut metrics.renounces,
            Operation::SetWearerStatus => &mut metrics.wearer_status_updates,
            Operation::SetHatStatus => &mut metrics.hat_status_updates,
            Operation::SyncEligibility => &mut metrics.eligibility_syncs,
            Operation::SyncStatus => &mut metrics.status_syncs,
            Operation::ChangeHat => &mut metrics.hat_changes,
        };
        *counter += 1;
    }

    /// Record a rejected operation
    pub async fn record_failure(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.failed_operations += 1;
    }

    /// Record one live authority query
    pub async fn record_authority_query(&self, latency: Duration, succeeded: bool) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.write().await;
        samples.push(latency_ms);

        if samples.len() > self.max_samples {
            samples.drain(0..1_000);
        }

        let mut metrics = self.metrics.write().await;
        metrics.authority_queries += 1;
        if !succeeded {
            metrics.authority_failures += 1;
        }

        let sum: f64 = samples.iter().sum();
        metrics.avg_authority_latency_ms = sum / samples.len() as f64;

        let mut sorted = samples.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        metrics.authority_latency_p50_ms = Self::percentile(&sorted, 0.50);
        metrics.authority_latency_p90_ms = Self::percentile(&sorted, 0.90);
        metrics.authority_latency_p99_ms = Self::percentile(&sorted, 0.99);
    }

    /// Get current metrics snapshot
    pub async fn get_metrics(&self) -> HatsMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn reset(&self) {
        let mut metrics = self.metrics.write().await;
        *metrics = HatsMetrics::default();

        let mut samples = self.latency_samples.write().await;
        samples.clear();
    }

    /// Export metrics in Prometheus format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read().await;

        format!(
            r#"# HELP hats_operations_total Successful lifecycle operations
# TYPE hats_operations_total counter
hats_operations_total{{operation="create_top_hat"}} {}
hats_operations_total{{operation="create_hat"}} {}
hats_operations_total{{operation="mint"}} {}
hats_operations_total{{operation="transfer"}} {}
hats_operations_total{{operation="renounce"}} {}
hats_operations_total{{operation="set_wearer_status"}} {}
hats_operations_total{{operation="set_hat_status"}} {}
hats_operations_total{{operation="sync_eligibility"}} {}
hats_operations_total{{operation="sync_status"}} {}
hats_operations_total{{operation="change_hat"}} {}

# HELP hats_failed_operations_total Operations rejected with an error
# TYPE hats_failed_operations_total counter
hats_failed_operations_total {}

# HELP hats_authority_queries_total Live authority queries
# TYPE hats_authority_queries_total counter
hats_authority_queries_total {}

# HELP hats_authority_failures_total Failed live authority queries
# TYPE hats_authority_failures_total counter
hats_authority_failures_total {}

# HELP hats_authority_latency_seconds Authority query latency percentiles
# TYPE hats_authority_latency_seconds summary
hats_authority_latency_seconds{{quantile="0.5"}} {}
hats_authority_latency_seconds{{quantile="0.9"}} {}
hats_authority_latency_seconds{{quantile="0.99"}} {}
"#,
            metrics.top_hats_created,
            metrics.hats_created,
            metrics.mints,
            metrics.transfers,
            metrics.renounces,
            metrics.wearer_status_updates,
            metrics.hat_status_updates,
            metrics.eligibility_syncs,
            metrics.status_syncs,
            metrics.hat_changes,
            metrics.failed_operations,
            metrics.authority_queries,
            metrics.authority_failures,
            metrics.authority_latency_p50_ms / 1000.0,
            metrics.authority_latency_p90_ms / 1000.0,
            metrics.authority_latency_p99_ms / 1000.0,
        )
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        let idx = idx.min(sorted.len() - 1);
        sorted[idx]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
