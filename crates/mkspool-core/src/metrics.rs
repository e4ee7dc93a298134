//! Write-only metrics sink injected into the client, pricing cache and
//! orchestrator.
//!
//! Every method defaults to a no-op so implementations only override what
//! they export.

/// Destination for provider metrics. Never read back by the orchestrator.
pub trait MetricsSink: Send + Sync {
    /// A node provisioning attempt finished with `status`.
    fn node_provisioning(&self, _flavor: &str, _zone: &str, _status: &str) {}

    fn node_provisioning_duration(&self, _flavor: &str, _zone: &str, _seconds: f64) {}

    fn node_deletion(&self, _status: &str) {}

    fn node_deletion_duration(&self, _seconds: f64) {}

    /// A pool create / scale_up / scale_down / delete finished with `status`.
    fn pool_operation(&self, _operation: &str, _status: &str) {}

    fn pools_active(&self, _count: usize) {}

    /// One remote API attempt.
    fn api_call(&self, _operation: &str, _status: &str, _seconds: f64) {}

    fn api_retry(&self, _operation: &str) {}

    fn instance_types_available(&self, _count: usize) {}

    fn pricing_cache_hit(&self) {}

    fn pricing_cache_miss(&self) {}

    fn pricing_cache_refresh(&self) {}

    fn drift_detected(&self, _reason: &str) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}
