//! mkspool-metrics — in-process metrics for the pool orchestrator.
//!
//! Implements the write-only [`MetricsSink`](mkspool_core::MetricsSink)
//! with labelled counters, gauges and fixed-bucket histograms, and renders
//! them in the Prometheus text exposition format.
//!
//! # Architecture
//!
//! ```text
//! ProviderMetrics (MetricsSink)
//!   ├── node_provisioning() / pool_operation() / api_call() ... ← client, pricing, orchestrator
//!   └── snapshot() → MetricsSnapshot
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod collector;
pub mod prometheus;

pub use collector::{
    FAMILIES, Family, HistogramSample, LabelSet, MetricKind, MetricsSnapshot, ProviderMetrics,
};
pub use prometheus::render_prometheus;
