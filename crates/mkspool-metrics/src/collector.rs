//! Metrics collector: labelled series behind the provider's metrics sink.
//!
//! Gauges are atomics. Counters and histograms live in mutex-protected maps
//! keyed by family and label set, so series appear on first use.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use mkspool_core::MetricsSink;

/// Prefix shared by every exported family.
pub const NAMESPACE: &str = "karpenter_ovhcloud";

pub const NODE_PROVISIONING_TOTAL: &str = "node_provisioning_total";
pub const NODE_PROVISIONING_DURATION: &str = "node_provisioning_duration_seconds";
pub const NODE_DELETION_TOTAL: &str = "node_deletion_total";
pub const NODE_DELETION_DURATION: &str = "node_deletion_duration_seconds";
pub const POOL_OPERATIONS_TOTAL: &str = "pool_operations_total";
pub const POOLS_ACTIVE: &str = "pools_active";
pub const API_CALLS_TOTAL: &str = "api_calls_total";
pub const API_CALL_DURATION: &str = "api_call_duration_seconds";
pub const API_RETRIES_TOTAL: &str = "api_retries_total";
pub const INSTANCE_TYPES_AVAILABLE: &str = "instance_types_available";
pub const PRICING_CACHE_HITS: &str = "pricing_cache_hits_total";
pub const PRICING_CACHE_MISSES: &str = "pricing_cache_misses_total";
pub const PRICING_CACHE_REFRESHES: &str = "pricing_cache_refreshes_total";
pub const DRIFT_DETECTION_TOTAL: &str = "drift_detection_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// One exported metric family.
#[derive(Debug, Clone, Copy)]
pub struct Family {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
}

/// Every family, in exposition order.
pub const FAMILIES: &[Family] = &[
    Family {
        name: NODE_PROVISIONING_TOTAL,
        help: "Total number of node provisioning attempts",
        kind: MetricKind::Counter,
    },
    Family {
        name: NODE_PROVISIONING_DURATION,
        help: "Time taken to provision a node, including bootstrap",
        kind: MetricKind::Histogram,
    },
    Family {
        name: NODE_DELETION_TOTAL,
        help: "Total number of node deletion attempts",
        kind: MetricKind::Counter,
    },
    Family {
        name: NODE_DELETION_DURATION,
        help: "Time taken to delete a node",
        kind: MetricKind::Histogram,
    },
    Family {
        name: POOL_OPERATIONS_TOTAL,
        help: "Total number of pool operations",
        kind: MetricKind::Counter,
    },
    Family {
        name: POOLS_ACTIVE,
        help: "Number of active managed pools",
        kind: MetricKind::Gauge,
    },
    Family {
        name: API_CALLS_TOTAL,
        help: "Total number of remote API calls",
        kind: MetricKind::Counter,
    },
    Family {
        name: API_CALL_DURATION,
        help: "Duration of remote API calls",
        kind: MetricKind::Histogram,
    },
    Family {
        name: API_RETRIES_TOTAL,
        help: "Total number of API call retries",
        kind: MetricKind::Counter,
    },
    Family {
        name: INSTANCE_TYPES_AVAILABLE,
        help: "Number of available instance types",
        kind: MetricKind::Gauge,
    },
    Family {
        name: PRICING_CACHE_HITS,
        help: "Total number of pricing cache hits",
        kind: MetricKind::Counter,
    },
    Family {
        name: PRICING_CACHE_MISSES,
        help: "Total number of pricing cache misses",
        kind: MetricKind::Counter,
    },
    Family {
        name: PRICING_CACHE_REFRESHES,
        help: "Total number of pricing cache refreshes",
        kind: MetricKind::Counter,
    },
    Family {
        name: DRIFT_DETECTION_TOTAL,
        help: "Total number of drift detections",
        kind: MetricKind::Counter,
    },
];

/// Ordered label pairs of one series.
pub type LabelSet = Vec<(&'static str, String)>;

type SeriesKey = (&'static str, LabelSet);

/// `count` upper bounds starting at `start`, each `factor` times the last.
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start * factor.powi(i as i32)).collect()
}

fn bounds_for(family: &str) -> Vec<f64> {
    match family {
        NODE_PROVISIONING_DURATION => exponential_buckets(10.0, 2.0, 8),
        NODE_DELETION_DURATION => exponential_buckets(1.0, 2.0, 8),
        _ => exponential_buckets(0.1, 2.0, 8),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Histogram {
    bounds: Vec<f64>,
    /// Non-cumulative count per bound.
    counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl Histogram {
    fn new(bounds: Vec<f64>) -> Self {
        let counts = vec![0; bounds.len()];
        Self {
            bounds,
            counts,
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        if let Some(i) = self.bounds.iter().position(|b| value <= *b) {
            self.counts[i] += 1;
        }
        self.sum += value;
        self.count += 1;
    }

    fn sample(&self, labels: LabelSet) -> HistogramSample {
        let mut running = 0;
        let buckets = self
            .bounds
            .iter()
            .zip(&self.counts)
            .map(|(bound, n)| {
                running += n;
                (*bound, running)
            })
            .collect();
        HistogramSample {
            labels,
            buckets,
            sum: self.sum,
            count: self.count,
        }
    }
}

/// Point-in-time view of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSample {
    pub labels: LabelSet,
    /// `(upper bound, cumulative count)`; the implicit `+Inf` bucket is `count`.
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    pub count: u64,
}

/// Point-in-time view of every series, grouped by family name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<&'static str, Vec<(LabelSet, u64)>>,
    pub gauges: BTreeMap<&'static str, u64>,
    pub histograms: BTreeMap<&'static str, Vec<HistogramSample>>,
}

impl MetricsSnapshot {
    /// Value of one counter series, zero if it was never touched.
    pub fn counter(&self, family: &str, labels: &[(&str, &str)]) -> u64 {
        self.counters
            .get(family)
            .and_then(|series| {
                series.iter().find(|(set, _)| {
                    set.len() == labels.len()
                        && set.iter().zip(labels).all(|((k, v), (ek, ev))| k == ek && v == ev)
                })
            })
            .map_or(0, |(_, value)| *value)
    }
}

/// The provider's metrics sink.
pub struct ProviderMetrics {
    counters: Mutex<BTreeMap<SeriesKey, u64>>,
    histograms: Mutex<BTreeMap<SeriesKey, Histogram>>,
    pools_active: AtomicU64,
    instance_types_available: AtomicU64,
}

impl Default for ProviderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProviderMetrics {
    pub fn new() -> Self {
        // Unlabelled counters are exported from the start.
        let counters = [PRICING_CACHE_HITS, PRICING_CACHE_MISSES, PRICING_CACHE_REFRESHES]
            .into_iter()
            .map(|family| ((family, Vec::new()), 0))
            .collect();
        Self {
            counters: Mutex::new(counters),
            histograms: Mutex::new(BTreeMap::new()),
            pools_active: AtomicU64::new(0),
            instance_types_available: AtomicU64::new(0),
        }
    }

    fn inc(&self, family: &'static str, labels: LabelSet) {
        let mut counters = lock(&self.counters);
        let value = counters.entry((family, labels)).or_insert_with_key(|(family, labels)| {
            debug!(%family, ?labels, "new counter series");
            0
        });
        *value += 1;
    }

    fn observe(&self, family: &'static str, labels: LabelSet, value: f64) {
        lock(&self.histograms)
            .entry((family, labels))
            .or_insert_with(|| Histogram::new(bounds_for(family)))
            .observe(value);
    }

    /// Copy every series out.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();

        for ((family, labels), value) in lock(&self.counters).iter() {
            snapshot
                .counters
                .entry(*family)
                .or_default()
                .push((labels.clone(), *value));
        }
        for ((family, labels), histogram) in lock(&self.histograms).iter() {
            snapshot
                .histograms
                .entry(*family)
                .or_default()
                .push(histogram.sample(labels.clone()));
        }
        snapshot
            .gauges
            .insert(POOLS_ACTIVE, self.pools_active.load(Ordering::Relaxed));
        snapshot.gauges.insert(
            INSTANCE_TYPES_AVAILABLE,
            self.instance_types_available.load(Ordering::Relaxed),
        );

        snapshot
    }
}

fn labels<const N: usize>(pairs: [(&'static str, &str); N]) -> LabelSet {
    pairs.into_iter().map(|(k, v)| (k, v.to_string())).collect()
}

impl MetricsSink for ProviderMetrics {
    fn node_provisioning(&self, flavor: &str, zone: &str, status: &str) {
        self.inc(
            NODE_PROVISIONING_TOTAL,
            labels([("flavor", flavor), ("zone", zone), ("status", status)]),
        );
    }

    fn node_provisioning_duration(&self, flavor: &str, zone: &str, seconds: f64) {
        self.observe(
            NODE_PROVISIONING_DURATION,
            labels([("flavor", flavor), ("zone", zone)]),
            seconds,
        );
    }

    fn node_deletion(&self, status: &str) {
        self.inc(NODE_DELETION_TOTAL, labels([("status", status)]));
    }

    fn node_deletion_duration(&self, seconds: f64) {
        self.observe(NODE_DELETION_DURATION, Vec::new(), seconds);
    }

    fn pool_operation(&self, operation: &str, status: &str) {
        self.inc(
            POOL_OPERATIONS_TOTAL,
            labels([("operation", operation), ("status", status)]),
        );
    }

    fn pools_active(&self, count: usize) {
        self.pools_active.store(count as u64, Ordering::Relaxed);
    }

    fn api_call(&self, operation: &str, status: &str, seconds: f64) {
        self.inc(
            API_CALLS_TOTAL,
            labels([("operation", operation), ("status", status)]),
        );
        self.observe(API_CALL_DURATION, labels([("operation", operation)]), seconds);
    }

    fn api_retry(&self, operation: &str) {
        self.inc(API_RETRIES_TOTAL, labels([("operation", operation)]));
    }

    fn instance_types_available(&self, count: usize) {
        self.instance_types_available
            .store(count as u64, Ordering::Relaxed);
    }

    fn pricing_cache_hit(&self) {
        self.inc(PRICING_CACHE_HITS, Vec::new());
    }

    fn pricing_cache_miss(&self) {
        self.inc(PRICING_CACHE_MISSES, Vec::new());
    }

    fn pricing_cache_refresh(&self) {
        self.inc(PRICING_CACHE_REFRESHES, Vec::new());
    }

    fn drift_detected(&self, reason: &str) {
        self.inc(DRIFT_DETECTION_TOTAL, labels([("reason", reason)]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_layouts() {
        assert_eq!(
            bounds_for(NODE_PROVISIONING_DURATION),
            vec![10.0, 20.0, 40.0, 80.0, 160.0, 320.0, 640.0, 1280.0]
        );
        assert_eq!(bounds_for(NODE_DELETION_DURATION)[7], 128.0);
        let api = bounds_for(API_CALL_DURATION);
        assert_eq!(api.len(), 8);
        assert!((api[7] - 12.8).abs() < 1e-9);
    }

    #[test]
    fn counters_are_per_label_set() {
        let metrics = ProviderMetrics::new();
        metrics.node_provisioning("b3-8", "gra7-a", "success");
        metrics.node_provisioning("b3-8", "gra7-a", "success");
        metrics.node_provisioning("b3-8", "gra7-b", "timeout");

        let snap = metrics.snapshot();
        assert_eq!(
            snap.counter(
                NODE_PROVISIONING_TOTAL,
                &[("flavor", "b3-8"), ("zone", "gra7-a"), ("status", "success")]
            ),
            2
        );
        assert_eq!(
            snap.counter(
                NODE_PROVISIONING_TOTAL,
                &[("flavor", "b3-8"), ("zone", "gra7-b"), ("status", "timeout")]
            ),
            1
        );
        assert_eq!(snap.counters[NODE_PROVISIONING_TOTAL].len(), 2);
    }

    #[test]
    fn unlabelled_counters_start_at_zero() {
        let metrics = ProviderMetrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.counter(PRICING_CACHE_HITS, &[]), 0);
        assert!(snap.counters.contains_key(PRICING_CACHE_REFRESHES));

        metrics.pricing_cache_hit();
        metrics.pricing_cache_miss();
        metrics.pricing_cache_hit();
        let snap = metrics.snapshot();
        assert_eq!(snap.counter(PRICING_CACHE_HITS, &[]), 2);
        assert_eq!(snap.counter(PRICING_CACHE_MISSES, &[]), 1);
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let metrics = ProviderMetrics::new();
        metrics.node_deletion_duration(0.5);
        metrics.node_deletion_duration(3.0);
        metrics.node_deletion_duration(500.0);

        let snap = metrics.snapshot();
        let sample = &snap.histograms[NODE_DELETION_DURATION][0];
        assert_eq!(sample.count, 3);
        assert_eq!(sample.sum, 503.5);
        assert_eq!(sample.buckets[0], (1.0, 1));
        assert_eq!(sample.buckets[1], (2.0, 1));
        assert_eq!(sample.buckets[2], (4.0, 2));
        assert_eq!(sample.buckets[7], (128.0, 2));
    }

    #[test]
    fn gauges_hold_last_value() {
        let metrics = ProviderMetrics::new();
        metrics.pools_active(4);
        metrics.pools_active(2);
        metrics.instance_types_available(37);

        let snap = metrics.snapshot();
        assert_eq!(snap.gauges[POOLS_ACTIVE], 2);
        assert_eq!(snap.gauges[INSTANCE_TYPES_AVAILABLE], 37);
    }

    #[test]
    fn api_call_feeds_counter_and_histogram() {
        let metrics = ProviderMetrics::new();
        metrics.api_call("ListNodePools", "success", 0.15);
        metrics.api_retry("ListNodePools");

        let snap = metrics.snapshot();
        assert_eq!(
            snap.counter(
                API_CALLS_TOTAL,
                &[("operation", "ListNodePools"), ("status", "success")]
            ),
            1
        );
        assert_eq!(
            snap.counter(API_RETRIES_TOTAL, &[("operation", "ListNodePools")]),
            1
        );
        assert_eq!(snap.histograms[API_CALL_DURATION][0].buckets[1], (0.2, 1));
    }
}
