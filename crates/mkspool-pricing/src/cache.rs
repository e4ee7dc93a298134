//! TTL-refreshed hourly price cache.
//!
//! The cache holds one versioned snapshot of the catalog plus the derived
//! key → price map behind a read/write lock. Lookups refresh a missing or
//! expired snapshot first; the refresh takes the write lock and re-checks
//! staleness once it holds it, so concurrent callers collapse into a single
//! fetch. Lookups never fail: any miss or refresh failure yields an
//! estimate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mkspool_core::MetricsSink;

use crate::catalog::{PricingCatalog, extract_prices};
use crate::error::{PricingError, PricingResult};
use crate::estimate::{FlavorShape, estimate_price};
use crate::source::{CatalogSource, StaticCatalogSource};

/// Cache timing.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    /// Snapshot lifetime (default: 6 hours).
    pub ttl: Duration,
    /// Minimum delay between a failed refresh and the next implicit one
    /// (default: 5 minutes).
    pub failure_cooldown: Duration,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(6 * 60 * 60),
            failure_cooldown: Duration::from_secs(5 * 60),
        }
    }
}

struct Snapshot {
    version: u64,
    fetched_at: Instant,
    catalog: PricingCatalog,
    prices: HashMap<String, f64>,
}

#[derive(Default)]
struct State {
    snapshot: Option<Snapshot>,
    last_failure: Option<Instant>,
    next_version: u64,
}

impl State {
    fn install(&mut self, catalog: PricingCatalog, prices: HashMap<String, f64>) -> u64 {
        self.next_version += 1;
        self.snapshot = Some(Snapshot {
            version: self.next_version,
            fetched_at: Instant::now(),
            catalog,
            prices,
        });
        self.last_failure = None;
        self.next_version
    }
}

/// Lookup order: exact flavor, `{region}.{flavor}`,
/// `instance-{flavor}.{region}.hour.consumption`,
/// `instance-{flavor}.hour.consumption`. Region is lower-cased.
pub fn lookup(prices: &HashMap<String, f64>, flavor: &str, region: &str) -> Option<f64> {
    let region = region.to_lowercase();
    let candidates = [
        flavor.to_string(),
        format!("{region}.{flavor}"),
        format!("instance-{flavor}.{region}.hour.consumption"),
        format!("instance-{flavor}.hour.consumption"),
    ];
    candidates.iter().find_map(|key| prices.get(key).copied())
}

pub struct PricingCache {
    source: Arc<dyn CatalogSource>,
    config: PricingConfig,
    state: RwLock<State>,
    metrics: Arc<dyn MetricsSink>,
}

impl PricingCache {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        config: PricingConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            source,
            config,
            state: RwLock::new(State::default()),
            metrics,
        }
    }

    /// A cache pre-loaded with `prices` whose source is never reachable.
    /// Once the TTL passes, lookups fall back to estimates.
    pub fn with_prices(
        prices: HashMap<String, f64>,
        config: PricingConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let mut state = State::default();
        state.install(PricingCatalog::default(), prices);
        Self {
            source: Arc::new(StaticCatalogSource::unavailable()),
            config,
            state: RwLock::new(state),
            metrics,
        }
    }

    /// Hourly price for `flavor` in `region`.
    pub async fn get_price(&self, cancel: &CancellationToken, flavor: &str, region: &str) -> f64 {
        self.price_for(cancel, flavor, region, None).await
    }

    /// Hourly price, with the flavor's shape available for estimation.
    pub async fn price_for(
        &self,
        cancel: &CancellationToken,
        flavor: &str,
        region: &str,
        shape: Option<&FlavorShape>,
    ) -> f64 {
        if let Err(e) = self.ensure_fresh(cancel).await {
            debug!(%flavor, error = %e, "pricing unavailable, using estimate");
            self.metrics.pricing_cache_miss();
            return estimate_price(flavor, shape);
        }

        let found = {
            let state = self.state.read().await;
            state
                .snapshot
                .as_ref()
                .and_then(|s| lookup(&s.prices, flavor, region))
        };

        match found {
            Some(price) => {
                self.metrics.pricing_cache_hit();
                price
            }
            None => {
                debug!(%flavor, %region, "flavor not in pricing catalog, using estimate");
                self.metrics.pricing_cache_miss();
                estimate_price(flavor, shape)
            }
        }
    }

    /// Refetch regardless of age or a recent failure. On failure the
    /// previous snapshot is kept.
    pub async fn force_refresh(&self, cancel: &CancellationToken) -> PricingResult<()> {
        self.refresh(cancel, true).await
    }

    /// Copy of the derived key → price map.
    pub async fn cached_prices(&self) -> HashMap<String, f64> {
        let state = self.state.read().await;
        state
            .snapshot
            .as_ref()
            .map(|s| s.prices.clone())
            .unwrap_or_default()
    }

    /// Version of the current snapshot; zero before the first refresh.
    pub async fn version(&self) -> u64 {
        let state = self.state.read().await;
        state.snapshot.as_ref().map_or(0, |s| s.version)
    }

    /// Currency of the current snapshot, when the catalog reports one.
    pub async fn currency(&self) -> Option<String> {
        let state = self.state.read().await;
        state
            .snapshot
            .as_ref()
            .map(|s| s.catalog.locale.currency_code.clone())
            .filter(|c| !c.is_empty())
    }

    /// Refresh every TTL until `cancel` fires.
    pub fn spawn_refresher(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let interval = self.config.ttl;
            info!(interval_secs = interval.as_secs(), "pricing refresher started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("pricing refresher shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = self.force_refresh(&cancel).await {
                            warn!(error = %e, "scheduled pricing refresh failed");
                        }
                    }
                }
            }
        })
    }

    fn is_stale(&self, state: &State) -> bool {
        state
            .snapshot
            .as_ref()
            .is_none_or(|s| s.fetched_at.elapsed() > self.config.ttl)
    }

    async fn ensure_fresh(&self, cancel: &CancellationToken) -> PricingResult<()> {
        {
            let state = self.state.read().await;
            if !self.is_stale(&state) {
                return Ok(());
            }
        }
        self.refresh(cancel, false).await
    }

    async fn refresh(&self, cancel: &CancellationToken, force: bool) -> PricingResult<()> {
        let mut state = self.state.write().await;

        if !force {
            // Another caller may have refreshed while we waited for the lock.
            if !self.is_stale(&state) {
                return Ok(());
            }
            if state
                .last_failure
                .is_some_and(|at| at.elapsed() < self.config.failure_cooldown)
            {
                return Err(PricingError::CoolingDown);
            }
        }

        match self.source.fetch(cancel).await {
            Ok(catalog) => {
                let prices = extract_prices(&catalog);
                let entries = prices.len();
                let version = state.install(catalog, prices);
                self.metrics.pricing_cache_refresh();
                info!(entries, version, "pricing catalog refreshed");
                Ok(())
            }
            Err(e) => {
                state.last_failure = Some(Instant::now());
                warn!(error = %e, "pricing catalog refresh failed");
                Err(e)
            }
        }
    }
}
