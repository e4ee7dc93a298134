//! Component wiring: client → pricing → orchestrator.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mkspool_client::{OvhTransport, PoolApi, PoolClient, RetryExecutor};
use mkspool_metrics::ProviderMetrics;
use mkspool_pricing::{HttpCatalogSource, PricingCache};
use mkspool_provider::{CloudProvider, StaticNodeClasses};

use crate::config::Config;

/// Every long-lived component of the daemon.
pub struct App {
    pub api: Arc<dyn PoolApi>,
    pub pricing: Arc<PricingCache>,
    pub metrics: Arc<ProviderMetrics>,
    pub provider: Arc<CloudProvider>,
    pub region: String,
}

impl App {
    /// Build the components from `config`. Resolves the cluster region and
    /// optionally warms the pricing cache; does not build the instance
    /// catalog.
    pub async fn build(config: &Config, cancel: &CancellationToken) -> anyhow::Result<Self> {
        let metrics = Arc::new(ProviderMetrics::new());

        let transport = OvhTransport::new(&config.api.endpoint, config.credentials())
            .context("building API transport")?;
        info!(endpoint = %transport.base_url(), "API transport ready");

        let retry = RetryExecutor::new(config.retry_config(), metrics.clone());
        let client = PoolClient::new(
            Arc::new(transport),
            config.cluster_ref(),
            retry,
            metrics.clone(),
        )
        .context("building pool client")?;
        let api: Arc<dyn PoolApi> = Arc::new(client);

        let region = api
            .region(cancel)
            .await
            .context("resolving cluster region")?;
        info!(
            %region,
            service_name = %config.cluster.service_name,
            kube_id = %config.cluster.kube_id,
            "cluster identified"
        );

        let node_classes =
            Arc::new(StaticNodeClasses::from_classes(config.node_classes(&region)).await);

        let source = HttpCatalogSource::new(&config.pricing.catalog_url, &config.pricing.subsidiary)
            .context("building pricing catalog source")?;
        let pricing = Arc::new(PricingCache::new(
            Arc::new(source),
            config.pricing_config(),
            metrics.clone(),
        ));
        if config.pricing.refresh_on_start {
            match pricing.force_refresh(cancel).await {
                Ok(()) => {
                    let currency = pricing.currency().await.unwrap_or_default();
                    info!(version = pricing.version().await, %currency, "pricing catalog loaded");
                }
                Err(e) => {
                    warn!(error = %e, "initial pricing refresh failed, prices will be estimated")
                }
            }
        }

        let provider = Arc::new(CloudProvider::new(
            api.clone(),
            Some(pricing.clone()),
            node_classes,
            metrics.clone(),
            config.provider_settings(),
        ));

        Ok(Self {
            api,
            pricing,
            metrics,
            provider,
            region,
        })
    }
}

/// Rebuild the instance catalog every `interval` until cancelled. Failures
/// keep the previous catalog.
pub async fn run_catalog_refresh(
    provider: Arc<CloudProvider>,
    interval: Duration,
    cancel: CancellationToken,
) {
    info!(interval_secs = interval.as_secs(), "catalog refresher started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if let Err(e) = provider.refresh_instance_types(&cancel).await {
                    warn!(error = %e, "instance catalog refresh failed");
                }
            }
            _ = cancel.cancelled() => {
                info!("catalog refresher shutting down");
                break;
            }
        }
    }
}
