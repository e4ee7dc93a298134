//! Catalog document sources.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::catalog::PricingCatalog;
use crate::error::{PricingError, PricingResult};

pub const DEFAULT_CATALOG_URL: &str = "https://api.ovh.com/1.0/order/catalog/public/cloud";
pub const DEFAULT_SUBSIDIARY: &str = "FR";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches the full pricing catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self, cancel: &CancellationToken) -> PricingResult<PricingCatalog>;
}

/// Unauthenticated GET against the public catalog endpoint.
pub struct HttpCatalogSource {
    http: reqwest::Client,
    url: String,
}

impl HttpCatalogSource {
    /// `subsidiary` selects locale and currency; empty means `FR`.
    pub fn new(base_url: &str, subsidiary: &str) -> PricingResult<Self> {
        let subsidiary = if subsidiary.is_empty() {
            DEFAULT_SUBSIDIARY
        } else {
            subsidiary
        };
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| PricingError::Fetch(e.to_string()))?;
        Ok(Self {
            http,
            url: format!("{base_url}?ovhSubsidiary={subsidiary}"),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self, cancel: &CancellationToken) -> PricingResult<PricingCatalog> {
        debug!(url = %self.url, "fetching pricing catalog");
        let request = async {
            let response = self
                .http
                .get(&self.url)
                .send()
                .await
                .map_err(|e| PricingError::Fetch(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(PricingError::Status(status.as_u16()));
            }
            let body = response
                .bytes()
                .await
                .map_err(|e| PricingError::Fetch(e.to_string()))?;
            serde_json::from_slice(&body).map_err(|e| PricingError::Decode(e.to_string()))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PricingError::Cancelled),
            result = request => result,
        }
    }
}

/// Serves a fixed catalog, or a fixed failure.
pub struct StaticCatalogSource {
    catalog: Option<PricingCatalog>,
}

impl StaticCatalogSource {
    pub fn new(catalog: PricingCatalog) -> Self {
        Self {
            catalog: Some(catalog),
        }
    }

    /// A source whose every fetch fails.
    pub fn unavailable() -> Self {
        Self { catalog: None }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch(&self, _cancel: &CancellationToken) -> PricingResult<PricingCatalog> {
        self.catalog
            .clone()
            .ok_or_else(|| PricingError::Fetch("catalog source unavailable".into()))
    }
}
