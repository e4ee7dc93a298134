//! mkspool.toml configuration.
//!
//! Every section is optional and falls back to its defaults. Credentials and
//! cluster identity can be overridden from the environment.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use mkspool_client::{ClusterRef, Credentials, RetryConfig};
use mkspool_core::{NodeClass, NodeClassSpec};
use mkspool_pricing::{DEFAULT_CATALOG_URL, PricingConfig};
use mkspool_provider::ProviderSettings;

pub const ENV_ENDPOINT: &str = "OVH_ENDPOINT";
pub const ENV_APPLICATION_KEY: &str = "OVH_APPLICATION_KEY";
pub const ENV_APPLICATION_SECRET: &str = "OVH_APPLICATION_SECRET";
pub const ENV_CONSUMER_KEY: &str = "OVH_CONSUMER_KEY";
pub const ENV_SERVICE_NAME: &str = "OVH_SERVICE_NAME";
pub const ENV_KUBE_ID: &str = "OVH_KUBE_ID";
pub const ENV_REGION: &str = "OVH_REGION";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub cluster: ClusterConfig,
    pub pricing: PricingSection,
    pub retry: RetrySection,
    pub provisioning: ProvisioningSection,
    pub node_classes: Vec<NodeClassConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// `ovh-eu`, `ovh-ca`, `ovh-us` or a full base URL.
    pub endpoint: String,
    pub application_key: String,
    pub application_secret: String,
    pub consumer_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "ovh-eu".to_string(),
            application_key: String::new(),
            application_secret: String::new(),
            consumer_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub service_name: String,
    pub kube_id: String,
    /// Detected from the cluster metadata when absent.
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSection {
    pub catalog_url: String,
    pub subsidiary: String,
    pub ttl_secs: u64,
    pub refresh_on_start: bool,
}

impl Default for PricingSection {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            subsidiary: "FR".to_string(),
            ttl_secs: 6 * 60 * 60,
            refresh_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningSection {
    pub default_desired_nodes: u32,
    pub poll_interval_secs: u64,
    pub node_timeout_secs: u64,
    /// How often the daemon rebuilds the instance catalog.
    pub catalog_refresh_secs: u64,
}

impl Default for ProvisioningSection {
    fn default() -> Self {
        Self {
            default_desired_nodes: 1,
            poll_interval_secs: 10,
            node_timeout_secs: 600,
            catalog_refresh_secs: 60 * 60,
        }
    }
}

/// Pool settings per node class; cluster identity comes from `[cluster]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeClassConfig {
    pub name: String,
    pub monthly_billed: bool,
    pub anti_affinity: bool,
    pub tags: BTreeMap<String, String>,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// File (or defaults), then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override credentials and cluster identity from `lookup`. Empty
    /// values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_ENDPOINT) {
            self.api.endpoint = v;
        }
        if let Some(v) = get(ENV_APPLICATION_KEY) {
            self.api.application_key = v;
        }
        if let Some(v) = get(ENV_APPLICATION_SECRET) {
            self.api.application_secret = v;
        }
        if let Some(v) = get(ENV_CONSUMER_KEY) {
            self.api.consumer_key = v;
        }
        if let Some(v) = get(ENV_SERVICE_NAME) {
            self.cluster.service_name = v;
        }
        if let Some(v) = get(ENV_KUBE_ID) {
            self.cluster.kube_id = v;
        }
        if let Some(v) = get(ENV_REGION) {
            self.cluster.region = Some(v);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let missing: Vec<&str> = [
            (ENV_APPLICATION_KEY, &self.api.application_key),
            (ENV_APPLICATION_SECRET, &self.api.application_secret),
            (ENV_CONSUMER_KEY, &self.api.consumer_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(key, _)| key)
        .collect();
        if !missing.is_empty() {
            bail!("missing API credentials: {}", missing.join(", "));
        }

        if self.cluster.service_name.is_empty() {
            bail!("cluster.service_name is required");
        }
        if self.cluster.kube_id.is_empty() {
            bail!("cluster.kube_id is required");
        }
        if self.provisioning.poll_interval_secs == 0 {
            bail!("provisioning.poll_interval_secs must be positive");
        }
        if self.provisioning.node_timeout_secs == 0 {
            bail!("provisioning.node_timeout_secs must be positive");
        }
        if self.provisioning.catalog_refresh_secs == 0 {
            bail!("provisioning.catalog_refresh_secs must be positive");
        }
        if self.pricing.ttl_secs == 0 {
            bail!("pricing.ttl_secs must be positive");
        }
        if self.retry.backoff_factor < 1.0 {
            bail!("retry.backoff_factor must be at least 1.0");
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            bail!("retry.initial_backoff_ms exceeds retry.max_backoff_ms");
        }

        let mut seen = HashSet::new();
        for class in &self.node_classes {
            if class.name.is_empty() {
                bail!("node class without a name");
            }
            if !seen.insert(class.name.as_str()) {
                bail!("duplicate node class {:?}", class.name);
            }
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            application_key: self.api.application_key.clone(),
            application_secret: self.api.application_secret.clone(),
            consumer_key: self.api.consumer_key.clone(),
        }
    }

    pub fn cluster_ref(&self) -> ClusterRef {
        ClusterRef {
            service_name: self.cluster.service_name.clone(),
            kube_id: self.cluster.kube_id.clone(),
            region: self.cluster.region.clone().filter(|r| !r.is_empty()),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry.max_retries,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            backoff_factor: self.retry.backoff_factor,
        }
    }

    pub fn pricing_config(&self) -> PricingConfig {
        PricingConfig {
            ttl: Duration::from_secs(self.pricing.ttl_secs),
            ..Default::default()
        }
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            default_desired_nodes: self.provisioning.default_desired_nodes,
            poll_interval: Duration::from_secs(self.provisioning.poll_interval_secs),
            node_timeout: Duration::from_secs(self.provisioning.node_timeout_secs),
        }
    }

    /// Configured node classes bound to this cluster, or a single `default`
    /// class when none are configured.
    pub fn node_classes(&self, region: &str) -> Vec<NodeClass> {
        let defaults = [NodeClassConfig {
            name: "default".to_string(),
            ..Default::default()
        }];
        let configured = if self.node_classes.is_empty() {
            &defaults[..]
        } else {
            &self.node_classes[..]
        };

        configured
            .iter()
            .map(|c| NodeClass {
                name: c.name.clone(),
                spec: NodeClassSpec {
                    service_name: self.cluster.service_name.clone(),
                    kube_id: self.cluster.kube_id.clone(),
                    region: region.to_string(),
                    monthly_billed: c.monthly_billed,
                    anti_affinity: c.anti_affinity,
                    tags: c.tags.clone(),
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect()
    }
}
