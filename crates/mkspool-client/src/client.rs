//! Typed node pool operations against one managed cluster.
//!
//! Every operation builds its path from the project and cluster IDs, runs
//! through the [`RetryExecutor`] and records one `api_call` metric per
//! attempt. The cluster region is resolved at most once: from
//! configuration, or by reading the cluster on first use.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use mkspool_core::MetricsSink;

use crate::error::{ApiError, ApiResult};
use crate::retry::RetryExecutor;
use crate::transport::{Method, Transport};
use crate::types::{
    CreateNodePoolRequest, Flavor, KubeCluster, KubeFlavorCapability, Node, NodePool,
    UpdateNodePoolRequest,
};

/// Remote operations the orchestrator depends on.
#[async_trait]
pub trait PoolApi: Send + Sync {
    async fn list_node_pools(&self, cancel: &CancellationToken) -> ApiResult<Vec<NodePool>>;

    async fn get_node_pool(&self, cancel: &CancellationToken, pool_id: &str) -> ApiResult<NodePool>;

    async fn create_node_pool(
        &self,
        cancel: &CancellationToken,
        request: &CreateNodePoolRequest,
    ) -> ApiResult<NodePool>;

    async fn update_node_pool(
        &self,
        cancel: &CancellationToken,
        pool_id: &str,
        request: &UpdateNodePoolRequest,
    ) -> ApiResult<()>;

    async fn delete_node_pool(&self, cancel: &CancellationToken, pool_id: &str) -> ApiResult<()>;

    async fn list_pool_nodes(&self, cancel: &CancellationToken, pool_id: &str) -> ApiResult<Vec<Node>>;

    /// Flavors available to the cluster (RAM in MiB).
    async fn list_flavors(&self, cancel: &CancellationToken) -> ApiResult<Vec<Flavor>>;

    async fn list_kube_regions(&self, cancel: &CancellationToken) -> ApiResult<Vec<String>>;

    /// Flavors the region offers for managed clusters (RAM in GiB).
    async fn list_kube_flavors(
        &self,
        cancel: &CancellationToken,
        region: &str,
    ) -> ApiResult<Vec<KubeFlavorCapability>>;

    async fn get_cluster(&self, cancel: &CancellationToken) -> ApiResult<KubeCluster>;

    async fn delete_node(&self, cancel: &CancellationToken, node_id: &str) -> ApiResult<()>;

    /// Cluster region, detected from the cluster when not configured.
    async fn region(&self, cancel: &CancellationToken) -> ApiResult<String>;
}

/// Identity of the managed cluster a client operates on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterRef {
    pub service_name: String,
    pub kube_id: String,
    /// Left empty to auto-detect.
    pub region: Option<String>,
}

/// [`PoolApi`] over a signed [`Transport`].
pub struct PoolClient {
    transport: Arc<dyn Transport>,
    service_name: String,
    kube_id: String,
    region: OnceCell<String>,
    retry: RetryExecutor,
    metrics: Arc<dyn MetricsSink>,
}

impl PoolClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        cluster: ClusterRef,
        retry: RetryExecutor,
        metrics: Arc<dyn MetricsSink>,
    ) -> ApiResult<Self> {
        if cluster.service_name.is_empty() {
            return Err(ApiError::InvalidConfig("service name is required".into()));
        }
        if cluster.kube_id.is_empty() {
            return Err(ApiError::InvalidConfig("kube ID is required".into()));
        }
        let region = cluster
            .region
            .filter(|r| !r.is_empty())
            .map(|r| OnceCell::new_with(Some(r)))
            .unwrap_or_default();

        Ok(Self {
            transport,
            service_name: cluster.service_name,
            kube_id: cluster.kube_id,
            region,
            retry,
            metrics,
        })
    }

    fn base_path(&self) -> String {
        format!("/cloud/project/{}/kube/{}", self.service_name, self.kube_id)
    }

    fn pool_path(&self, pool_id: &str) -> String {
        format!("{}/nodepool/{}", self.base_path(), pool_id)
    }

    fn capabilities_path(&self) -> String {
        format!("/cloud/project/{}/capabilities/kube", self.service_name)
    }

    /// One attempt: transport call, metric, decode.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> ApiResult<T> {
        let bytes = self.send_raw(operation, method, path, body).await?;
        decode(&bytes)
    }

    /// One attempt whose response body is ignored.
    async fn send_unit(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> ApiResult<()> {
        self.send_raw(operation, method, path, body).await.map(|_| ())
    }

    async fn send_raw(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> ApiResult<Vec<u8>> {
        let started = Instant::now();
        let result = self.transport.call(method, path, body).await;
        let status = match &result {
            Ok(_) => "success".to_string(),
            Err(e) => e.status_label(),
        };
        self.metrics
            .api_call(operation, &status, started.elapsed().as_secs_f64());
        result
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> ApiResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| ApiError::Encode(e.to_string()))
}

#[async_trait]
impl PoolApi for PoolClient {
    async fn list_node_pools(&self, cancel: &CancellationToken) -> ApiResult<Vec<NodePool>> {
        let path = format!("{}/nodepool", self.base_path());
        self.retry
            .execute(cancel, "ListNodePools", || {
                self.send("ListNodePools", Method::Get, &path, None)
            })
            .await
    }

    async fn get_node_pool(&self, cancel: &CancellationToken, pool_id: &str) -> ApiResult<NodePool> {
        let path = self.pool_path(pool_id);
        self.retry
            .execute(cancel, "GetNodePool", || {
                self.send("GetNodePool", Method::Get, &path, None)
            })
            .await
    }

    async fn create_node_pool(
        &self,
        cancel: &CancellationToken,
        request: &CreateNodePoolRequest,
    ) -> ApiResult<NodePool> {
        let path = format!("{}/nodepool", self.base_path());
        let body = encode(request)?;
        let pool: NodePool = self
            .retry
            .execute(cancel, "CreateNodePool", || {
                self.send("CreateNodePool", Method::Post, &path, Some(body.clone()))
            })
            .await?;
        info!(pool = %pool.id, name = %pool.name, flavor = %request.flavor_name, "node pool created");
        Ok(pool)
    }

    async fn update_node_pool(
        &self,
        cancel: &CancellationToken,
        pool_id: &str,
        request: &UpdateNodePoolRequest,
    ) -> ApiResult<()> {
        let path = self.pool_path(pool_id);
        let body = encode(request)?;
        self.retry
            .execute(cancel, "UpdateNodePool", || {
                self.send_unit("UpdateNodePool", Method::Put, &path, Some(body.clone()))
            })
            .await?;
        debug!(pool = %pool_id, desired = request.desired_nodes, "node pool updated");
        Ok(())
    }

    async fn delete_node_pool(&self, cancel: &CancellationToken, pool_id: &str) -> ApiResult<()> {
        let path = self.pool_path(pool_id);
        self.retry
            .execute(cancel, "DeleteNodePool", || {
                self.send_unit("DeleteNodePool", Method::Delete, &path, None)
            })
            .await?;
        info!(pool = %pool_id, "node pool deleted");
        Ok(())
    }

    async fn list_pool_nodes(&self, cancel: &CancellationToken, pool_id: &str) -> ApiResult<Vec<Node>> {
        let path = format!("{}/nodes", self.pool_path(pool_id));
        self.retry
            .execute(cancel, "ListNodePoolNodes", || {
                self.send("ListNodePoolNodes", Method::Get, &path, None)
            })
            .await
    }

    async fn list_flavors(&self, cancel: &CancellationToken) -> ApiResult<Vec<Flavor>> {
        let path = format!("{}/flavors", self.base_path());
        self.retry
            .execute(cancel, "ListFlavors", || {
                self.send("ListFlavors", Method::Get, &path, None)
            })
            .await
    }

    async fn list_kube_regions(&self, cancel: &CancellationToken) -> ApiResult<Vec<String>> {
        let path = format!("{}/regions", self.capabilities_path());
        self.retry
            .execute(cancel, "ListKubeRegions", || {
                self.send("ListKubeRegions", Method::Get, &path, None)
            })
            .await
    }

    async fn list_kube_flavors(
        &self,
        cancel: &CancellationToken,
        region: &str,
    ) -> ApiResult<Vec<KubeFlavorCapability>> {
        let path = format!("{}/flavors?region={}", self.capabilities_path(), region);
        self.retry
            .execute(cancel, "ListKubeFlavors", || {
                self.send("ListKubeFlavors", Method::Get, &path, None)
            })
            .await
    }

    async fn get_cluster(&self, cancel: &CancellationToken) -> ApiResult<KubeCluster> {
        let path = self.base_path();
        self.retry
            .execute(cancel, "GetCluster", || {
                self.send("GetCluster", Method::Get, &path, None)
            })
            .await
    }

    async fn delete_node(&self, cancel: &CancellationToken, node_id: &str) -> ApiResult<()> {
        let path = format!("{}/node/{}", self.base_path(), node_id);
        self.retry
            .execute(cancel, "DeleteNode", || {
                self.send_unit("DeleteNode", Method::Delete, &path, None)
            })
            .await?;
        info!(node = %node_id, "node deleted");
        Ok(())
    }

    async fn region(&self, cancel: &CancellationToken) -> ApiResult<String> {
        let region = self
            .region
            .get_or_try_init(|| async {
                let cluster = self.get_cluster(cancel).await?;
                if cluster.region.is_empty() {
                    return Err(ApiError::Decode("cluster reports no region".into()));
                }
                info!(region = %cluster.region, cluster = %self.kube_id, "auto-detected cluster region");
                Ok(cluster.region)
            })
            .await?;
        Ok(region.clone())
    }
}
