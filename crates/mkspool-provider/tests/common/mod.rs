//! Shared fakes for orchestrator tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mkspool_client::{
    ApiError, ApiResult, CreateNodePoolRequest, Flavor, KubeCluster, KubeFlavorCapability, Node,
    NodePool, PoolApi, UpdateNodePoolRequest,
};
use mkspool_core::labels::{LABEL_INSTANCE_TYPE, LABEL_TOPOLOGY_ZONE};
use mkspool_core::{MetricsSink, NodeClaim, NodeClass, NodeClassSpec, Requirement};
use mkspool_provider::{CloudProvider, ProviderSettings, StaticNodeClasses};

pub const REGION: &str = "GRA7";

#[derive(Default)]
pub struct FakeState {
    /// Pool ID → pool.
    pub pools: BTreeMap<String, NodePool>,
    /// Pool ID → nodes.
    pub nodes: HashMap<String, Vec<Node>>,
    /// Last create request per pool ID.
    pub create_requests: HashMap<String, CreateNodePoolRequest>,
    pub capabilities: Vec<KubeFlavorCapability>,
    pub capabilities_status: Option<u16>,
    pub flavors: Vec<Flavor>,
    /// Add ready nodes on listing until the pool reaches its desired count.
    pub auto_provision: bool,
    /// Upcoming node listings that fail, across all pools.
    pub transient_node_list_failures: u32,
    /// Pools whose node listing always fails.
    pub broken_pools: HashSet<String>,
    /// Pools whose reads fail with a server error.
    pub unreadable_pools: HashSet<String>,
    pub calls: Vec<String>,
    pub next_id: u32,
}

/// In-memory node pool API.
pub struct FakePoolApi {
    state: Mutex<FakeState>,
    region: String,
    latency: Duration,
}

impl FakePoolApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            region: REGION.to_string(),
            latency: Duration::from_millis(50),
        }
    }

    pub fn auto_provisioning() -> Self {
        let api = Self::new();
        api.with_state(|s| s.auto_provision = true);
        api
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_pool(&self, name: &str, flavor: &str, desired: u32) -> String {
        self.with_state(|s| {
            s.next_id += 1;
            let id = format!("pool-{}", s.next_id);
            s.pools.insert(
                id.clone(),
                NodePool {
                    id: id.clone(),
                    name: name.to_string(),
                    flavor: flavor.to_string(),
                    desired_nodes: desired,
                    status: "READY".to_string(),
                    ..Default::default()
                },
            );
            id
        })
    }

    pub fn add_node(&self, pool_id: &str, node: Node) {
        self.with_state(|s| s.nodes.entry(pool_id.to_string()).or_default().push(node));
    }

    pub fn update_pool(&self, pool_id: &str, f: impl FnOnce(&mut NodePool)) {
        self.with_state(|s| {
            if let Some(pool) = s.pools.get_mut(pool_id) {
                f(pool);
            }
        });
    }

    pub fn pool(&self, pool_id: &str) -> Option<NodePool> {
        self.with_state(|s| s.pools.get(pool_id).cloned())
    }

    pub fn pools_named(&self, name: &str) -> Vec<NodePool> {
        self.with_state(|s| s.pools.values().filter(|p| p.name == name).cloned().collect())
    }

    pub fn create_request(&self, pool_id: &str) -> Option<CreateNodePoolRequest> {
        self.with_state(|s| s.create_requests.get(pool_id).cloned())
    }

    pub fn calls(&self) -> Vec<String> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.with_state(|s| s.calls.iter().filter(|c| *c == operation).count())
    }

    async fn enter(&self, operation: &str) {
        self.with_state(|s| s.calls.push(operation.to_string()));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

pub fn ready_node(id: &str, instance_id: &str, flavor: &str) -> Node {
    Node {
        id: id.to_string(),
        instance_id: instance_id.to_string(),
        name: format!("node-{id}"),
        status: "READY".to_string(),
        flavor: flavor.to_string(),
        ..Default::default()
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        message: format!("{what} not found"),
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        message: "internal error".to_string(),
    }
}

#[async_trait]
impl PoolApi for FakePoolApi {
    async fn list_node_pools(&self, _cancel: &CancellationToken) -> ApiResult<Vec<NodePool>> {
        self.enter("ListNodePools").await;
        Ok(self.with_state(|s| s.pools.values().cloned().collect()))
    }

    async fn get_node_pool(&self, _cancel: &CancellationToken, pool_id: &str) -> ApiResult<NodePool> {
        self.enter("GetNodePool").await;
        self.with_state(|s| {
            if s.unreadable_pools.contains(pool_id) {
                return Err(server_error());
            }
            s.pools.get(pool_id).cloned().ok_or_else(|| not_found(pool_id))
        })
    }

    async fn create_node_pool(
        &self,
        _cancel: &CancellationToken,
        request: &CreateNodePoolRequest,
    ) -> ApiResult<NodePool> {
        self.enter("CreateNodePool").await;
        Ok(self.with_state(|s| {
            s.next_id += 1;
            let id = format!("pool-{}", s.next_id);
            let pool = NodePool {
                id: id.clone(),
                name: request.name.clone(),
                flavor: request.flavor_name.clone(),
                desired_nodes: request.desired_nodes,
                monthly_billed: request.monthly_billed,
                anti_affinity: request.anti_affinity,
                availability_zones: request.availability_zones.clone(),
                template: request.template.clone(),
                status: "INSTALLING".to_string(),
                ..Default::default()
            };
            s.pools.insert(id.clone(), pool.clone());
            s.create_requests.insert(id, request.clone());
            pool
        }))
    }

    async fn update_node_pool(
        &self,
        _cancel: &CancellationToken,
        pool_id: &str,
        request: &UpdateNodePoolRequest,
    ) -> ApiResult<()> {
        self.enter("UpdateNodePool").await;
        self.with_state(|s| match s.pools.get_mut(pool_id) {
            Some(pool) => {
                pool.desired_nodes = request.desired_nodes;
                Ok(())
            }
            None => Err(not_found(pool_id)),
        })
    }

    async fn delete_node_pool(&self, _cancel: &CancellationToken, pool_id: &str) -> ApiResult<()> {
        self.enter("DeleteNodePool").await;
        self.with_state(|s| {
            s.nodes.remove(pool_id);
            s.pools.remove(pool_id).map(|_| ()).ok_or_else(|| not_found(pool_id))
        })
    }

    async fn list_pool_nodes(&self, _cancel: &CancellationToken, pool_id: &str) -> ApiResult<Vec<Node>> {
        self.enter("ListNodePoolNodes").await;
        self.with_state(|s| {
            if s.broken_pools.contains(pool_id) {
                return Err(server_error());
            }
            if s.transient_node_list_failures > 0 {
                s.transient_node_list_failures -= 1;
                return Err(server_error());
            }
            let Some(pool) = s.pools.get(pool_id).cloned() else {
                return Err(not_found(pool_id));
            };
            if s.auto_provision {
                let existing = s.nodes.get(pool_id).map_or(0, Vec::len);
                for _ in existing..pool.desired_nodes as usize {
                    s.next_id += 1;
                    let n = s.next_id;
                    s.nodes.entry(pool_id.to_string()).or_default().push(ready_node(
                        &format!("node-{n}"),
                        &format!("inst-{n}"),
                        &pool.flavor,
                    ));
                }
            }
            Ok(s.nodes.get(pool_id).cloned().unwrap_or_default())
        })
    }

    async fn list_flavors(&self, _cancel: &CancellationToken) -> ApiResult<Vec<Flavor>> {
        self.enter("ListFlavors").await;
        Ok(self.with_state(|s| s.flavors.clone()))
    }

    async fn list_kube_regions(&self, _cancel: &CancellationToken) -> ApiResult<Vec<String>> {
        self.enter("ListKubeRegions").await;
        Ok(vec![self.region.clone()])
    }

    async fn list_kube_flavors(
        &self,
        _cancel: &CancellationToken,
        _region: &str,
    ) -> ApiResult<Vec<KubeFlavorCapability>> {
        self.enter("ListKubeFlavors").await;
        self.with_state(|s| match s.capabilities_status {
            Some(status) => Err(ApiError::Status {
                status,
                message: "capabilities unavailable".to_string(),
            }),
            None => Ok(s.capabilities.clone()),
        })
    }

    async fn get_cluster(&self, _cancel: &CancellationToken) -> ApiResult<KubeCluster> {
        self.enter("GetCluster").await;
        Ok(KubeCluster {
            id: "kube".to_string(),
            region: self.region.clone(),
            ..Default::default()
        })
    }

    async fn delete_node(&self, _cancel: &CancellationToken, node_id: &str) -> ApiResult<()> {
        self.enter("DeleteNode").await;
        self.with_state(|s| {
            for nodes in s.nodes.values_mut() {
                nodes.retain(|n| n.id != node_id);
            }
        });
        Ok(())
    }

    async fn region(&self, _cancel: &CancellationToken) -> ApiResult<String> {
        Ok(self.region.clone())
    }
}

/// Records every metric call as a flat string.
#[derive(Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<String>>,
}

impl RecordingMetrics {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events().iter().any(|e| e == event)
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl MetricsSink for RecordingMetrics {
    fn node_provisioning(&self, flavor: &str, zone: &str, status: &str) {
        self.push(format!("node_provisioning:{flavor}:{zone}:{status}"));
    }

    fn node_deletion(&self, status: &str) {
        self.push(format!("node_deletion:{status}"));
    }

    fn pool_operation(&self, operation: &str, status: &str) {
        self.push(format!("pool_operation:{operation}:{status}"));
    }

    fn pools_active(&self, count: usize) {
        self.push(format!("pools_active:{count}"));
    }

    fn instance_types_available(&self, count: usize) {
        self.push(format!("instance_types_available:{count}"));
    }

    fn drift_detected(&self, reason: &str) {
        self.push(format!("drift_detected:{reason}"));
    }
}

pub fn node_class(name: &str) -> NodeClass {
    NodeClass {
        name: name.to_string(),
        spec: NodeClassSpec {
            service_name: "proj".to_string(),
            kube_id: "kube".to_string(),
            region: REGION.to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn claim(name: &str, flavor: &str, zone: Option<&str>) -> NodeClaim {
    let mut claim = NodeClaim::new(name);
    claim.node_class_ref = Some("default".to_string());
    claim
        .requirements
        .push(Requirement::exact(LABEL_INSTANCE_TYPE, flavor));
    if let Some(zone) = zone {
        claim
            .requirements
            .push(Requirement::exact(LABEL_TOPOLOGY_ZONE, zone));
    }
    claim
}

pub struct Harness {
    pub api: Arc<FakePoolApi>,
    pub metrics: Arc<RecordingMetrics>,
    pub provider: Arc<CloudProvider>,
}

pub async fn harness_with(
    api: FakePoolApi,
    classes: Vec<NodeClass>,
    settings: ProviderSettings,
) -> Harness {
    let api = Arc::new(api);
    let metrics = Arc::new(RecordingMetrics::default());
    let classes = Arc::new(StaticNodeClasses::from_classes(classes).await);
    let provider = Arc::new(CloudProvider::new(
        api.clone(),
        None,
        classes,
        metrics.clone(),
        settings,
    ));
    Harness {
        api,
        metrics,
        provider,
    }
}

pub async fn harness(api: FakePoolApi) -> Harness {
    harness_with(api, vec![node_class("default")], ProviderSettings::default()).await
}
