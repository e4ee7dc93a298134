//! The pool orchestrator.
//!
//! Maps node claims onto node pools: one pool per (flavor, zone), named
//! deterministically so it can always be rediscovered from the remote
//! listing. A name → pool ID cache avoids that listing on the hot path, but
//! every hit is re-read from the remote side before it is trusted.
//!
//! # Concurrency
//!
//! One async mutex guards the pool cache and is held across the whole
//! create-or-scale decision, remote calls included. Two Creates for the
//! same flavor and zone therefore never both create a pool, and no scale-up
//! is lost. Waiting for the new node happens after the lock is released.
//! Delete holds the same lock across its read-modify-write of the desired
//! count.
//!
//! Nodes handed out by Create are recorded so that concurrent Creates on
//! the same pool never return the same node.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mkspool_client::{
    ApiError, CreateNodePoolRequest, Node, NodePool, NodePoolTemplate, PoolApi, TemplateMetadata,
    TemplateSpec, UpdateNodePoolRequest,
};
use mkspool_core::labels::{
    ARCH_AMD64, CAPACITY_TYPE_ON_DEMAND, LABEL_ARCH, LABEL_CAPACITY_TYPE, LABEL_INSTANCE_TYPE,
    LABEL_MANAGED_BY, LABEL_NODEPOOL, LABEL_OS, LABEL_REGISTERED, LABEL_TOPOLOGY_ZONE,
    MANAGED_BY_VALUE, OS_LINUX,
};
use mkspool_core::requirements::first_value;
use mkspool_core::{ConditionStatus, InstanceType, MetricsSink, NodeClaim, NodeClass};
use mkspool_pricing::PricingCache;

use crate::drift::{self, DriftReason};
use crate::error::{ProviderError, ProviderResult, Termination};
use crate::instance_types::construct_instance_types;
use crate::naming::{
    default_zone, is_managed_pool, parse_provider_id, pool_name, provider_id, zone_from_pool_name,
};
use crate::nodeclass::NodeClassResolver;

pub const PROVIDER_NAME: &str = "ovhcloud";

const REPAIR_TOLERATION: Duration = Duration::from_secs(10 * 60);

/// Orchestrator tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    /// Desired node count of a newly created pool.
    pub default_desired_nodes: u32,
    /// Interval between node listings while waiting for a new node.
    pub poll_interval: Duration,
    /// Upper bound on the wait for a new node.
    pub node_timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            default_desired_nodes: 1,
            poll_interval: Duration::from_secs(10),
            node_timeout: Duration::from_secs(10 * 60),
        }
    }
}

/// Node condition the autoscaler may repair after `toleration`.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairPolicy {
    pub condition_type: String,
    pub condition_status: ConditionStatus,
    pub toleration: Duration,
}

/// Pool chosen for a Create, with the node IDs it had before scaling.
struct PoolDecision {
    pool: NodePool,
    known_nodes: HashSet<String>,
}

pub struct CloudProvider {
    api: Arc<dyn PoolApi>,
    pricing: Option<Arc<PricingCache>>,
    node_classes: Arc<dyn NodeClassResolver>,
    metrics: Arc<dyn MetricsSink>,
    settings: ProviderSettings,
    /// Pool name → pool ID. A hint only.
    pool_cache: Mutex<HashMap<String, String>>,
    /// Node ID → pool ID for nodes returned by an in-flight or completed
    /// Create. Pruned against each polled node list.
    claimed_nodes: Mutex<HashMap<String, String>>,
    instance_types: RwLock<Arc<Vec<InstanceType>>>,
}

impl CloudProvider {
    pub fn new(
        api: Arc<dyn PoolApi>,
        pricing: Option<Arc<PricingCache>>,
        node_classes: Arc<dyn NodeClassResolver>,
        metrics: Arc<dyn MetricsSink>,
        settings: ProviderSettings,
    ) -> Self {
        Self {
            api,
            pricing,
            node_classes,
            metrics,
            settings,
            pool_cache: Mutex::new(HashMap::new()),
            claimed_nodes: Mutex::new(HashMap::new()),
            instance_types: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Replace the instance catalog.
    pub async fn with_instance_types(self, instance_types: Vec<InstanceType>) -> Self {
        *self.instance_types.write().await = Arc::new(instance_types);
        self
    }

    pub fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub fn repair_policies(&self) -> Vec<RepairPolicy> {
        [ConditionStatus::False, ConditionStatus::Unknown]
            .into_iter()
            .map(|status| RepairPolicy {
                condition_type: "Ready".to_string(),
                condition_status: status,
                toleration: REPAIR_TOLERATION,
            })
            .collect()
    }

    /// Cached pool ID for a pool name.
    pub async fn cached_pool_id(&self, name: &str) -> Option<String> {
        self.pool_cache.lock().await.get(name).cloned()
    }

    // ── Create ─────────────────────────────────────────────────────

    /// Provision one node for `claim` and return the satisfied claim.
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        claim: &NodeClaim,
    ) -> ProviderResult<NodeClaim> {
        let started = Instant::now();

        let Some(class) = self.resolve_node_class(claim).await else {
            self.metrics.node_provisioning("unknown", "unknown", "error");
            return Err(ProviderError::InsufficientCapacity(format!(
                "resolving node class for {}: not found",
                claim.name
            )));
        };

        if class.is_not_ready() {
            self.metrics
                .node_provisioning("unknown", "unknown", "nodeclass_not_ready");
            let message = class
                .ready_condition()
                .map(|c| c.message.clone())
                .unwrap_or_default();
            return Err(ProviderError::NodeClassNotReady(message));
        }

        let Some(flavor) = first_value(&claim.requirements, LABEL_INSTANCE_TYPE) else {
            self.metrics.node_provisioning("unknown", "unknown", "no_flavor");
            return Err(ProviderError::InvalidRequest(
                "no instance type requirement found".to_string(),
            ));
        };
        let flavor = flavor.to_string();

        let zone = match first_value(&claim.requirements, LABEL_TOPOLOGY_ZONE) {
            Some(zone) => zone.to_string(),
            None => match self.api.region(cancel).await {
                Ok(region) => default_zone(&region),
                Err(e) => {
                    self.metrics.node_provisioning(&flavor, "unknown", "error");
                    return Err(ProviderError::api("resolving region", e));
                }
            },
        };
        let name = pool_name(&flavor, &zone);

        info!(claim = %claim.name, %flavor, %zone, pool = %name, "creating node");

        let decision = match self
            .get_or_create_pool(cancel, &name, &flavor, &zone, &class, claim)
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                self.metrics.node_provisioning(&flavor, &zone, "pool_error");
                return Err(e);
            }
        };
        let pool = decision.pool;

        let node = match self
            .wait_for_new_node(cancel, &pool.id, &decision.known_nodes)
            .await
        {
            Ok(node) => node,
            Err(e) => {
                let status = match e {
                    ProviderError::Cancelled => "cancelled",
                    _ => "timeout",
                };
                self.metrics.node_provisioning(&flavor, &zone, status);
                warn!(pool = %pool.id, %flavor, %zone, error = %e, "no new node appeared");
                return Err(e);
            }
        };

        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.node_provisioning(&flavor, &zone, "success");
        self.metrics
            .node_provisioning_duration(&flavor, &zone, elapsed);
        info!(
            node = %node.id,
            node_name = %node.name,
            pool = %pool.id,
            duration_secs = elapsed,
            "node created"
        );

        let instance_type = self.instance_type(&flavor).await;
        let mut created = claim.clone();
        created.status.provider_id = provider_id(&node.instance_id);
        created.status.node_name = node.name.clone();
        if let Some(it) = &instance_type {
            created.status.capacity = it.capacity.clone();
            created.status.allocatable = it.allocatable();
        }
        created.bind(&pool.id, &node.id, &node.name);
        created
            .labels
            .insert(LABEL_INSTANCE_TYPE.to_string(), flavor);
        created
            .labels
            .insert(LABEL_TOPOLOGY_ZONE.to_string(), zone);
        created.labels.insert(
            LABEL_CAPACITY_TYPE.to_string(),
            CAPACITY_TYPE_ON_DEMAND.to_string(),
        );

        Ok(created)
    }

    async fn get_or_create_pool(
        &self,
        cancel: &CancellationToken,
        name: &str,
        flavor: &str,
        zone: &str,
        class: &NodeClass,
        claim: &NodeClaim,
    ) -> ProviderResult<PoolDecision> {
        let mut cache = self.pool_cache.lock().await;

        if let Some(pool_id) = cache.get(name).cloned() {
            match self.api.get_node_pool(cancel, &pool_id).await {
                Ok(pool) => {
                    debug!(pool = %name, id = %pool_id, "pool cache hit");
                    return self.scale_up(cancel, pool).await;
                }
                Err(ApiError::Cancelled) => return Err(ProviderError::Cancelled),
                Err(e) => {
                    debug!(pool = %name, id = %pool_id, error = %e, "cached pool failed validation, evicting");
                    cache.remove(name);
                }
            }
        }

        let pools = self
            .api
            .list_node_pools(cancel)
            .await
            .map_err(|e| ProviderError::api("listing pools", e))?;

        if let Some(pool) = pools.into_iter().find(|p| p.name == name) {
            cache.insert(name.to_string(), pool.id.clone());
            return self.scale_up(cancel, pool).await;
        }

        let request = self.pool_request(name, flavor, zone, class, claim);
        let pool = match self.api.create_node_pool(cancel, &request).await {
            Ok(pool) => {
                self.metrics.pool_operation("create", "success");
                pool
            }
            Err(e) => {
                self.metrics.pool_operation("create", "error");
                return Err(ProviderError::api("creating pool", e));
            }
        };
        info!(pool = %name, id = %pool.id, %flavor, %zone, desired = request.desired_nodes, "created pool");
        cache.insert(name.to_string(), pool.id.clone());

        Ok(PoolDecision {
            pool,
            known_nodes: HashSet::new(),
        })
    }

    /// Snapshot the pool's nodes, then raise its desired count by one.
    async fn scale_up(
        &self,
        cancel: &CancellationToken,
        mut pool: NodePool,
    ) -> ProviderResult<PoolDecision> {
        let known_nodes = self
            .api
            .list_pool_nodes(cancel, &pool.id)
            .await
            .map_err(|e| ProviderError::api("listing pool nodes", e))?
            .into_iter()
            .map(|n| n.id)
            .collect();

        let desired = pool.desired_nodes + 1;
        if let Err(e) = self
            .api
            .update_node_pool(cancel, &pool.id, &UpdateNodePoolRequest { desired_nodes: desired })
            .await
        {
            self.metrics.pool_operation("scale_up", "error");
            return Err(ProviderError::api("scaling up pool", e));
        }
        self.metrics.pool_operation("scale_up", "success");
        info!(pool = %pool.name, id = %pool.id, desired, "scaled up pool");

        pool.desired_nodes = desired;
        Ok(PoolDecision { pool, known_nodes })
    }

    fn pool_request(
        &self,
        name: &str,
        flavor: &str,
        zone: &str,
        class: &NodeClass,
        claim: &NodeClaim,
    ) -> CreateNodePoolRequest {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string());
        labels.insert(LABEL_INSTANCE_TYPE.to_string(), flavor.to_string());
        labels.insert(LABEL_TOPOLOGY_ZONE.to_string(), zone.to_string());
        labels.insert(
            LABEL_CAPACITY_TYPE.to_string(),
            CAPACITY_TYPE_ON_DEMAND.to_string(),
        );
        labels.insert(LABEL_ARCH.to_string(), ARCH_AMD64.to_string());
        labels.insert(LABEL_OS.to_string(), OS_LINUX.to_string());
        labels.insert(LABEL_REGISTERED.to_string(), "true".to_string());
        if let Some(nodepool) = claim.labels.get(LABEL_NODEPOOL) {
            labels.insert(LABEL_NODEPOOL.to_string(), nodepool.clone());
        }
        labels.extend(
            class
                .spec
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        CreateNodePoolRequest {
            name: name.to_string(),
            flavor_name: flavor.to_string(),
            desired_nodes: self.settings.default_desired_nodes,
            min_nodes: None,
            max_nodes: None,
            autoscale: false,
            monthly_billed: class.spec.monthly_billed,
            anti_affinity: class.spec.anti_affinity,
            availability_zones: if zone.is_empty() {
                Vec::new()
            } else {
                vec![zone.to_string()]
            },
            template: Some(NodePoolTemplate {
                metadata: TemplateMetadata {
                    labels,
                    annotations: Default::default(),
                    finalizers: Vec::new(),
                },
                spec: TemplateSpec {
                    taints: claim.taints.clone(),
                    unschedulable: false,
                },
            }),
        }
    }

    /// Poll the pool until a ready node outside `known` appears.
    async fn wait_for_new_node(
        &self,
        cancel: &CancellationToken,
        pool_id: &str,
        known: &HashSet<String>,
    ) -> ProviderResult<Node> {
        let poll = async {
            let period = self.settings.poll_interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                    _ = ticker.tick() => {}
                }

                let nodes = match self.api.list_pool_nodes(cancel, pool_id).await {
                    Ok(nodes) => nodes,
                    Err(ApiError::Cancelled) => return Err(ProviderError::Cancelled),
                    Err(e) => {
                        warn!(pool = %pool_id, error = %e, "listing pool nodes failed, retrying on next tick");
                        continue;
                    }
                };

                if let Some(node) = self.claim_ready_node(pool_id, nodes, known).await {
                    return Ok(node);
                }
                debug!(pool = %pool_id, "no new ready node yet");
            }
        };

        match tokio::time::timeout(self.settings.node_timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                pool_id: pool_id.to_string(),
                after: self.settings.node_timeout,
            }),
        }
    }

    async fn claim_ready_node(
        &self,
        pool_id: &str,
        nodes: Vec<Node>,
        known: &HashSet<String>,
    ) -> Option<Node> {
        let mut claimed = self.claimed_nodes.lock().await;
        take_ready_node(&mut claimed, pool_id, nodes, known)
    }

    // ── Delete ─────────────────────────────────────────────────────

    /// Release the node bound to `claim`. Every `Ok` means the instance is
    /// terminated from the caller's point of view.
    pub async fn delete(
        &self,
        cancel: &CancellationToken,
        claim: &NodeClaim,
    ) -> ProviderResult<Termination> {
        let started = Instant::now();

        let Some(pool_id) = claim.pool_id() else {
            self.metrics.node_deletion("no_pool_id");
            return Err(ProviderError::NodeClaimNotFound(format!(
                "{} has no pool ID annotation",
                claim.name
            )));
        };

        let termination = {
            let mut cache = self.pool_cache.lock().await;

            let pool = match self.api.get_node_pool(cancel, pool_id).await {
                Ok(pool) => pool,
                Err(e) if e.is_not_found() => {
                    info!(claim = %claim.name, pool = %pool_id, "pool already gone");
                    self.metrics.node_deletion("pool_not_found");
                    cache.retain(|_, id| id.as_str() != pool_id);
                    drop(cache);
                    self.release_node(claim).await;
                    return Ok(Termination::AlreadyGone);
                }
                Err(e) => {
                    self.metrics.node_deletion("pool_error");
                    return Err(ProviderError::api("reading pool", e));
                }
            };

            info!(
                claim = %claim.name,
                pool = %pool.name,
                id = %pool_id,
                desired = pool.desired_nodes,
                current = pool.current_nodes,
                "deleting node"
            );

            if pool.desired_nodes <= 1 {
                if let Err(e) = self.api.delete_node_pool(cancel, pool_id).await {
                    self.metrics.node_deletion("delete_error");
                    self.metrics.pool_operation("delete", "error");
                    return Err(ProviderError::api("deleting pool", e));
                }
                self.metrics.pool_operation("delete", "success");
                cache.retain(|_, id| id.as_str() != pool_id);
                info!(pool = %pool.name, id = %pool_id, "deleted pool");
                Termination::PoolDeleted
            } else {
                let desired = pool.desired_nodes - 1;
                if let Err(e) = self
                    .api
                    .update_node_pool(cancel, pool_id, &UpdateNodePoolRequest { desired_nodes: desired })
                    .await
                {
                    self.metrics.node_deletion("scale_down_error");
                    self.metrics.pool_operation("scale_down", "error");
                    return Err(ProviderError::api("scaling down pool", e));
                }
                self.metrics.pool_operation("scale_down", "success");
                info!(pool = %pool.name, id = %pool_id, desired, "scaled down pool");
                Termination::ScaledDown
            }
        };

        self.release_node(claim).await;
        self.metrics.node_deletion("success");
        self.metrics
            .node_deletion_duration(started.elapsed().as_secs_f64());

        Ok(termination)
    }

    async fn release_node(&self, claim: &NodeClaim) {
        if let Some(node_id) = claim.node_id() {
            self.claimed_nodes.lock().await.remove(node_id);
        }
    }

    // ── Get / List ─────────────────────────────────────────────────

    /// Find the claim for a provider ID by scanning managed pools.
    pub async fn get(
        &self,
        cancel: &CancellationToken,
        provider_id: &str,
    ) -> ProviderResult<NodeClaim> {
        let Some(instance_id) = parse_provider_id(provider_id) else {
            return Err(ProviderError::NodeClaimNotFound(format!(
                "invalid provider ID format: {provider_id}"
            )));
        };

        let pools = self
            .api
            .list_node_pools(cancel)
            .await
            .map_err(|e| ProviderError::api("listing pools", e))?;
        let region = self
            .api
            .region(cancel)
            .await
            .map_err(|e| ProviderError::api("resolving region", e))?;

        for pool in pools.iter().filter(|p| is_managed_pool(&p.name)) {
            let Some(nodes) = self.pool_nodes(cancel, pool).await? else {
                continue;
            };
            if let Some(node) = nodes.iter().find(|n| n.instance_id == instance_id) {
                return Ok(self.node_to_claim(pool, node, &region).await);
            }
        }

        Err(ProviderError::NodeClaimNotFound(format!(
            "no node with instance ID {instance_id}"
        )))
    }

    /// Claims for every node in every managed pool. Pools whose nodes cannot
    /// be listed are skipped.
    pub async fn list(&self, cancel: &CancellationToken) -> ProviderResult<Vec<NodeClaim>> {
        let pools = self
            .api
            .list_node_pools(cancel)
            .await
            .map_err(|e| ProviderError::api("listing pools", e))?;
        let region = self
            .api
            .region(cancel)
            .await
            .map_err(|e| ProviderError::api("resolving region", e))?;

        let managed: Vec<&NodePool> = pools.iter().filter(|p| is_managed_pool(&p.name)).collect();
        self.metrics.pools_active(managed.len());

        let mut claims = Vec::new();
        for pool in managed {
            let Some(nodes) = self.pool_nodes(cancel, pool).await? else {
                continue;
            };
            for node in &nodes {
                claims.push(self.node_to_claim(pool, node, &region).await);
            }
        }
        Ok(claims)
    }

    /// Nodes of one pool; `None` when the listing failed and should be skipped.
    async fn pool_nodes(
        &self,
        cancel: &CancellationToken,
        pool: &NodePool,
    ) -> ProviderResult<Option<Vec<Node>>> {
        match self.api.list_pool_nodes(cancel, &pool.id).await {
            Ok(nodes) => Ok(Some(nodes)),
            Err(ApiError::Cancelled) => Err(ProviderError::Cancelled),
            Err(e) => {
                debug!(pool = %pool.name, id = %pool.id, error = %e, "skipping pool, listing nodes failed");
                Ok(None)
            }
        }
    }

    async fn node_to_claim(&self, pool: &NodePool, node: &Node, region: &str) -> NodeClaim {
        let zone = pool
            .zone()
            .map(str::to_string)
            .or_else(|| zone_from_pool_name(&pool.name, region))
            .unwrap_or_else(|| default_zone(region));
        let flavor = if node.flavor.is_empty() {
            pool.flavor.clone()
        } else {
            node.flavor.clone()
        };

        let mut claim = NodeClaim::new(node.name.clone());
        claim.bind(&pool.id, &node.id, &node.name);
        claim.labels.extend([
            (LABEL_INSTANCE_TYPE.to_string(), flavor.clone()),
            (LABEL_TOPOLOGY_ZONE.to_string(), zone),
            (
                LABEL_CAPACITY_TYPE.to_string(),
                CAPACITY_TYPE_ON_DEMAND.to_string(),
            ),
            (LABEL_ARCH.to_string(), ARCH_AMD64.to_string()),
            (LABEL_OS.to_string(), OS_LINUX.to_string()),
        ]);
        claim.status.node_name = node.name.clone();
        claim.status.provider_id = provider_id(&node.instance_id);
        if let Some(it) = self.instance_type(&flavor).await {
            claim.status.capacity = it.capacity.clone();
            claim.status.allocatable = it.allocatable();
        }
        claim
    }

    // ── Instance types ─────────────────────────────────────────────

    /// Current instance catalog.
    pub async fn get_instance_types(&self) -> Arc<Vec<InstanceType>> {
        let instance_types = self.instance_types.read().await.clone();
        self.metrics.instance_types_available(instance_types.len());
        instance_types
    }

    /// Rebuild the instance catalog from the remote flavor listings.
    pub async fn refresh_instance_types(&self, cancel: &CancellationToken) -> ProviderResult<usize> {
        let built =
            construct_instance_types(self.api.as_ref(), self.pricing.as_deref(), cancel).await?;
        let count = built.len();
        *self.instance_types.write().await = Arc::new(built);
        self.metrics.instance_types_available(count);
        info!(count, "instance types refreshed");
        Ok(count)
    }

    async fn instance_type(&self, name: &str) -> Option<InstanceType> {
        self.instance_types
            .read()
            .await
            .iter()
            .find(|it| it.name == name)
            .cloned()
    }

    // ── Drift ──────────────────────────────────────────────────────

    /// Compare the claim's pool with its node class. Anything that cannot
    /// be resolved counts as no drift.
    pub async fn is_drifted(
        &self,
        cancel: &CancellationToken,
        claim: &NodeClaim,
    ) -> ProviderResult<Option<DriftReason>> {
        let Some(class) = self.resolve_node_class(claim).await else {
            debug!(claim = %claim.name, "cannot resolve node class for drift detection");
            return Ok(None);
        };
        let Some(pool_id) = claim.pool_id() else {
            debug!(claim = %claim.name, "no pool ID annotation for drift detection");
            return Ok(None);
        };

        let pool = match self.api.get_node_pool(cancel, pool_id).await {
            Ok(pool) => pool,
            Err(ApiError::Cancelled) => return Err(ProviderError::Cancelled),
            Err(e) => {
                debug!(pool = %pool_id, error = %e, "cannot read pool for drift detection");
                return Ok(None);
            }
        };

        let reason = drift::detect(&pool, &class.spec);
        if let Some(reason) = reason {
            info!(
                claim = %claim.name,
                pool = %pool.name,
                %reason,
                pool_monthly_billed = pool.monthly_billed,
                class_monthly_billed = class.spec.monthly_billed,
                pool_anti_affinity = pool.anti_affinity,
                class_anti_affinity = class.spec.anti_affinity,
                "drift detected"
            );
            self.metrics.drift_detected(reason.as_str());
        }
        Ok(reason)
    }

    async fn resolve_node_class(&self, claim: &NodeClaim) -> Option<NodeClass> {
        let name = claim.node_class_ref.as_deref()?;
        self.node_classes.resolve(name).await
    }
}

/// Drop claims on `pool_id` whose node is no longer listed, then claim the
/// first ready node that is neither in `known` nor already claimed.
fn take_ready_node(
    claimed: &mut HashMap<String, String>,
    pool_id: &str,
    nodes: Vec<Node>,
    known: &HashSet<String>,
) -> Option<Node> {
    claimed.retain(|node_id, pool| pool != pool_id || nodes.iter().any(|n| &n.id == node_id));

    let node = nodes
        .into_iter()
        .find(|n| n.is_ready() && !known.contains(&n.id) && !claimed.contains_key(&n.id))?;
    claimed.insert(node.id.clone(), pool_id.to_string());
    Some(node)
}
