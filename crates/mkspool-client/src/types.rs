//! Wire types for the managed Kubernetes node pool API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mkspool_core::Taint;

/// Node status reported once the node has joined the cluster.
pub const NODE_STATUS_READY: &str = "READY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodePool {
    pub id: String,
    pub name: String,
    pub flavor: String,
    pub desired_nodes: u32,
    pub current_nodes: u32,
    pub min_nodes: u32,
    pub max_nodes: u32,
    pub autoscale: bool,
    pub monthly_billed: bool,
    pub anti_affinity: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub availability_zones: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<NodePoolTemplate>,
    pub created_at: String,
    pub updated_at: String,
}

impl NodePool {
    /// Zone the pool was pinned to at creation, if the API reports one.
    pub fn zone(&self) -> Option<&str> {
        self.availability_zone
            .as_deref()
            .filter(|z| !z.is_empty())
            .or_else(|| self.availability_zones.first().map(String::as_str))
    }
}

/// Template applied to every node the pool creates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePoolTemplate {
    #[serde(default)]
    pub metadata: TemplateMetadata,
    #[serde(default)]
    pub spec: TemplateSpec,
}

/// `annotations` and `finalizers` must always be present on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub finalizers: Vec<String>,
}

/// `taints` must always be present on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    #[serde(default)]
    pub taints: Vec<Taint>,
    #[serde(default)]
    pub unschedulable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodePoolRequest {
    pub name: String,
    pub flavor_name: String,
    pub desired_nodes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_nodes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<u32>,
    pub autoscale: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub monthly_billed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub anti_affinity: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub availability_zones: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<NodePoolTemplate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNodePoolRequest {
    pub desired_nodes: u32,
}

/// Flavor as listed by the cluster. RAM is in MiB, disk in GiB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flavor {
    pub name: String,
    pub category: String,
    pub vcpus: u32,
    pub ram: u64,
    pub disk: u32,
    pub gpus: u32,
    pub available: bool,
    pub state: String,
}

/// Flavor as listed by the region capability endpoint. RAM is in GiB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeFlavorCapability {
    pub name: String,
    pub category: String,
    #[serde(rename = "vCPUs")]
    pub vcpus: u32,
    pub ram: u64,
    pub gpus: u32,
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Node {
    pub id: String,
    pub node_pool_id: String,
    pub instance_id: String,
    pub name: String,
    pub status: String,
    pub flavor: String,
    pub version: String,
    pub created_at: String,
    pub is_up_to_date: bool,
}

impl Node {
    /// Joined the cluster and backed by a compute instance.
    pub fn is_ready(&self) -> bool {
        self.status == NODE_STATUS_READY && !self.instance_id.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KubeCluster {
    pub id: String,
    pub name: String,
    pub region: String,
    pub version: String,
    pub status: String,
    pub url: String,
    pub nodes_url: String,
    pub is_up_to_date: bool,
    pub update_policy: String,
    pub control_plane_is_up_to_date: bool,
    pub private_network_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
