//! Node claims: the orchestrator's view of one requested or provisioned node.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::labels::{ANNOTATION_NODE_ID, ANNOTATION_NODE_NAME, ANNOTATION_POOL_ID};
use crate::requirements::{Requirement, Taint};
use crate::resources::ResourceList;

/// A request for one compute node and, once satisfied, its provider identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeClaim {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Name of the node class carrying the pool configuration.
    #[serde(default)]
    pub node_class_ref: Option<String>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub taints: Vec<Taint>,
    #[serde(default)]
    pub status: NodeClaimStatus,
}

/// Fields written by the orchestrator when the claim is satisfied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeClaimStatus {
    #[serde(default)]
    pub provider_id: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub capacity: ResourceList,
    #[serde(default)]
    pub allocatable: ResourceList,
}

impl NodeClaim {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Remote pool this claim is bound to, if any.
    pub fn pool_id(&self) -> Option<&str> {
        self.annotation(ANNOTATION_POOL_ID)
    }

    /// Remote node this claim is bound to, if any.
    pub fn node_id(&self) -> Option<&str> {
        self.annotation(ANNOTATION_NODE_ID)
    }

    pub fn node_name(&self) -> Option<&str> {
        self.annotation(ANNOTATION_NODE_NAME)
    }

    /// Attach the three binding annotations.
    pub fn bind(&mut self, pool_id: &str, node_id: &str, node_name: &str) {
        self.annotations
            .insert(ANNOTATION_POOL_ID.to_string(), pool_id.to_string());
        self.annotations
            .insert(ANNOTATION_NODE_ID.to_string(), node_id.to_string());
        self.annotations
            .insert(ANNOTATION_NODE_NAME.to_string(), node_name.to_string());
    }

    fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_binding_counts_as_missing() {
        let mut claim = NodeClaim::new("claim-1");
        assert_eq!(claim.pool_id(), None);

        claim
            .annotations
            .insert(ANNOTATION_POOL_ID.to_string(), String::new());
        assert_eq!(claim.pool_id(), None);

        claim.bind("pool-1", "node-1", "node-name-1");
        assert_eq!(claim.pool_id(), Some("pool-1"));
        assert_eq!(claim.node_id(), Some("node-1"));
        assert_eq!(claim.node_name(), Some("node-name-1"));
    }
}
