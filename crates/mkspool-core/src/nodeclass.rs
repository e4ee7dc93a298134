//! Declarative node class configuration and its readiness status.
//!
//! A node class carries the pool-level settings the orchestrator applies
//! when it creates a pool: billing mode, anti-affinity and user tags. The
//! billing mode and anti-affinity cannot change on a live pool, which is
//! what drift detection compares against.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::NodeClassError;

pub const CONDITION_READY: &str = "Ready";
pub const REASON_READY: &str = "Ready";
pub const REASON_VALIDATION_FAILED: &str = "ValidationFailed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretReference {
    pub name: String,
    pub namespace: String,
}

/// Desired pool configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeClassSpec {
    /// Public cloud project ID.
    pub service_name: String,
    /// Managed cluster ID.
    pub kube_id: String,
    pub region: String,
    #[serde(default)]
    pub credentials_secret_ref: Option<SecretReference>,
    /// Monthly billing for pool nodes. Immutable once a pool exists.
    #[serde(default)]
    pub monthly_billed: bool,
    /// Spread pool nodes across hypervisors. Immutable once a pool exists.
    #[serde(default)]
    pub anti_affinity: bool,
    /// Applied as labels on every node of pools created for this class.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeClassStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub discovered_flavors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeClass {
    pub name: String,
    pub spec: NodeClassSpec,
    #[serde(default)]
    pub status: NodeClassStatus,
}

impl NodeClass {
    /// Check the required fields.
    pub fn validate(&self) -> Result<(), NodeClassError> {
        if self.spec.service_name.is_empty() {
            return Err(NodeClassError::MissingServiceName);
        }
        if self.spec.kube_id.is_empty() {
            return Err(NodeClassError::MissingKubeId);
        }
        if self.spec.region.is_empty() {
            return Err(NodeClassError::MissingRegion);
        }
        Ok(())
    }

    /// Recompute the Ready condition from validation. Returns whether the
    /// status changed.
    pub fn reconcile_status(&mut self) -> bool {
        let condition = match self.validate() {
            Ok(()) => Condition {
                kind: CONDITION_READY.to_string(),
                status: ConditionStatus::True,
                reason: REASON_READY.to_string(),
                message: String::new(),
            },
            Err(e) => Condition {
                kind: CONDITION_READY.to_string(),
                status: ConditionStatus::False,
                reason: REASON_VALIDATION_FAILED.to_string(),
                message: e.to_string(),
            },
        };

        let conditions = &mut self.status.conditions;
        match conditions.iter_mut().find(|c| c.kind == CONDITION_READY) {
            Some(existing) if *existing == condition => false,
            Some(existing) => {
                *existing = condition;
                true
            }
            None => {
                conditions.push(condition);
                true
            }
        }
    }

    pub fn ready_condition(&self) -> Option<&Condition> {
        self.status
            .conditions
            .iter()
            .find(|c| c.kind == CONDITION_READY)
    }

    /// Only an explicit `Ready=False` blocks provisioning; a class that was
    /// never reconciled is accepted.
    pub fn is_not_ready(&self) -> bool {
        self.ready_condition()
            .is_some_and(|c| c.status == ConditionStatus::False)
    }
}
