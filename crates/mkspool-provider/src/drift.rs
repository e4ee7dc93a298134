//! Drift between a live pool and its node class.
//!
//! Only attributes that are immutable once the pool exists are compared.
//! Label and requirement drift is checked by the autoscaler itself.

use std::fmt;

use serde::Serialize;

use mkspool_client::NodePool;
use mkspool_core::NodeClassSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriftReason {
    MonthlyBillingChanged,
    AntiAffinityChanged,
}

impl DriftReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftReason::MonthlyBillingChanged => "MonthlyBillingChanged",
            DriftReason::AntiAffinityChanged => "AntiAffinityChanged",
        }
    }
}

impl fmt::Display for DriftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First mismatch wins; billing is checked before anti-affinity.
pub fn detect(pool: &NodePool, spec: &NodeClassSpec) -> Option<DriftReason> {
    if pool.monthly_billed != spec.monthly_billed {
        return Some(DriftReason::MonthlyBillingChanged);
    }
    if pool.anti_affinity != spec.anti_affinity {
        return Some(DriftReason::AntiAffinityChanged);
    }
    None
}
