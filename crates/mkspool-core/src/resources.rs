//! Resource quantities keyed by resource name.
//!
//! Quantities are stored as integers in base units: CPU in millicores,
//! memory and ephemeral storage in bytes, everything else as a plain count.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::labels::{RESOURCE_CPU, RESOURCE_MEMORY};

pub const MIB: i64 = 1024 * 1024;
pub const GIB: i64 = 1024 * MIB;

/// Resource name → quantity in base units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceList(BTreeMap<String, i64>);

impl ResourceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, quantity: i64) -> Self {
        self.0.insert(name.to_string(), quantity);
        self
    }

    pub fn insert(&mut self, name: &str, quantity: i64) {
        self.0.insert(name.to_string(), quantity);
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// CPU in millicores (0 when absent).
    pub fn cpu_millis(&self) -> i64 {
        self.get(RESOURCE_CPU).unwrap_or(0)
    }

    /// Memory in bytes (0 when absent).
    pub fn memory_bytes(&self) -> i64 {
        self.get(RESOURCE_MEMORY).unwrap_or(0)
    }

    /// Subtract `other` entry-wise, flooring at zero. Keys missing from
    /// `self` are not introduced.
    pub fn saturating_sub(&self, other: &ResourceList) -> ResourceList {
        let entries = self
            .0
            .iter()
            .map(|(name, qty)| {
                let reserved = other.get(name).unwrap_or(0);
                (name.clone(), (qty - reserved).max(0))
            })
            .collect();
        ResourceList(entries)
    }
}

impl FromIterator<(String, i64)> for ResourceList {
    fn from_iter<T: IntoIterator<Item = (String, i64)>>(iter: T) -> Self {
        ResourceList(iter.into_iter().collect())
    }
}
