//! Normalized instance types and their per-zone offerings.

use serde::{Deserialize, Serialize};

use crate::requirements::Requirement;
use crate::resources::ResourceList;

/// One schedulable flavor as seen by the autoscaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceType {
    pub name: String,
    pub requirements: Vec<Requirement>,
    pub capacity: ResourceList,
    /// Reserved for the node agent and system daemons.
    pub overhead: ResourceList,
    pub offerings: Vec<Offering>,
}

impl InstanceType {
    /// Capacity minus overhead.
    pub fn allocatable(&self) -> ResourceList {
        self.capacity.saturating_sub(&self.overhead)
    }
}

/// A (zone, price) pairing for an instance type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offering {
    pub requirements: Vec<Requirement>,
    /// Hourly price in the catalog currency.
    pub price: f64,
    pub available: bool,
}
