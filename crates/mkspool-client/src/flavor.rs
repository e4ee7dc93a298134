//! Flavor normalization across the two listing sources.
//!
//! The region capability endpoint reports RAM in GiB and no disk; the
//! cluster flavor endpoint reports RAM in MiB and disk in GiB. Both are
//! normalized into [`FlavorSpec`], which keeps the memory unit explicit so
//! conversions downstream never guess.

use mkspool_core::resources::{GIB, MIB};

use crate::types::{Flavor, KubeFlavorCapability};

const STATE_AVAILABLE: &str = "available";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUnit {
    GiB,
    MiB,
}

impl MemoryUnit {
    pub fn to_bytes(self, amount: u64) -> i64 {
        let unit = match self {
            MemoryUnit::GiB => GIB,
            MemoryUnit::MiB => MIB,
        };
        (amount as i64).saturating_mul(unit)
    }
}

/// A flavor from either listing source.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteFlavor {
    Capability(KubeFlavorCapability),
    Cluster(Flavor),
}

/// Flavor shape with its memory unit attached.
#[derive(Debug, Clone, PartialEq)]
pub struct FlavorSpec {
    pub name: String,
    pub category: String,
    pub vcpus: u32,
    pub memory: u64,
    pub memory_unit: MemoryUnit,
    /// Zero when the source does not report disk.
    pub disk_gib: u32,
    pub gpus: u32,
}

impl FlavorSpec {
    pub fn memory_bytes(&self) -> i64 {
        self.memory_unit.to_bytes(self.memory)
    }

    pub fn memory_gib(&self) -> f64 {
        self.memory_bytes() as f64 / GIB as f64
    }
}

impl RemoteFlavor {
    /// Normalize, dropping flavors that cannot host nodes: capability
    /// entries not in the `available` state, and anything with no vCPUs.
    pub fn normalize(self) -> Option<FlavorSpec> {
        match self {
            RemoteFlavor::Capability(cap) => {
                if cap.state != STATE_AVAILABLE || cap.vcpus == 0 {
                    return None;
                }
                Some(FlavorSpec {
                    name: cap.name,
                    category: cap.category,
                    vcpus: cap.vcpus,
                    memory: cap.ram,
                    memory_unit: MemoryUnit::GiB,
                    disk_gib: 0,
                    gpus: cap.gpus,
                })
            }
            RemoteFlavor::Cluster(flavor) => {
                if flavor.vcpus == 0 {
                    return None;
                }
                Some(FlavorSpec {
                    name: flavor.name,
                    category: flavor.category,
                    vcpus: flavor.vcpus,
                    memory: flavor.ram,
                    memory_unit: MemoryUnit::MiB,
                    disk_gib: flavor.disk,
                    gpus: flavor.gpus,
                })
            }
        }
    }
}
