//! Instance catalog construction from the remote flavor listings.
//!
//! The region capability endpoint is preferred; when it fails or returns
//! nothing the cluster flavor endpoint is used instead. Both listings are
//! normalized through [`RemoteFlavor`] so memory is converted with the unit
//! its source actually reports (GiB for capabilities, MiB for cluster
//! flavors).

use tokio_util::sync::CancellationToken;
use tracing::info;

use mkspool_client::{ApiError, FlavorSpec, PoolApi, RemoteFlavor};
use mkspool_core::labels::{
    ARCH_AMD64, CAPACITY_TYPE_ON_DEMAND, LABEL_ARCH, LABEL_CAPACITY_TYPE,
    LABEL_INSTANCE_CATEGORY, LABEL_INSTANCE_TYPE, LABEL_OS, LABEL_TOPOLOGY_ZONE, OS_LINUX,
    RESOURCE_CPU, RESOURCE_EPHEMERAL_STORAGE, RESOURCE_MEMORY, RESOURCE_NVIDIA_GPU,
    RESOURCE_PODS,
};
use mkspool_core::resources::{GIB, MIB};
use mkspool_core::{InstanceType, Offering, Requirement, ResourceList};
use mkspool_pricing::{FlavorShape, PricingCache};

use crate::error::{ProviderError, ProviderResult};

pub const MAX_PODS: i64 = 110;

const OVERHEAD_CPU_MILLIS: i64 = 100;
const OVERHEAD_MEMORY_BYTES: i64 = 100 * MIB;
const ZONE_SUFFIXES: [&str; 3] = ["a", "b", "c"];

/// Synthesized zones `{region}-a`, `-b`, `-c`.
pub fn zones_for_region(region: &str) -> Vec<String> {
    let region = region.to_lowercase();
    ZONE_SUFFIXES
        .iter()
        .map(|suffix| format!("{region}-{suffix}"))
        .collect()
}

pub fn shape_of(spec: &FlavorSpec) -> FlavorShape {
    FlavorShape {
        vcpus: spec.vcpus,
        memory_gib: spec.memory_gib(),
        gpus: spec.gpus,
    }
}

pub fn capacity_of(spec: &FlavorSpec) -> ResourceList {
    let mut capacity = ResourceList::new()
        .with(RESOURCE_CPU, i64::from(spec.vcpus) * 1000)
        .with(RESOURCE_MEMORY, spec.memory_bytes())
        .with(RESOURCE_PODS, MAX_PODS)
        .with(RESOURCE_EPHEMERAL_STORAGE, i64::from(spec.disk_gib) * GIB);
    if spec.gpus > 0 {
        capacity.insert(RESOURCE_NVIDIA_GPU, i64::from(spec.gpus));
    }
    capacity
}

fn overhead() -> ResourceList {
    ResourceList::new()
        .with(RESOURCE_CPU, OVERHEAD_CPU_MILLIS)
        .with(RESOURCE_MEMORY, OVERHEAD_MEMORY_BYTES)
}

/// One instance type with an offering per synthesized zone, all at `price`.
pub fn build_instance_type(spec: &FlavorSpec, region: &str, price: f64) -> InstanceType {
    let requirements = vec![
        Requirement::exact(LABEL_INSTANCE_TYPE, spec.name.as_str()),
        Requirement::exact(LABEL_ARCH, ARCH_AMD64),
        Requirement::exact(LABEL_OS, OS_LINUX),
        Requirement::exact(LABEL_CAPACITY_TYPE, CAPACITY_TYPE_ON_DEMAND),
        Requirement::exact(LABEL_INSTANCE_CATEGORY, spec.category.as_str()),
    ];

    let offerings = zones_for_region(region)
        .into_iter()
        .map(|zone| Offering {
            requirements: vec![
                Requirement::exact(LABEL_CAPACITY_TYPE, CAPACITY_TYPE_ON_DEMAND),
                Requirement::exact(LABEL_TOPOLOGY_ZONE, zone),
            ],
            price,
            available: true,
        })
        .collect();

    InstanceType {
        name: spec.name.clone(),
        requirements,
        capacity: capacity_of(spec),
        overhead: overhead(),
        offerings,
    }
}

/// Fetch flavors for the cluster's region and build the catalog.
pub async fn construct_instance_types(
    api: &dyn PoolApi,
    pricing: Option<&PricingCache>,
    cancel: &CancellationToken,
) -> ProviderResult<Vec<InstanceType>> {
    let region = api
        .region(cancel)
        .await
        .map_err(|e| ProviderError::api("resolving region", e))?;

    let flavors: Vec<RemoteFlavor> = match api.list_kube_flavors(cancel, &region).await {
        Ok(caps) if !caps.is_empty() => {
            info!(%region, count = caps.len(), "retrieved flavors from capabilities endpoint");
            caps.into_iter().map(RemoteFlavor::Capability).collect()
        }
        Err(ApiError::Cancelled) => return Err(ProviderError::Cancelled),
        other => {
            let reason = match other {
                Err(e) => e.to_string(),
                Ok(_) => "no flavors returned".to_string(),
            };
            info!(%region, %reason, "capabilities endpoint unavailable, falling back to cluster flavors");
            let flavors = api
                .list_flavors(cancel)
                .await
                .map_err(|e| ProviderError::api("listing flavors", e))?;
            info!(count = flavors.len(), "retrieved flavors from cluster endpoint");
            flavors.into_iter().map(RemoteFlavor::Cluster).collect()
        }
    };

    let mut instance_types = Vec::with_capacity(flavors.len());
    for spec in flavors.into_iter().filter_map(RemoteFlavor::normalize) {
        let shape = shape_of(&spec);
        let price = match pricing {
            Some(cache) => cache.price_for(cancel, &spec.name, &region, Some(&shape)).await,
            None => shape.estimate(),
        };
        instance_types.push(build_instance_type(&spec, &region, price));
    }

    Ok(instance_types)
}
