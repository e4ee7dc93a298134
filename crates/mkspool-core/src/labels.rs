//! Well-known label, annotation and resource keys.

pub const LABEL_INSTANCE_TYPE: &str = "node.kubernetes.io/instance-type";
pub const LABEL_TOPOLOGY_ZONE: &str = "topology.kubernetes.io/zone";
pub const LABEL_ARCH: &str = "kubernetes.io/arch";
pub const LABEL_OS: &str = "kubernetes.io/os";
pub const LABEL_CAPACITY_TYPE: &str = "karpenter.sh/capacity-type";
pub const LABEL_NODEPOOL: &str = "karpenter.sh/nodepool";
pub const LABEL_REGISTERED: &str = "karpenter.sh/registered";

/// Flavor category (b, c, r, d, i, t, a, g, h, l).
pub const LABEL_INSTANCE_CATEGORY: &str = "karpenter.ovhcloud.sh/instance-category";

/// Management marker written on every node template.
pub const LABEL_MANAGED_BY: &str = "managed-by";
pub const MANAGED_BY_VALUE: &str = "karpenter";

pub const CAPACITY_TYPE_ON_DEMAND: &str = "on-demand";
pub const ARCH_AMD64: &str = "amd64";
pub const OS_LINUX: &str = "linux";

// Binding annotations tying a claim to its remote pool and node.
pub const ANNOTATION_POOL_ID: &str = "karpenter.ovhcloud.sh/pool-id";
pub const ANNOTATION_NODE_ID: &str = "karpenter.ovhcloud.sh/node-id";
pub const ANNOTATION_NODE_NAME: &str = "karpenter.ovhcloud.sh/node-name";

pub const RESOURCE_CPU: &str = "cpu";
pub const RESOURCE_MEMORY: &str = "memory";
pub const RESOURCE_PODS: &str = "pods";
pub const RESOURCE_EPHEMERAL_STORAGE: &str = "ephemeral-storage";
pub const RESOURCE_NVIDIA_GPU: &str = "nvidia.com/gpu";
