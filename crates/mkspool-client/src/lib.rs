//! mkspool-client — typed access to the managed Kubernetes node pool API.
//!
//! # Architecture
//!
//! ```text
//! PoolApi (trait) ◀── orchestrator
//!    │
//! PoolClient
//!    ├── RetryExecutor   backoff + jitter, cancellation-aware
//!    ├── Transport       signed REST exchange (OvhTransport over reqwest)
//!    └── MetricsSink     one api_call per attempt, api_retry per retry
//! ```
//!
//! Flavor listings from the region capability endpoint and the cluster
//! flavor endpoint are normalized through [`flavor::RemoteFlavor`].

pub mod client;
pub mod error;
pub mod flavor;
pub mod retry;
pub mod transport;
pub mod types;

pub use client::{ClusterRef, PoolApi, PoolClient};
pub use error::{ApiError, ApiResult, TransportKind};
pub use flavor::{FlavorSpec, MemoryUnit, RemoteFlavor};
pub use retry::{RetryConfig, RetryExecutor};
pub use transport::{Credentials, Method, OvhTransport, Transport};
pub use types::{
    CreateNodePoolRequest, Flavor, KubeCluster, KubeFlavorCapability, Node, NodePool,
    NodePoolTemplate, TemplateMetadata, TemplateSpec, UpdateNodePoolRequest,
};
