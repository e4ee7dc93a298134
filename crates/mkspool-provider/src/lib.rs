//! mkspool-provider — elastic pool orchestration for the autoscaler.
//!
//! # Architecture
//!
//! ```text
//! autoscaler ──▶ CloudProvider
//!                  ├── create   claim → flavor/zone → pool (create | scale up) → wait for node
//!                  ├── delete   scale down | delete pool
//!                  ├── get/list scan managed pools and their nodes
//!                  ├── is_drifted  billing / anti-affinity vs node class
//!                  └── get_instance_types ◀── instance_types::construct_instance_types
//!                                                 ├── PoolApi flavor listings
//!                                                 └── PricingCache
//! ```
//!
//! Pools are named `karpenter-{flavor}-{zone}`; see [`naming`].

pub mod drift;
pub mod error;
pub mod instance_types;
pub mod naming;
pub mod nodeclass;
pub mod provider;

pub use drift::DriftReason;
pub use error::{ProviderError, ProviderResult, Termination};
pub use instance_types::{build_instance_type, construct_instance_types};
pub use nodeclass::{NodeClassResolver, StaticNodeClasses};
pub use provider::{CloudProvider, PROVIDER_NAME, ProviderSettings, RepairPolicy};
