//! mkspool-core — shared records for the elastic pool orchestrator.
//!
//! These are the shapes exchanged with the surrounding autoscaler: the
//! capacity request (`NodeClaim`) and its requirement constraints, the
//! normalized `InstanceType` catalog with per-zone `Offering`s, and the
//! declarative `NodeClass` configuration. The orchestrator reads fields from
//! and writes fields to these records; it never owns their persistence.
//!
//! # Architecture
//!
//! ```text
//! NodeClaim ──requirements──▶ flavor / zone selection
//!     │
//!     └── status (provider ID, capacity, allocatable) ◀── orchestrator
//!
//! InstanceType
//!   ├── requirements (instance-type, arch, os, capacity-type, category)
//!   ├── capacity / overhead → allocatable
//!   └── offerings (zone, price)
//!
//! MetricsSink ← write-only counters and gauges, injected at construction
//! ```

pub mod claim;
pub mod error;
pub mod instance_type;
pub mod labels;
pub mod metrics;
pub mod nodeclass;
pub mod requirements;
pub mod resources;

pub use claim::{NodeClaim, NodeClaimStatus};
pub use error::NodeClassError;
pub use instance_type::{InstanceType, Offering};
pub use metrics::{MetricsSink, NoopMetrics};
pub use nodeclass::{Condition, ConditionStatus, NodeClass, NodeClassSpec, NodeClassStatus, SecretReference};
pub use requirements::{Operator, Requirement, Taint, TaintEffect};
pub use resources::ResourceList;
