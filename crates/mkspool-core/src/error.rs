//! Error types for core records.

use thiserror::Error;

/// Validation failures for a node class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeClassError {
    #[error("serviceName is required")]
    MissingServiceName,

    #[error("kubeId is required")]
    MissingKubeId,

    #[error("region is required")]
    MissingRegion,
}
