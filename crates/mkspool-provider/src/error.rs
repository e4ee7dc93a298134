//! Orchestrator error types.

use std::time::Duration;

use thiserror::Error;

use mkspool_client::ApiError;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The claim, its pool or its node no longer exists. Callers stop
    /// tracking the entity.
    #[error("nodeclaim not found: {0}")]
    NodeClaimNotFound(String),

    #[error("insufficient capacity: {0}")]
    InsufficientCapacity(String),

    #[error("node class not ready: {0}")]
    NodeClassNotReady(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("timed out after {}s waiting for a ready node in pool {pool_id}", .after.as_secs())]
    Timeout { pool_id: String, after: Duration },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{context}: {source}")]
    Api {
        context: String,
        #[source]
        source: ApiError,
    },
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NodeClaimNotFound(_))
    }

    /// Wrap a remote failure; cancellation keeps its own variant.
    pub fn api(context: impl Into<String>, source: ApiError) -> Self {
        match source {
            ApiError::Cancelled => ProviderError::Cancelled,
            source => ProviderError::Api {
                context: context.into(),
                source,
            },
        }
    }
}

/// How a Delete concluded. Every variant means the instance is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The pool held the last node and was removed.
    PoolDeleted,
    /// The pool's desired count was decremented.
    ScaledDown,
    /// The pool no longer existed.
    AlreadyGone,
}
