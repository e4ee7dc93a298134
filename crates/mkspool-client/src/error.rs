//! Remote API error types and their retry classification.

use std::fmt;

use thiserror::Error;

/// Result type alias for remote API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Network-level failure class, decided where the failure is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Connection refused or unreachable.
    Connect,
    /// Connection reset by peer.
    Reset,
    Timeout,
    /// Temporary name resolution failure.
    Dns,
    Other,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::Connect => "connection refused",
            TransportKind::Reset => "connection reset",
            TransportKind::Timeout => "timeout",
            TransportKind::Dns => "temporary failure in name resolution",
            TransportKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Errors returned by the remote pool API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("remote API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error ({kind}): {message}")]
    Transport { kind: TransportKind, message: String },

    #[error("decoding response: {0}")]
    Decode(String),

    #[error("encoding request: {0}")]
    Encode(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<ApiError>,
    },

    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    /// Rate limiting, server errors and transient network failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            ApiError::Transport { kind, .. } => !matches!(kind, TransportKind::Other),
            _ => false,
        }
    }

    /// The addressed entity does not exist on the remote side.
    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => *status == 404,
            ApiError::RetriesExhausted { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Short label used for the `status` metric dimension.
    pub fn status_label(&self) -> String {
        match self {
            ApiError::Status { status, .. } => status.to_string(),
            ApiError::Transport { .. } => "transport_error".to_string(),
            ApiError::Decode(_) | ApiError::Encode(_) => "codec_error".to_string(),
            ApiError::Cancelled => "cancelled".to_string(),
            ApiError::RetriesExhausted { source, .. } => source.status_label(),
            ApiError::InvalidConfig(_) => "invalid_config".to_string(),
        }
    }
}
