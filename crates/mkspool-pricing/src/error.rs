//! Error types for catalog retrieval.
//!
//! These never reach price lookups; the cache degrades to an estimate.

use thiserror::Error;

pub type PricingResult<T> = Result<T, PricingError>;

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("fetching pricing catalog: {0}")]
    Fetch(String),

    #[error("pricing API returned status {0}")]
    Status(u16),

    #[error("decoding pricing catalog: {0}")]
    Decode(String),

    #[error("pricing refresh cancelled")]
    Cancelled,

    #[error("pricing refresh suppressed after recent failure")]
    CoolingDown,
}
