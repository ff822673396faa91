//! Error types for sigex-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid expiry: {0} (must be at least one minute)")]
    InvalidExpiry(u32),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
