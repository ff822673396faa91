//! Error types for signal normalization.
//!
//! Every variant is a reason a chunk of text was rejected as a signal.

use sigex_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Empty input")]
    Empty,

    #[error("Expected TIME;PAIR;DIRECTION;EXPIRY, found {found} field(s) in '{line}'")]
    MissingFields { found: usize, line: String },

    #[error("Block signal is missing its '{0}' field")]
    MissingBlockField(&'static str),

    #[error("Invalid time format: {0}")]
    InvalidTime(String),

    #[error("Invalid pair: {0}")]
    InvalidPair(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid expiry (no number found): {0}")]
    ExpiryWithoutDigits(String),

    #[error("Invalid expiry: {0}")]
    InvalidExpiry(String),

    #[error("{time} does not exist in {tz}")]
    NonexistentLocalTime { time: String, tz: String },

    #[error("Pattern compilation failed: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type SignalResult<T> = Result<T, SignalError>;
