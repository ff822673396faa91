//! Error types for the execution engine.

use sigex_ws::WsError;
use thiserror::Error;

/// Failure of one venue operation.
#[derive(Debug, Clone, Error)]
pub enum VenueError {
    /// Venue refused the order (unknown or closed instrument, bad stake).
    /// Nothing was committed.
    #[error("Submission failure: {0}")]
    SubmissionFailure(String),

    /// Request sent but no reply in time; the venue may have acted on it.
    #[error("Venue timeout: {0}")]
    Timeout(String),

    /// Request never reached the venue.
    #[error("Venue connection error: {0}")]
    Connection(String),

    /// Reply did not have the expected shape.
    #[error("Venue protocol error: {0}")]
    Protocol(String),
}

impl From<WsError> for VenueError {
    fn from(e: WsError) -> Self {
        match e {
            WsError::Timeout { .. } => Self::Timeout(e.to_string()),
            WsError::Json(_) | WsError::ParseError(_) => Self::Protocol(e.to_string()),
            _ => Self::Connection(e.to_string()),
        }
    }
}

pub type VenueResult<T> = Result<T, VenueError>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Invalid trading settings: {0}")]
    InvalidSettings(String),

    /// Escalated stake exceeds the representable range.
    #[error("Stake overflow: {0}")]
    StakeOverflow(String),

    #[error(transparent)]
    Venue(#[from] VenueError),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_error_mapping() {
        let timeout = WsError::Timeout {
            name: "place-order".to_string(),
            request_id: 3,
            timeout_ms: 2000,
        };
        assert!(matches!(VenueError::from(timeout), VenueError::Timeout(_)));

        let not_connected = WsError::SendFailed("not connected".to_string());
        assert!(matches!(
            VenueError::from(not_connected),
            VenueError::Connection(_)
        ));

        let bad_json = WsError::ParseError("missing field".to_string());
        assert!(matches!(VenueError::from(bad_json), VenueError::Protocol(_)));
    }
}
