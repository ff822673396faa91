//! WebSocket error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("No response to {name} (request_id={request_id}) within {timeout_ms}ms")]
    Timeout {
        name: String,
        request_id: u64,
        timeout_ms: u64,
    },

    #[error("Message parse error: {0}")]
    ParseError(String),

    #[error("Heartbeat timeout")]
    HeartbeatTimeout,

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WsError {
    /// True when the failure happened before anything reached the venue.
    pub fn is_pre_send(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::SendFailed(_))
    }
}

pub type WsResult<T> = Result<T, WsError>;
