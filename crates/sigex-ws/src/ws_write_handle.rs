//! WebSocket write handle for sending messages.
//!
//! Provides a fire-and-forget sending API. Reply tracking is handled by
//! the [`ResponseCorrelator`](crate::correlator::ResponseCorrelator).

use crate::connection::ConnectionState;
use crate::error::{WsError, WsResult};
use crate::message::WsRequest;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound message to be sent via WebSocket.
#[derive(Debug)]
pub enum WsOutbound {
    /// Serialized request frame with its correlation id.
    Request {
        request_id: u64,
        payload: String,
    },
}

/// Write handle for sending messages to WebSocket.
///
/// Channel-based, so it stays valid across reconnects and can be cloned
/// and shared across tasks.
#[derive(Clone)]
pub struct WsWriteHandle {
    tx: mpsc::Sender<WsOutbound>,
    state: Arc<RwLock<ConnectionState>>,
    next_id: Arc<AtomicU64>,
}

impl WsWriteHandle {
    pub fn new(tx: mpsc::Sender<WsOutbound>, state: Arc<RwLock<ConnectionState>>) -> Self {
        Self {
            tx,
            state,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Reserve a fresh correlation id.
    pub fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Queue a request under a fresh id and return that id.
    ///
    /// Never waits for a reply.
    pub async fn send(&self, name: &str, msg: Value) -> WsResult<u64> {
        let request_id = self.next_request_id();
        self.send_with_id(request_id, name, msg).await?;
        Ok(request_id)
    }

    /// Queue a request under a caller-reserved id.
    ///
    /// # Errors
    ///
    /// - `WsError::SendFailed`: not connected, or the channel is closed
    pub async fn send_with_id(&self, request_id: u64, name: &str, msg: Value) -> WsResult<()> {
        if !self.is_connected() {
            return Err(WsError::SendFailed("not connected".to_string()));
        }

        let payload = serde_json::to_string(&WsRequest::new(name, request_id, msg))?;
        self.tx
            .send(WsOutbound::Request {
                request_id,
                payload,
            })
            .await
            .map_err(|_| WsError::SendFailed("channel closed".to_string()))?;

        debug!(request_id, name, "Request queued for sending");
        Ok(())
    }

    /// Returns true if the connection is open and the channel is alive.
    pub fn is_connected(&self) -> bool {
        *self.state.read() == ConnectionState::Connected && !self.tx.is_closed()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }
}
