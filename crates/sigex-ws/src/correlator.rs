//! Response correlation for the venue protocol.
//!
//! Bridges the receive loop to request/response call sites. Each request
//! registers a oneshot slot under its `request_id` before it is sent; the
//! router resolves the slot when a frame echoing that id arrives. Frames
//! without a matching id are latched by name (and by `name:order_id` when
//! the payload carries an `order_id`) so that fire-and-forget broadcasts
//! can still be awaited. Latched values may be stale: clear the latch
//! before issuing the request that is expected to refresh it. Per-order
//! latches are bounded; once `MAX_ORDER_LATCHES` are held the oldest is
//! evicted.

use crate::error::{WsError, WsResult};
use crate::message::WsFrame;
use crate::ws_write_handle::WsWriteHandle;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Default bound on a correlated reply.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2_000;

/// Per-order latches retained before the oldest is evicted.
pub const MAX_ORDER_LATCHES: usize = 1_024;

/// Latched broadcast payloads.
#[derive(Default)]
struct LatchStore {
    values: HashMap<String, Value>,
    /// Per-order keys, oldest first.
    order_keys: VecDeque<String>,
}

impl LatchStore {
    fn insert_order(&mut self, key: String, value: Value) {
        if self.values.insert(key.clone(), value).is_none() {
            self.order_keys.push_back(key);
        }
        while self.order_keys.len() > MAX_ORDER_LATCHES {
            if let Some(oldest) = self.order_keys.pop_front() {
                self.values.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        let value = self.values.remove(key)?;
        if let Some(pos) = self.order_keys.iter().position(|k| k == key) {
            self.order_keys.remove(pos);
        }
        Some(value)
    }
}

/// Removes a pending slot when its request future ends, however it ends.
struct PendingGuard<'a> {
    pending: &'a DashMap<u64, oneshot::Sender<Value>>,
    request_id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.request_id);
    }
}

/// Matches inbound frames to outstanding requests.
pub struct ResponseCorrelator {
    writer: WsWriteHandle,
    /// Pending requests by request id.
    pending: DashMap<u64, oneshot::Sender<Value>>,
    /// Latest uncorrelated payload per latch key.
    latches: parking_lot::Mutex<LatchStore>,
    latch_notify: Notify,
    request_timeout: Duration,
}

impl ResponseCorrelator {
    #[must_use]
    pub fn new(writer: WsWriteHandle, request_timeout_ms: u64) -> Self {
        Self {
            writer,
            pending: DashMap::new(),
            latches: parking_lot::Mutex::new(LatchStore::default()),
            latch_notify: Notify::new(),
            request_timeout: Duration::from_millis(request_timeout_ms),
        }
    }

    /// Send `name` with `payload` and wait for the correlated reply.
    ///
    /// # Errors
    ///
    /// - `WsError::SendFailed`: the request never left (not connected)
    /// - `WsError::Timeout`: sent, but no reply within the request timeout
    pub async fn request(&self, name: &str, payload: Value) -> WsResult<Value> {
        self.request_with_timeout(name, payload, self.request_timeout)
            .await
    }

    pub async fn request_with_timeout(
        &self,
        name: &str,
        payload: Value,
        timeout: Duration,
    ) -> WsResult<Value> {
        let request_id = self.writer.next_request_id();
        let (tx, rx) = oneshot::channel();
        // Register before sending so a fast reply cannot be missed.
        self.pending.insert(request_id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            request_id,
        };

        self.writer.send_with_id(request_id, name, payload).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(WsError::ConnectionClosed {
                code: 1006,
                reason: format!("request {request_id} abandoned"),
            }),
            Err(_) => {
                warn!(name, request_id, "Correlated request timed out");
                Err(WsError::Timeout {
                    name: name.to_string(),
                    request_id,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Send without waiting for a reply (for latch-backed operations).
    pub async fn send(&self, name: &str, payload: Value) -> WsResult<u64> {
        self.writer.send(name, payload).await
    }

    /// Route one inbound frame. Returns true if it resolved a pending request.
    pub fn dispatch(&self, frame: WsFrame) -> bool {
        if let Some(request_id) = frame.request_id() {
            if let Some((_, tx)) = self.pending.remove(&request_id) {
                trace!(request_id, name = %frame.name, "Correlated reply");
                let _ = tx.send(frame.msg);
                return true;
            }
        }

        let order_key = frame
            .order_id()
            .map(|order_id| latch_key(&frame.name, &order_id));
        {
            let mut latches = self.latches.lock();
            if let Some(key) = order_key {
                latches.insert_order(key, frame.msg.clone());
            }
            latches.values.insert(frame.name, frame.msg);
        }
        self.latch_notify.notify_waiters();
        false
    }

    /// Spawn the routing task draining the connection's inbound channel.
    pub fn spawn_router(
        self: &Arc<Self>,
        mut message_rx: mpsc::Receiver<WsFrame>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(frame) = message_rx.recv().await {
                this.dispatch(frame);
            }
            debug!("Correlator router stopped: inbound channel closed");
        })
    }

    /// Current latched value for `key`, if any.
    pub fn latest(&self, key: &str) -> Option<Value> {
        self.latches.lock().values.get(key).cloned()
    }

    /// Remove and return the latched value for `key`.
    pub fn take_latch(&self, key: &str) -> Option<Value> {
        self.latches.lock().remove(key)
    }

    pub fn clear_latch(&self, key: &str) {
        self.latches.lock().remove(key);
    }

    /// Wait until `key` holds a value, up to `timeout`.
    pub async fn wait_latch(&self, key: &str, timeout: Duration) -> WsResult<Value> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.latch_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.latest(key) {
                return Ok(value);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(WsError::Timeout {
                    name: key.to_string(),
                    request_id: 0,
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        }
    }

    /// Drop every pending request; their callers see `ConnectionClosed`.
    pub fn cancel_all(&self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn writer(&self) -> &WsWriteHandle {
        &self.writer
    }
}

/// Latch key for a broadcast about one order.
pub fn latch_key(name: &str, order_id: &str) -> String {
    format!("{name}:{order_id}")
}
