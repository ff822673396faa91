//! WebSocket connection manager.
//!
//! Owns the single physical connection to the venue. `connect()` performs
//! the open handshake under a bounded timeout and spawns the message loop;
//! the loop decodes inbound frames onto a channel, writes queued outbound
//! requests, and runs the heartbeat. When the socket closes or errors the
//! state flips to `Disconnected` and the loop exits. Reconnecting is the
//! caller's job.

use crate::error::{WsError, WsResult};
use crate::heartbeat::HeartbeatManager;
use crate::message::WsFrame;
use crate::ws_write_handle::{WsOutbound, WsWriteHandle};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Bound on the open handshake.
    pub open_timeout_ms: u64,
    /// Idle time before a ping is sent.
    pub heartbeat_interval_ms: u64,
    /// Heartbeat timeout (pong must arrive within this).
    pub heartbeat_timeout_ms: u64,
    /// Capacity of the outbound request queue.
    pub outbound_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            open_timeout_ms: 10_000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 10_000,
            outbound_buffer: 100,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    heartbeat: Arc<HeartbeatManager>,
    message_tx: mpsc::Sender<WsFrame>,
    write_handle: WsWriteHandle,
    /// Outbound message receiver (consumed by message loop).
    outbound_rx: Arc<TokioMutex<mpsc::Receiver<WsOutbound>>>,
    /// Cancels everything, permanently.
    shutdown_token: CancellationToken,
    /// Cancels the current connection's message loop only.
    connection_token: Mutex<Option<CancellationToken>>,
}

impl ConnectionManager {
    /// Create a new connection manager. Decoded inbound frames are
    /// delivered on `message_tx`.
    pub fn new(config: ConnectionConfig, message_tx: mpsc::Sender<WsFrame>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer);
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        Self {
            heartbeat: Arc::new(HeartbeatManager::new(
                config.heartbeat_interval_ms,
                config.heartbeat_timeout_ms,
            )),
            write_handle: WsWriteHandle::new(outbound_tx, state.clone()),
            config,
            state,
            message_tx,
            outbound_rx: Arc::new(TokioMutex::new(outbound_rx)),
            shutdown_token: CancellationToken::new(),
            connection_token: Mutex::new(None),
        }
    }

    /// Get a write handle for sending messages.
    pub fn write_handle(&self) -> WsWriteHandle {
        self.write_handle.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Observable open flag.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Signal graceful shutdown. The message loop sends a Close frame and
    /// exits; further `connect()` calls fail.
    pub fn shutdown(&self) {
        info!("ConnectionManager shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Serialize and queue a request; returns its correlation id.
    pub async fn send(&self, name: &str, msg: Value) -> WsResult<u64> {
        self.write_handle.send(name, msg).await
    }

    /// Establish the connection and spawn the message loop.
    ///
    /// Returns once the open handshake completes. No-op if already open.
    ///
    /// # Errors
    ///
    /// `WsError::ConnectionFailed` if the handshake fails or does not
    /// complete within `open_timeout_ms`, or after shutdown.
    pub async fn connect(self: &Arc<Self>) -> WsResult<()> {
        if self.is_shutdown() {
            return Err(WsError::ConnectionFailed("shutdown requested".to_string()));
        }
        if self.is_open() {
            return Ok(());
        }

        *self.state.write() = ConnectionState::Connecting;
        info!(url = %self.config.url, "Connecting to WebSocket");

        let open_timeout = Duration::from_millis(self.config.open_timeout_ms);
        let handshake = connect_async_tls_with_config(&self.config.url, None, true, None);
        let ws_stream = match tokio::time::timeout(open_timeout, handshake).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                *self.state.write() = ConnectionState::Disconnected;
                error!(?e, "WebSocket handshake failed");
                return Err(WsError::ConnectionFailed(e.to_string()));
            }
            Err(_) => {
                *self.state.write() = ConnectionState::Disconnected;
                error!(
                    timeout_ms = self.config.open_timeout_ms,
                    "Timeout waiting for WebSocket handshake"
                );
                return Err(WsError::ConnectionFailed(format!(
                    "no open handshake within {}ms",
                    self.config.open_timeout_ms
                )));
            }
        };

        self.drain_stale_outbound().await;
        self.heartbeat.reset();

        let token = self.shutdown_token.child_token();
        if let Some(previous) = self.connection_token.lock().replace(token.clone()) {
            previous.cancel();
        }

        *self.state.write() = ConnectionState::Connected;
        info!("WebSocket connected");

        let (write, read) = ws_stream.split();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.message_loop(write, read, &token).await {
                Ok(()) => info!("WebSocket connection closed"),
                Err(e) => error!(?e, "WebSocket connection error"),
            }
            // A newer connection may already own the state.
            if !token.is_cancelled() || this.is_shutdown() {
                *this.state.write() = ConnectionState::Disconnected;
            }
        });

        Ok(())
    }

    /// Drop requests queued while no connection was up; their callers
    /// have already timed out.
    async fn drain_stale_outbound(&self) {
        let mut rx = self.outbound_rx.lock().await;
        let mut dropped = 0usize;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "Discarded stale outbound requests");
        }
    }

    async fn message_loop(
        &self,
        mut write: WsSink,
        mut read: WsSource,
        token: &CancellationToken,
    ) -> WsResult<()> {
        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                biased;

                () = token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.heartbeat.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                outbound = outbound_recv => {
                    if let Some(WsOutbound::Request { request_id, payload }) = outbound {
                        write.send(Message::Text(payload)).await?;
                        debug!(request_id, "Request sent to WebSocket");
                    }
                }

                _ = self.heartbeat.wait_for_check() => {
                    if self.heartbeat.is_timed_out() {
                        error!("Heartbeat timeout");
                        return Err(WsError::HeartbeatTimeout);
                    }

                    if self.heartbeat.should_send_heartbeat() {
                        write.send(Message::Ping(Vec::new())).await?;
                        self.heartbeat.record_ping();
                        debug!("Sent heartbeat ping");
                    }
                }
            }
        }
    }

    /// Decode one text frame and forward it. Undecodable frames are
    /// logged and dropped; they never close the connection.
    async fn handle_text_message(&self, text: &str) {
        self.heartbeat.record_message();

        let frame: WsFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Dropping undecodable frame");
                return;
            }
        };

        if self.message_tx.send(frame).await.is_err() {
            warn!("Message receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.open_timeout_ms, 10_000);
        assert_eq!(config.heartbeat_interval_ms, 30_000);
    }

    #[tokio::test]
    async fn test_initial_state() {
        let (tx, _rx) = mpsc::channel(10);
        let manager = ConnectionManager::new(ConnectionConfig::default(), tx);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_open());
        assert!(!manager.write_handle().is_connected());
    }

    #[tokio::test]
    async fn test_connect_refused_fails() {
        let (tx, _rx) = mpsc::channel(10);
        let config = ConnectionConfig {
            // Port 9 (discard) is closed on test hosts.
            url: "ws://127.0.0.1:9".to_string(),
            open_timeout_ms: 2_000,
            ..Default::default()
        };
        let manager = Arc::new(ConnectionManager::new(config, tx));

        let result = manager.connect().await;
        assert!(matches!(result, Err(WsError::ConnectionFailed(_))));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_stalled_handshake_times_out() {
        // Accepts TCP but never answers the upgrade request.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let acceptor = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let (tx, _rx) = mpsc::channel(10);
        let config = ConnectionConfig {
            url: format!("ws://{addr}"),
            open_timeout_ms: 300,
            ..Default::default()
        };
        let manager = Arc::new(ConnectionManager::new(config, tx));

        let started = std::time::Instant::now();
        let result = manager.connect().await;
        let elapsed = started.elapsed();

        match result {
            Err(WsError::ConnectionFailed(reason)) => {
                assert!(reason.contains("no open handshake within 300ms"), "{reason}");
            }
            other => panic!("expected handshake timeout, got {other:?}"),
        }
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_secs(2));
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        acceptor.abort();
    }

    #[tokio::test]
    async fn test_connect_after_shutdown_fails() {
        let (tx, _rx) = mpsc::channel(10);
        let manager = Arc::new(ConnectionManager::new(ConnectionConfig::default(), tx));
        manager.shutdown();

        assert!(manager.is_shutdown());
        assert!(matches!(
            manager.connect().await,
            Err(WsError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_send_while_disconnected_fails() {
        let (tx, _rx) = mpsc::channel(10);
        let manager = ConnectionManager::new(ConnectionConfig::default(), tx);
        let result = manager.send("get-balance", serde_json::json!({})).await;
        assert!(matches!(result, Err(WsError::SendFailed(_))));
    }
}
