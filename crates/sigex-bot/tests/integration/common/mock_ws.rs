//! Mock venue WebSocket server for integration tests.
//!
//! Speaks the named-frame protocol:
//! - `place-order` -> `order-placed`, settling with the next scripted profit
//! - `order-outcome` -> resolved with the order's profit
//! - `get-balance` -> a fixed balance
//! - optionally broadcasts `position-changed` on placement

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Default)]
struct VenueState {
    /// Profits for the next placed orders, as decimal strings.
    script: VecDeque<String>,
    /// Order id -> profit.
    orders: HashMap<u64, String>,
    next_order_id: u64,
    received: Vec<Value>,
    connections: u32,
    broadcast_settlement: bool,
}

/// A mock venue server for testing.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    state: Arc<Mutex<VenueState>>,
}

impl MockWsServer {
    /// Start a new mock server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(VenueState {
            next_order_id: 1000,
            ..Default::default()
        }));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let state_clone = state.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(stream, state_clone.clone()));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            state,
        }
    }

    /// Get the server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Queue profits for the next placed orders.
    pub async fn script_profits(&self, profits: &[&str]) {
        let mut state = self.state.lock().await;
        state.script.extend(profits.iter().map(|p| p.to_string()));
    }

    /// Announce settlements as `position-changed` broadcasts.
    pub async fn broadcast_settlements(&self, enabled: bool) {
        self.state.lock().await.broadcast_settlement = enabled;
    }

    pub async fn connection_count(&self) -> u32 {
        self.state.lock().await.connections
    }

    /// Names of all received frames, in order.
    pub async fn received_names(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .received
            .iter()
            .filter_map(|f| f["name"].as_str().map(str::to_string))
            .collect()
    }

    /// Payloads of all received frames with `name`.
    pub async fn received_payloads(&self, name: &str) -> Vec<Value> {
        self.state
            .lock()
            .await
            .received
            .iter()
            .filter(|f| f["name"] == name)
            .map(|f| f["msg"].clone())
            .collect()
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

fn frame(name: &str, request_id: &Value, msg: Value) -> Message {
    Message::Text(json!({"name": name, "request_id": request_id, "msg": msg}).to_string())
}

async fn handle_connection(stream: TcpStream, state: Arc<Mutex<VenueState>>) {
    state.lock().await.connections += 1;

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Ok(request) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                let replies = respond(&state, &request).await;
                for reply in replies {
                    if write.send(reply).await.is_err() {
                        return;
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }
}

async fn respond(state: &Arc<Mutex<VenueState>>, request: &Value) -> Vec<Message> {
    let mut state = state.lock().await;
    state.received.push(request.clone());

    let request_id = &request["request_id"];
    let msg = &request["msg"];

    match request["name"].as_str() {
        Some("place-order") => match state.script.pop_front() {
            Some(profit) => {
                let order_id = state.next_order_id;
                state.next_order_id += 1;
                state.orders.insert(order_id, profit.clone());

                let mut replies = Vec::new();
                // Broadcast first so the settlement is latched before the
                // placement reply wakes the caller.
                if state.broadcast_settlement {
                    replies.push(frame(
                        "position-changed",
                        &Value::Null,
                        json!({"order_id": order_id.to_string(), "status": "closed", "profit": profit}),
                    ));
                }
                replies.push(frame(
                    "order-placed",
                    request_id,
                    json!({"success": true, "order_id": order_id}),
                ));
                replies
            }
            None => vec![frame(
                "order-placed",
                request_id,
                json!({"success": false, "message": "asset closed"}),
            )],
        },
        Some("order-outcome") => {
            let order_id = msg["order_id"]
                .as_str()
                .and_then(|id| id.parse::<u64>().ok())
                .unwrap_or_default();
            let outcome = match state.orders.get(&order_id) {
                Some(profit) => json!({"resolved": true, "profit": profit}),
                None => json!({"resolved": false}),
            };
            vec![frame("order-outcome", request_id, outcome)]
        }
        Some("get-balance") => vec![frame("balance", request_id, json!({"balance": "1000"}))],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockWsServer::start().await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        server.shutdown().await;
    }
}
