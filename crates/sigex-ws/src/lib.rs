//! WebSocket transport for the sigex venue connection.
//!
//! Provides:
//! - A connection manager with bounded open handshake and heartbeat
//!   monitoring (no automatic reconnect; supervision is the caller's job)
//! - A channel-based write handle that never blocks on replies
//! - A response correlator matching replies to requests by `request_id`,
//!   with latched state for uncorrelated broadcasts

pub mod connection;
pub mod correlator;
pub mod error;
pub mod heartbeat;
pub mod message;
pub mod ws_write_handle;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState};
pub use correlator::{latch_key, ResponseCorrelator, DEFAULT_REQUEST_TIMEOUT_MS, MAX_ORDER_LATCHES};
pub use error::{WsError, WsResult};
pub use message::{
    names, BalancePayload, Candle, CandlesPayload, CandlesQueryPayload, OrderOutcomePayload,
    OrderPlacedPayload, OutcomeQueryPayload, PlaceOrderPayload, PositionChangedPayload, WsFrame,
    WsRequest,
};
pub use ws_write_handle::{WsOutbound, WsWriteHandle};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
