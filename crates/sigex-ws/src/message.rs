//! WebSocket message types.
//!
//! Every frame on the venue connection is a JSON object
//! `{"name": ..., "request_id": ..., "msg": {...}}`. Replies to a request
//! echo its `request_id`; broadcasts carry none.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Frame envelopes
// ============================================================================

/// Outbound request frame.
#[derive(Debug, Clone, Serialize)]
pub struct WsRequest {
    /// Operation name (e.g., "place-order").
    pub name: String,
    /// Correlation id, echoed by the venue in its reply.
    pub request_id: String,
    /// Operation payload.
    pub msg: Value,
}

impl WsRequest {
    pub fn new(name: impl Into<String>, request_id: u64, msg: Value) -> Self {
        Self {
            name: name.into(),
            request_id: request_id.to_string(),
            msg,
        }
    }
}

/// Inbound frame from the venue.
#[derive(Debug, Clone, Deserialize)]
pub struct WsFrame {
    pub name: String,
    /// Echoed request id; absent on broadcasts. Venues send it as either
    /// a string or a number.
    #[serde(default)]
    pub request_id: Option<Value>,
    #[serde(default)]
    pub msg: Value,
}

impl WsFrame {
    /// Parsed correlation id, if the frame carries one.
    pub fn request_id(&self) -> Option<u64> {
        match self.request_id.as_ref()? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// `order_id` field of the payload, as a string.
    pub fn order_id(&self) -> Option<String> {
        match self.msg.get("order_id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

// ============================================================================
// Operation names
// ============================================================================

pub mod names {
    pub const PLACE_ORDER: &str = "place-order";
    pub const ORDER_OUTCOME: &str = "order-outcome";
    pub const GET_BALANCE: &str = "get-balance";
    pub const GET_CANDLES: &str = "get-candles";
    /// Broadcast: an order's position opened or closed.
    pub const POSITION_CHANGED: &str = "position-changed";
    /// Broadcast: reply to `get-candles` (not correlated).
    pub const CANDLES: &str = "candles";
}

// ============================================================================
// Payloads
// ============================================================================

/// `place-order` request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderPayload {
    pub instrument: String,
    /// "call" or "put".
    pub direction: String,
    pub amount: Decimal,
    pub expiry_minutes: u32,
}

/// Reply to `place-order`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPlacedPayload {
    pub success: bool,
    #[serde(default)]
    pub order_id: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl OrderPlacedPayload {
    /// Order id as a string, whatever JSON type the venue used.
    pub fn order_reference(&self) -> Option<String> {
        match self.order_id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// `order-outcome` request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeQueryPayload {
    pub order_id: String,
}

/// Reply to `order-outcome`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderOutcomePayload {
    pub resolved: bool,
    #[serde(default)]
    pub profit: Option<Decimal>,
}

/// Reply to `get-balance`.
#[derive(Debug, Clone, Deserialize)]
pub struct BalancePayload {
    pub balance: Decimal,
}

/// `position-changed` broadcast payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionChangedPayload {
    /// "open" or "closed".
    pub status: String,
    #[serde(default)]
    pub profit: Option<Decimal>,
}

impl PositionChangedPayload {
    pub fn is_closed(&self) -> bool {
        self.status.eq_ignore_ascii_case("closed")
    }
}

/// `get-candles` request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandlesQueryPayload {
    pub instrument: String,
    pub count: u32,
    /// Candle width in seconds.
    pub size: u32,
}

/// One OHLC candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time, seconds since Unix epoch.
    pub from: i64,
    pub open: Decimal,
    pub close: Decimal,
    #[serde(alias = "max")]
    pub high: Decimal,
    #[serde(alias = "min")]
    pub low: Decimal,
    #[serde(default)]
    pub volume: Decimal,
}

/// `candles` broadcast payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CandlesPayload {
    #[serde(default)]
    pub candles: Vec<Candle>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = WsRequest::new("get-balance", 42, json!({}));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["name"], "get-balance");
        assert_eq!(value["request_id"], "42");
        assert_eq!(value["msg"], json!({}));
    }

    #[test]
    fn test_frame_request_id_string_or_number() {
        let frame: WsFrame =
            serde_json::from_str(r#"{"name":"order-placed","request_id":"7","msg":{}}"#).unwrap();
        assert_eq!(frame.request_id(), Some(7));

        let frame: WsFrame =
            serde_json::from_str(r#"{"name":"order-placed","request_id":7,"msg":{}}"#).unwrap();
        assert_eq!(frame.request_id(), Some(7));

        let frame: WsFrame =
            serde_json::from_str(r#"{"name":"position-changed","msg":{"order_id":99}}"#).unwrap();
        assert_eq!(frame.request_id(), None);
        assert_eq!(frame.order_id().as_deref(), Some("99"));
    }

    #[test]
    fn test_frame_tolerates_missing_msg() {
        let frame: WsFrame = serde_json::from_str(r#"{"name":"heartbeat"}"#).unwrap();
        assert_eq!(frame.name, "heartbeat");
        assert!(frame.msg.is_null());
    }

    #[test]
    fn test_order_placed_reference() {
        let placed: OrderPlacedPayload =
            serde_json::from_value(json!({"success": true, "order_id": 12345})).unwrap();
        assert_eq!(placed.order_reference().as_deref(), Some("12345"));

        let rejected: OrderPlacedPayload = serde_json::from_value(
            json!({"success": false, "order_id": "", "message": "active is suspended"}),
        )
        .unwrap();
        assert!(!rejected.success);
        assert_eq!(rejected.order_reference(), None);
        assert_eq!(rejected.message.as_deref(), Some("active is suspended"));
    }

    #[test]
    fn test_outcome_and_position_payloads() {
        let outcome: OrderOutcomePayload =
            serde_json::from_value(json!({"resolved": true, "profit": "-1"})).unwrap();
        assert!(outcome.resolved);
        assert_eq!(outcome.profit, Some(dec!(-1)));

        let pos: PositionChangedPayload =
            serde_json::from_value(json!({"status": "closed", "profit": "1.6"})).unwrap();
        assert!(pos.is_closed());
        assert_eq!(pos.profit, Some(dec!(1.6)));
    }

    #[test]
    fn test_candle_aliases() {
        let candle: Candle = serde_json::from_value(json!({
            "from": 1700000000,
            "open": "1.1", "close": "1.2", "max": "1.3", "min": "1.0"
        }))
        .unwrap();
        assert_eq!(candle.high, dec!(1.3));
        assert_eq!(candle.low, dec!(1.0));
        assert_eq!(candle.volume, Decimal::ZERO);
    }
}
