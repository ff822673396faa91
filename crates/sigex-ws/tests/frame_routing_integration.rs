//! Integration tests for inbound frame decoding and correlator routing.
//!
//! Feeds raw venue JSON through `WsFrame` and the correlator exactly as the
//! connection's message loop and router task do.

use parking_lot::RwLock;
use serde_json::json;
use sigex_ws::{
    latch_key, names, ConnectionState, OrderPlacedPayload, PositionChangedPayload,
    ResponseCorrelator, WsFrame, WsOutbound, WsWriteHandle,
};
use std::sync::Arc;
use tokio::sync::mpsc;

fn connected_correlator() -> (Arc<ResponseCorrelator>, mpsc::Receiver<WsOutbound>) {
    let (tx, rx) = mpsc::channel(8);
    let writer = WsWriteHandle::new(tx, Arc::new(RwLock::new(ConnectionState::Connected)));
    (Arc::new(ResponseCorrelator::new(writer, 1_000)), rx)
}

/// A reply echoing the request id as a string resolves the request.
#[tokio::test]
async fn test_place_order_reply_round_trip() {
    let (correlator, mut outbound) = connected_correlator();
    let (frame_tx, frame_rx) = mpsc::channel(8);
    correlator.spawn_router(frame_rx);

    tokio::spawn(async move {
        let Some(WsOutbound::Request { payload, .. }) = outbound.recv().await else {
            return;
        };
        let request: serde_json::Value = serde_json::from_str(&payload).expect("request json");
        assert_eq!(request["name"], names::PLACE_ORDER);
        let raw = format!(
            r#"{{"name":"order-placed","request_id":"{}","msg":{{"success":true,"order_id":4242}}}}"#,
            request["request_id"].as_str().expect("string id")
        );
        let frame: WsFrame = serde_json::from_str(&raw).expect("parse frame");
        frame_tx.send(frame).await.expect("router alive");
    });

    let reply = correlator
        .request(
            names::PLACE_ORDER,
            json!({"instrument": "EURUSD", "direction": "call", "amount": "1", "expiry_minutes": 5}),
        )
        .await
        .expect("correlated reply");

    let placed: OrderPlacedPayload = serde_json::from_value(reply).expect("payload");
    assert!(placed.success);
    assert_eq!(placed.order_reference().as_deref(), Some("4242"));
}

/// Broadcasts without a request id land in the per-order latch.
#[tokio::test]
async fn test_position_changed_broadcast_latched_per_order() {
    let (correlator, _outbound) = connected_correlator();

    let raw = r#"{
        "name": "position-changed",
        "msg": {"order_id": "abc-1", "status": "closed", "profit": "-1"}
    }"#;
    let frame: WsFrame = serde_json::from_str(raw).expect("parse frame");
    assert!(!correlator.dispatch(frame));

    let latched = correlator
        .latest(&latch_key(names::POSITION_CHANGED, "abc-1"))
        .expect("latched");
    let position: PositionChangedPayload = serde_json::from_value(latched).expect("payload");
    assert!(position.is_closed());
    assert!(position.profit.expect("profit").is_sign_negative());
}
