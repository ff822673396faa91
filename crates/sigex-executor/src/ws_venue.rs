//! WebSocket-backed venue.
//!
//! Translates venue operations into correlated request/reply exchanges on
//! the shared connection. Settlement may also arrive as an unsolicited
//! `position-changed` broadcast, which is checked before asking.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sigex_core::Instrument;
use sigex_ws::{
    latch_key, names, BalancePayload, Candle, CandlesPayload, CandlesQueryPayload,
    OrderOutcomePayload, OrderPlacedPayload, OutcomeQueryPayload, PlaceOrderPayload,
    PositionChangedPayload, ResponseCorrelator,
};
use tracing::{debug, warn};

use crate::error::{VenueError, VenueResult};
use crate::venue::{BoxFuture, OrderRequest, OutcomeStatus, Venue};

/// Candle width requested for the approval filter, in seconds.
const CANDLE_SIZE_SECS: u32 = 60;

/// Venue speaking the named-frame protocol through a correlator.
pub struct WsVenue {
    correlator: Arc<ResponseCorrelator>,
    candles_timeout: Duration,
}

impl WsVenue {
    #[must_use]
    pub fn new(correlator: Arc<ResponseCorrelator>) -> Self {
        Self {
            correlator,
            candles_timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_candles_timeout(mut self, timeout: Duration) -> Self {
        self.candles_timeout = timeout;
        self
    }

    fn decode<T: DeserializeOwned>(name: &str, value: Value) -> VenueResult<T> {
        serde_json::from_value(value)
            .map_err(|e| VenueError::Protocol(format!("bad {name} reply: {e}")))
    }

    fn to_value<T: serde::Serialize>(payload: &T) -> VenueResult<Value> {
        serde_json::to_value(payload).map_err(|e| VenueError::Protocol(e.to_string()))
    }

    /// Settlement seen on the broadcast channel, if any. A closed settlement
    /// is consumed from the latch.
    fn settled_by_broadcast(&self, order_reference: &str) -> Option<Decimal> {
        let key = latch_key(names::POSITION_CHANGED, order_reference);
        let value = self.correlator.latest(&key)?;
        match serde_json::from_value::<PositionChangedPayload>(value) {
            Ok(change) if change.is_closed() => {
                self.correlator.clear_latch(&key);
                change.profit
            }
            Ok(_) => None,
            Err(e) => {
                warn!(order_reference, error = %e, "Undecodable position-changed broadcast");
                self.correlator.clear_latch(&key);
                None
            }
        }
    }
}

impl Venue for WsVenue {
    fn place_order(&self, order: OrderRequest) -> BoxFuture<'_, VenueResult<String>> {
        Box::pin(async move {
            let payload = Self::to_value(&PlaceOrderPayload {
                instrument: order.instrument.to_string(),
                direction: order.direction.as_wire().to_string(),
                amount: order.stake,
                expiry_minutes: order.expiry_minutes,
            })?;

            let reply = self.correlator.request(names::PLACE_ORDER, payload).await?;
            let placed: OrderPlacedPayload = Self::decode(names::PLACE_ORDER, reply)?;

            if !placed.success {
                return Err(VenueError::SubmissionFailure(
                    placed
                        .message
                        .unwrap_or_else(|| "order refused".to_string()),
                ));
            }
            let order_reference = placed.order_reference().ok_or_else(|| {
                VenueError::SubmissionFailure("accepted without order id".to_string())
            })?;

            debug!(
                order_reference = %order_reference,
                instrument = %order.instrument,
                stake = %order.stake,
                "Order placed"
            );
            Ok(order_reference)
        })
    }

    fn query_outcome(&self, order_reference: String) -> BoxFuture<'_, VenueResult<OutcomeStatus>> {
        Box::pin(async move {
            if let Some(profit) = self.settled_by_broadcast(&order_reference) {
                return Ok(OutcomeStatus::resolved(profit));
            }

            let payload = Self::to_value(&OutcomeQueryPayload {
                order_id: order_reference.clone(),
            })?;
            let reply = self
                .correlator
                .request(names::ORDER_OUTCOME, payload)
                .await?;
            let outcome: OrderOutcomePayload = Self::decode(names::ORDER_OUTCOME, reply)?;

            match (outcome.resolved, outcome.profit) {
                (true, Some(profit)) => {
                    // Drop any open-position broadcast still held for this order.
                    self.correlator
                        .clear_latch(&latch_key(names::POSITION_CHANGED, &order_reference));
                    Ok(OutcomeStatus::resolved(profit))
                }
                (true, None) => Err(VenueError::Protocol(
                    "resolved outcome without profit".to_string(),
                )),
                (false, _) => Ok(OutcomeStatus::pending()),
            }
        })
    }

    fn balance(&self) -> BoxFuture<'_, VenueResult<Decimal>> {
        Box::pin(async move {
            let reply = self
                .correlator
                .request(names::GET_BALANCE, Value::Object(Default::default()))
                .await?;
            let balance: BalancePayload = Self::decode(names::GET_BALANCE, reply)?;
            Ok(balance.balance)
        })
    }

    fn recent_candles(
        &self,
        instrument: Instrument,
        count: u32,
    ) -> BoxFuture<'_, VenueResult<Vec<Candle>>> {
        Box::pin(async move {
            let payload = Self::to_value(&CandlesQueryPayload {
                instrument: instrument.to_string(),
                count,
                size: CANDLE_SIZE_SECS,
            })?;

            // Candles arrive as a broadcast, not a correlated reply.
            self.correlator.clear_latch(names::CANDLES);
            self.correlator.send(names::GET_CANDLES, payload).await?;
            let value = self
                .correlator
                .wait_latch(names::CANDLES, self.candles_timeout)
                .await?;
            let candles: CandlesPayload = Self::decode(names::CANDLES, value)?;
            Ok(candles.candles)
        })
    }
}
