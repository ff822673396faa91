//! Venue wrapper recording request timeouts.

use rust_decimal::Decimal;
use sigex_core::Instrument;
use sigex_executor::{
    BoxFuture, DynVenue, OrderRequest, OutcomeStatus, Venue, VenueError, VenueResult,
};
use sigex_telemetry::Metrics;
use sigex_ws::{names, Candle};

pub struct MeteredVenue {
    inner: DynVenue,
}

impl MeteredVenue {
    #[must_use]
    pub fn new(inner: DynVenue) -> Self {
        Self { inner }
    }
}

fn observe<T>(name: &str, result: VenueResult<T>) -> VenueResult<T> {
    if let Err(VenueError::Timeout(_)) = &result {
        Metrics::request_timeout(name);
    }
    result
}

impl Venue for MeteredVenue {
    fn place_order(&self, order: OrderRequest) -> BoxFuture<'_, VenueResult<String>> {
        Box::pin(async move { observe(names::PLACE_ORDER, self.inner.place_order(order).await) })
    }

    fn query_outcome(&self, order_reference: String) -> BoxFuture<'_, VenueResult<OutcomeStatus>> {
        Box::pin(async move {
            observe(
                names::ORDER_OUTCOME,
                self.inner.query_outcome(order_reference).await,
            )
        })
    }

    fn balance(&self) -> BoxFuture<'_, VenueResult<Decimal>> {
        Box::pin(async move { observe(names::GET_BALANCE, self.inner.balance().await) })
    }

    fn recent_candles(
        &self,
        instrument: Instrument,
        count: u32,
    ) -> BoxFuture<'_, VenueResult<Vec<Candle>>> {
        Box::pin(async move {
            observe(
                names::GET_CANDLES,
                self.inner.recent_candles(instrument, count).await,
            )
        })
    }
}
