//! Venue abstraction for order execution.
//!
//! The engine needs exactly three operations from the venue (place an
//! order, query its outcome, read the balance) plus recent candles for the
//! approval filter. The trait keeps the engine independent of the
//! transport and lets tests script outcomes.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use sigex_core::{Direction, Instrument};
use sigex_ws::Candle;
use tokio::time::Instant;

use crate::error::{VenueError, VenueResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Order to place for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub instrument: Instrument,
    pub direction: Direction,
    pub stake: Decimal,
    pub expiry_minutes: u32,
}

/// Outcome query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeStatus {
    pub resolved: bool,
    /// Signed profit; meaningful only when resolved.
    pub profit: Decimal,
}

impl OutcomeStatus {
    #[must_use]
    pub fn pending() -> Self {
        Self {
            resolved: false,
            profit: Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn resolved(profit: Decimal) -> Self {
        Self {
            resolved: true,
            profit,
        }
    }
}

/// Trait for talking to the trading venue.
pub trait Venue: Send + Sync {
    /// Place an order; returns the venue's order reference.
    fn place_order(&self, order: OrderRequest) -> BoxFuture<'_, VenueResult<String>>;

    /// Ask whether an order has settled.
    fn query_outcome(&self, order_reference: String) -> BoxFuture<'_, VenueResult<OutcomeStatus>>;

    /// Current account balance.
    fn balance(&self) -> BoxFuture<'_, VenueResult<Decimal>>;

    /// Most recent candles for `instrument`, oldest first.
    fn recent_candles(
        &self,
        _instrument: Instrument,
        _count: u32,
    ) -> BoxFuture<'_, VenueResult<Vec<Candle>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Arc wrapper for Venue trait objects.
pub type DynVenue = Arc<dyn Venue>;

// ============================================================================
// MockVenue
// ============================================================================

/// What the mock venue does with the next placed order.
#[derive(Debug, Clone)]
pub enum ScriptedOrder {
    /// Accept; the outcome resolves with this profit after the settle delay.
    Settle(Decimal),
    /// Accept; the outcome never resolves.
    NeverSettle,
    /// Refuse with this message.
    Reject(String),
    /// Report a placement timeout.
    PlacementTimeout,
}

#[derive(Debug)]
struct MockOrder {
    profit: Option<Decimal>,
    settles_at: Instant,
}

/// Scripted venue for testing.
#[derive(Debug)]
pub struct MockVenue {
    script: Mutex<VecDeque<ScriptedOrder>>,
    orders: Mutex<HashMap<String, MockOrder>>,
    /// Recorded placements for verification.
    placed: Mutex<Vec<OrderRequest>>,
    balance: Mutex<Decimal>,
    candles: Mutex<Vec<Candle>>,
    settle_delay: Mutex<Duration>,
    balance_available: AtomicBool,
    next_order_id: AtomicU64,
    outcome_queries: AtomicU64,
}

impl Default for MockVenue {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVenue {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            orders: Mutex::new(HashMap::new()),
            placed: Mutex::new(Vec::new()),
            balance: Mutex::new(Decimal::from(1000)),
            candles: Mutex::new(Vec::new()),
            settle_delay: Mutex::new(Duration::ZERO),
            balance_available: AtomicBool::new(true),
            next_order_id: AtomicU64::new(1),
            outcome_queries: AtomicU64::new(0),
        }
    }

    /// Create a mock whose next orders follow `script`, in order.
    pub fn with_script(script: impl IntoIterator<Item = ScriptedOrder>) -> Self {
        let venue = Self::new();
        venue.push_script(script);
        venue
    }

    pub fn push_script(&self, script: impl IntoIterator<Item = ScriptedOrder>) {
        self.script.lock().extend(script);
    }

    /// Delay between placement and settlement of accepted orders.
    pub fn set_settle_delay(&self, delay: Duration) {
        *self.settle_delay.lock() = delay;
    }

    pub fn set_candles(&self, candles: Vec<Candle>) {
        *self.candles.lock() = candles;
    }

    pub fn set_balance_available(&self, available: bool) {
        self.balance_available.store(available, Ordering::SeqCst);
    }

    /// Get recorded placements.
    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.placed.lock().clone()
    }

    pub fn outcome_query_count(&self) -> u64 {
        self.outcome_queries.load(Ordering::SeqCst)
    }
}

impl Venue for MockVenue {
    fn place_order(&self, order: OrderRequest) -> BoxFuture<'_, VenueResult<String>> {
        Box::pin(async move {
            let next = self.script.lock().pop_front().ok_or_else(|| {
                VenueError::SubmissionFailure("no scripted order left".to_string())
            })?;

            let profit = match next {
                ScriptedOrder::Reject(message) => {
                    return Err(VenueError::SubmissionFailure(message))
                }
                ScriptedOrder::PlacementTimeout => {
                    return Err(VenueError::Timeout("place-order".to_string()))
                }
                ScriptedOrder::Settle(profit) => Some(profit),
                ScriptedOrder::NeverSettle => None,
            };

            self.placed.lock().push(order);
            let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst).to_string();
            let settles_at = Instant::now() + *self.settle_delay.lock();
            self.orders
                .lock()
                .insert(order_id.clone(), MockOrder { profit, settles_at });
            Ok(order_id)
        })
    }

    fn query_outcome(&self, order_reference: String) -> BoxFuture<'_, VenueResult<OutcomeStatus>> {
        Box::pin(async move {
            self.outcome_queries.fetch_add(1, Ordering::SeqCst);
            let orders = self.orders.lock();
            let order = orders.get(&order_reference).ok_or_else(|| {
                VenueError::Protocol(format!("unknown order {order_reference}"))
            })?;

            match order.profit {
                Some(profit) if Instant::now() >= order.settles_at => {
                    Ok(OutcomeStatus::resolved(profit))
                }
                _ => Ok(OutcomeStatus::pending()),
            }
        })
    }

    fn balance(&self) -> BoxFuture<'_, VenueResult<Decimal>> {
        Box::pin(async move {
            if !self.balance_available.load(Ordering::SeqCst) {
                return Err(VenueError::Timeout("get-balance".to_string()));
            }
            let settled: Decimal = self
                .orders
                .lock()
                .values()
                .filter(|o| Instant::now() >= o.settles_at)
                .filter_map(|o| o.profit)
                .sum();
            Ok(*self.balance.lock() + settled)
        })
    }

    fn recent_candles(
        &self,
        _instrument: Instrument,
        count: u32,
    ) -> BoxFuture<'_, VenueResult<Vec<Candle>>> {
        Box::pin(async move {
            let candles = self.candles.lock();
            let skip = candles.len().saturating_sub(count as usize);
            Ok(candles[skip..].to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(stake: Decimal) -> OrderRequest {
        OrderRequest {
            instrument: Instrument::new("EURUSD").unwrap(),
            direction: Direction::Call,
            stake,
            expiry_minutes: 1,
        }
    }

    #[tokio::test]
    async fn test_mock_venue_follows_script() {
        let venue = MockVenue::with_script([
            ScriptedOrder::Settle(dec!(-1)),
            ScriptedOrder::Reject("asset closed".to_string()),
        ]);

        let id = venue.place_order(order(dec!(1))).await.unwrap();
        let status = venue.query_outcome(id).await.unwrap();
        assert_eq!(status, OutcomeStatus::resolved(dec!(-1)));

        let err = venue.place_order(order(dec!(2))).await.unwrap_err();
        assert!(matches!(err, VenueError::SubmissionFailure(ref m) if m == "asset closed"));

        // Rejected orders are not recorded as placed.
        assert_eq!(venue.placed_orders().len(), 1);
        assert_eq!(venue.balance().await.unwrap(), dec!(999));
    }

    #[tokio::test]
    async fn test_mock_venue_settle_delay() {
        let venue = MockVenue::with_script([ScriptedOrder::Settle(dec!(0.8))]);
        venue.set_settle_delay(Duration::from_millis(50));

        let id = venue.place_order(order(dec!(1))).await.unwrap();
        assert!(!venue.query_outcome(id.clone()).await.unwrap().resolved);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(venue.query_outcome(id).await.unwrap().resolved);
        assert_eq!(venue.outcome_query_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_venue_empty_script_rejects() {
        let venue = MockVenue::new();
        assert!(matches!(
            venue.place_order(order(dec!(1))).await,
            Err(VenueError::SubmissionFailure(_))
        ));
    }
}
