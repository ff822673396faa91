//! Optional pre-trade approval filter.

use sigex_core::{Direction, Instrument};
use sigex_ws::Candle;

/// Market context handed to the approver.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleContext {
    pub instrument: Instrument,
    /// Recent candles, oldest first. Empty when the venue had none.
    pub candles: Vec<Candle>,
}

impl CandleContext {
    #[must_use]
    pub fn empty(instrument: Instrument) -> Self {
        Self {
            instrument,
            candles: Vec::new(),
        }
    }

    pub fn last_close(&self) -> Option<rust_decimal::Decimal> {
        self.candles.last().map(|c| c.close)
    }
}

/// Synchronous go/no-go predicate consulted once before the first attempt.
#[cfg_attr(test, mockall::automock)]
pub trait SignalApprover: Send + Sync {
    fn approve(&self, context: &CandleContext, direction: Direction) -> bool;
}

/// Approver that accepts every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysApprove;

impl SignalApprover for AlwaysApprove {
    fn approve(&self, _context: &CandleContext, _direction: Direction) -> bool {
        true
    }
}
