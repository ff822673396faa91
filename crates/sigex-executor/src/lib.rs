//! Signal trade execution for sigex.
//!
//! Turns one normalized `Signal` into an `ExecutionRun` at the venue.
//!
//! # Key Components
//!
//! - [`TradeEngine`]: the per-signal state machine (attempt, await outcome, escalate)
//! - [`ActiveTradeRegistry`]: duplicate-trade suppression per (instrument, direction)
//! - [`MartingaleLedger`]: per-instrument escalation level for smart mode
//! - [`StakeStrategy`]: classic (intra-run) or smart (cross-run) martingale
//! - [`Venue`]: place order / query outcome / balance, with [`WsVenue`] and [`MockVenue`]
//! - [`SignalApprover`]: optional pre-trade filter
//!
//! # Run Gates (in `TradeEngine::execute`)
//!
//! 1. Trading paused -> SKIPPED
//! 2. Key already active -> SUPPRESSED
//! 3. Approver says no -> SKIPPED
//! 4. (all passed) -> attempt loop until WIN, LOSS, NO_DATA or SUBMISSION_FAILED

pub mod approval;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod settings;
pub mod strategy;
pub mod venue;
pub mod ws_venue;

pub use approval::{AlwaysApprove, CandleContext, SignalApprover};
pub use engine::{EngineConfig, TradeEngine};
pub use error::{ExecutorError, ExecutorResult, VenueError, VenueResult};
pub use ledger::MartingaleLedger;
pub use registry::{ActiveTradeLease, ActiveTradeRegistry};
pub use settings::{SettingsHandle, TradingSettings, MAX_GALES};
pub use strategy::{ClassicMartingale, SmartMartingale, StakePlan, StakeStrategy};
pub use venue::{BoxFuture, DynVenue, MockVenue, OrderRequest, OutcomeStatus, ScriptedOrder, Venue};
pub use ws_venue::WsVenue;
