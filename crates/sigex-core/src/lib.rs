//! Core domain types for the sigex signal execution engine.
//!
//! This crate provides the types shared by every other sigex crate:
//! - `Instrument`, `Direction`: what a signal trades and which way
//! - `Signal`: a normalized, timezone-resolved trade instruction
//! - `TradeAttempt`, `ExecutionRun`: the record of one signal's execution
//! - `Clock`: injectable wall-clock source

pub mod clock;
pub mod error;
pub mod execution;
pub mod instrument;
pub mod signal;

pub use clock::{Clock, SystemClock};
pub use error::{CoreError, Result};
pub use instrument::{Direction, Instrument, OTC_SUFFIX};
pub use signal::Signal;

// Execution types
pub use execution::{AttemptOutcome, ExecutionRun, RunResult, StakeMode, TradeAttempt};
