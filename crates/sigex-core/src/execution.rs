//! Execution records for signal runs.
//!
//! An `ExecutionRun` is the aggregate outcome of processing one `Signal`:
//! the ordered `TradeAttempt`s placed at the venue and the terminal
//! `RunResult`. Runs are built by the trade engine and handed to
//! reporting; nothing here talks to the venue.

use crate::Signal;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// TradeAttempt
// ============================================================================

/// Resolution state of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Order placed, outcome not yet known.
    Pending,
    /// Venue reported a positive profit.
    Win,
    /// Venue reported zero or negative profit.
    Loss,
    /// No resolution observed before the outcome deadline.
    Unknown,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Win => write!(f, "WIN"),
            Self::Loss => write!(f, "LOSS"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// One order placed within an execution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeAttempt {
    /// 0 for the direct attempt, n for gale n.
    pub attempt_index: u32,
    pub stake: Decimal,
    /// Venue-assigned order id used for outcome queries.
    pub order_reference: String,
    pub outcome: AttemptOutcome,
    /// Signed profit once resolved.
    pub profit: Option<Decimal>,
}

impl TradeAttempt {
    /// Create a pending attempt for a freshly placed order.
    #[must_use]
    pub fn new(attempt_index: u32, stake: Decimal, order_reference: impl Into<String>) -> Self {
        Self {
            attempt_index,
            stake,
            order_reference: order_reference.into(),
            outcome: AttemptOutcome::Pending,
            profit: None,
        }
    }

    /// Resolve with the venue-reported profit. Profit > 0 is a WIN.
    pub fn resolve(&mut self, profit: Decimal) {
        self.outcome = if profit > Decimal::ZERO {
            AttemptOutcome::Win
        } else {
            AttemptOutcome::Loss
        };
        self.profit = Some(profit);
    }

    /// Mark as unresolved after the outcome deadline passed.
    pub fn mark_unknown(&mut self) {
        self.outcome = AttemptOutcome::Unknown;
    }

    pub fn is_win(&self) -> bool {
        self.outcome == AttemptOutcome::Win
    }
}

// ============================================================================
// ExecutionRun
// ============================================================================

/// Stake sizing policy a run was executed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeMode {
    /// Escalate within the run, doubling the stake per gale.
    Classic,
    /// One attempt per run; escalation carried across runs per instrument.
    Smart,
}

impl fmt::Display for StakeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classic => write!(f, "classic"),
            Self::Smart => write!(f, "smart"),
        }
    }
}

/// Terminal state of an execution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunResult {
    Win,
    Loss,
    /// Same instrument and direction already in flight.
    Suppressed,
    /// Trading paused or approval denied; nothing committed.
    Skipped,
    /// An attempt was placed but never resolved in time.
    NoData,
    /// Venue refused the order; not a financial loss.
    SubmissionFailed,
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => write!(f, "WIN"),
            Self::Loss => write!(f, "LOSS"),
            Self::Suppressed => write!(f, "SUPPRESSED"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::NoData => write!(f, "NO_DATA"),
            Self::SubmissionFailed => write!(f, "SUBMISSION_FAILED"),
        }
    }
}

/// Aggregate result of processing one signal.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRun {
    pub run_id: Uuid,
    pub signal: Signal,
    pub mode: StakeMode,
    pub attempts: Vec<TradeAttempt>,
    /// `None` while the run is still in progress.
    pub final_result: Option<RunResult>,
    /// Sum of every resolved attempt's profit.
    pub total_profit: Decimal,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Human-readable cause for SKIPPED/SUBMISSION_FAILED/NO_DATA.
    pub failure: Option<String>,
}

impl ExecutionRun {
    #[must_use]
    pub fn new(signal: Signal, mode: StakeMode, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            signal,
            mode,
            attempts: Vec::new(),
            final_result: None,
            total_profit: Decimal::ZERO,
            started_at,
            finished_at: None,
            failure: None,
        }
    }

    /// Append a placed attempt and return a handle to resolve it.
    pub fn push_attempt(&mut self, attempt: TradeAttempt) -> &mut TradeAttempt {
        self.attempts.push(attempt);
        let last = self.attempts.len() - 1;
        &mut self.attempts[last]
    }

    /// Close the run with a terminal result.
    ///
    /// Recomputes `total_profit` as the sum over every attempt actually
    /// made, not just the last one.
    pub fn finish(&mut self, result: RunResult, finished_at: DateTime<Utc>) {
        self.total_profit = self.attempts.iter().filter_map(|a| a.profit).sum();
        self.final_result = Some(result);
        self.finished_at = Some(finished_at);
    }

    /// Close the run with a terminal result and a cause.
    pub fn finish_with_failure(
        &mut self,
        result: RunResult,
        failure: impl Into<String>,
        finished_at: DateTime<Utc>,
    ) {
        self.failure = Some(failure.into());
        self.finish(result, finished_at);
    }

    pub fn is_finished(&self) -> bool {
        self.final_result.is_some()
    }

    /// Number of escalation attempts beyond the direct one.
    pub fn gales(&self) -> usize {
        self.attempts.len().saturating_sub(1)
    }

    /// One-line outcome, e.g. `WIN after gale 1 (+0.6)`.
    pub fn summary(&self) -> String {
        let Some(result) = self.final_result else {
            return "IN_PROGRESS".to_string();
        };
        match result {
            RunResult::Win if self.gales() == 0 => {
                format!("WIN direct ({})", signed(self.total_profit))
            }
            RunResult::Win => format!(
                "WIN after gale {} ({})",
                self.gales(),
                signed(self.total_profit)
            ),
            RunResult::Loss if self.gales() == 0 => {
                format!("LOSS ({})", signed(self.total_profit))
            }
            RunResult::Loss => format!(
                "LOSS after {} gales ({})",
                self.gales(),
                signed(self.total_profit)
            ),
            other => match &self.failure {
                Some(reason) => format!("{other}: {reason}"),
                None => other.to_string(),
            },
        }
    }
}

fn signed(value: Decimal) -> String {
    if value.is_sign_negative() {
        value.to_string()
    } else {
        format!("+{value}")
    }
}
