//! Trade execution state machine.
//!
//! One call to [`TradeEngine::execute`] processes one signal end to end:
//!
//! ```text
//! START -> ATTEMPT(n) -> AWAITING_OUTCOME(n) -> ESCALATE -> ATTEMPT(n+1)
//!                                            -> WIN | LOSS | NO_DATA
//! ```
//!
//! Venue and transport failures never escape `execute`; they become a
//! terminal `ExecutionRun` so the scheduler keeps going. The suppression
//! key is held by an RAII lease and released on every exit path.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use sigex_core::{Clock, ExecutionRun, RunResult, Signal, SystemClock, TradeAttempt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::approval::{CandleContext, SignalApprover};
use crate::error::VenueError;
use crate::ledger::MartingaleLedger;
use crate::registry::ActiveTradeRegistry;
use crate::settings::{SettingsHandle, TradingSettings};
use crate::strategy::{ClassicMartingale, SmartMartingale, StakePlan, StakeStrategy};
use crate::venue::{DynVenue, OrderRequest};

/// Engine timing configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between outcome queries.
    pub poll_interval: Duration,
    /// Outcome wait per minute of expiry.
    pub outcome_wait_per_minute: Duration,
    /// Extra wait on top of the expiry-proportional part.
    pub outcome_grace: Duration,
    /// Candles fetched for the approval filter.
    pub approval_candles: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            outcome_wait_per_minute: Duration::from_secs(60),
            outcome_grace: Duration::from_secs(30),
            approval_candles: 30,
        }
    }
}

impl EngineConfig {
    /// Bounded wait for an attempt with the given expiry.
    pub fn outcome_timeout(&self, expiry_minutes: u32) -> Duration {
        self.outcome_wait_per_minute * expiry_minutes + self.outcome_grace
    }
}

/// Executes signals against a venue.
pub struct TradeEngine {
    venue: DynVenue,
    settings: SettingsHandle,
    registry: Arc<ActiveTradeRegistry>,
    ledger: Arc<MartingaleLedger>,
    approver: Option<Arc<dyn SignalApprover>>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl TradeEngine {
    pub fn new(venue: DynVenue, settings: SettingsHandle) -> Self {
        Self {
            venue,
            settings,
            registry: Arc::new(ActiveTradeRegistry::new()),
            ledger: Arc::new(MartingaleLedger::new()),
            approver: None,
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_approver(mut self, approver: Arc<dyn SignalApprover>) -> Self {
        self.approver = Some(approver);
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ActiveTradeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &Arc<ActiveTradeRegistry> {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<MartingaleLedger> {
        &self.ledger
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// Execute `signal` under the current settings.
    pub async fn execute(&self, signal: &Signal) -> ExecutionRun {
        let settings = self.settings.snapshot();
        self.execute_with_settings(signal, &settings).await
    }

    /// Execute `signal` under an explicit settings snapshot.
    pub async fn execute_with_settings(
        &self,
        signal: &Signal,
        settings: &TradingSettings,
    ) -> ExecutionRun {
        let strategy: Box<dyn StakeStrategy> = if settings.smart_martingale {
            Box::new(SmartMartingale::new(Arc::clone(&self.ledger)))
        } else {
            Box::new(ClassicMartingale)
        };
        let mut run = ExecutionRun::new(signal.clone(), strategy.mode(), self.clock.now());

        // Pause first: a paused run never touches the registry.
        if settings.paused {
            run.finish_with_failure(RunResult::Skipped, "trading paused", self.clock.now());
            self.log_run(&run);
            return run;
        }

        let Some(lease) = self
            .registry
            .try_lease(signal.instrument(), signal.direction())
        else {
            run.finish(RunResult::Suppressed, self.clock.now());
            self.log_run(&run);
            return run;
        };

        let plan = match strategy.resolve_stake_and_attempt_budget(signal.instrument(), settings) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(instrument = %signal.instrument(), error = %e, "Stake plan rejected");
                run.finish_with_failure(
                    RunResult::SubmissionFailed,
                    e.to_string(),
                    self.clock.now(),
                );
                drop(lease);
                self.log_run(&run);
                return run;
            }
        };
        debug!(
            instrument = %signal.instrument(),
            stake = %plan.stake,
            attempts = plan.attempts_allowed,
            level = plan.level,
            mode = %strategy.mode(),
            "Stake plan resolved"
        );

        if self.approved(signal).await {
            self.run_attempts(&mut run, signal, strategy.as_ref(), plan)
                .await;
        } else {
            run.finish_with_failure(RunResult::Skipped, "approval denied", self.clock.now());
        }

        if let Some(result) = run.final_result {
            strategy.record_result(signal.instrument(), result, settings);
        }
        drop(lease);

        self.log_run(&run);
        run
    }

    async fn approved(&self, signal: &Signal) -> bool {
        let Some(approver) = &self.approver else {
            return true;
        };

        let instrument = signal.instrument().clone();
        let context = match self
            .venue
            .recent_candles(instrument.clone(), self.config.approval_candles)
            .await
        {
            Ok(candles) => CandleContext {
                instrument,
                candles,
            },
            Err(e) => {
                warn!(%instrument, error = %e, "Candles unavailable for approval");
                CandleContext::empty(instrument)
            }
        };

        approver.approve(&context, signal.direction())
    }

    /// Attempt loop. Leaves `run` finished on every path.
    async fn run_attempts(
        &self,
        run: &mut ExecutionRun,
        signal: &Signal,
        strategy: &dyn StakeStrategy,
        plan: StakePlan,
    ) {
        let instrument = signal.instrument();
        let mut stake = plan.stake;

        for attempt_index in 0..plan.attempts_allowed {
            let order = OrderRequest {
                instrument: instrument.clone(),
                direction: signal.direction(),
                stake,
                expiry_minutes: signal.expiry_minutes(),
            };

            let order_reference = match self.venue.place_order(order).await {
                Ok(reference) => reference,
                Err(VenueError::Timeout(detail)) => {
                    // The venue may have taken the order; its fate is unknown.
                    warn!(%instrument, attempt = attempt_index, %detail, "Order placement timed out");
                    run.finish_with_failure(
                        RunResult::NoData,
                        format!("placement timed out: {detail}"),
                        self.clock.now(),
                    );
                    return;
                }
                Err(e) => {
                    warn!(%instrument, attempt = attempt_index, error = %e, "Order not accepted");
                    run.finish_with_failure(
                        RunResult::SubmissionFailed,
                        e.to_string(),
                        self.clock.now(),
                    );
                    return;
                }
            };

            info!(
                %instrument,
                direction = %signal.direction(),
                attempt = attempt_index,
                stake = %stake,
                order_reference = %order_reference,
                "Order placed"
            );

            let mut attempt = TradeAttempt::new(attempt_index, stake, order_reference.clone());
            let timeout = self.config.outcome_timeout(signal.expiry_minutes());
            let Some(profit) = self.await_outcome(&order_reference, timeout).await else {
                warn!(%instrument, order_reference = %order_reference, "Outcome not resolved in time");
                attempt.mark_unknown();
                run.push_attempt(attempt);
                run.finish_with_failure(
                    RunResult::NoData,
                    format!("order {order_reference} unresolved after {}s", timeout.as_secs()),
                    self.clock.now(),
                );
                return;
            };

            attempt.resolve(profit);
            let won = attempt.is_win();
            info!(
                %instrument,
                attempt = attempt_index,
                outcome = %attempt.outcome,
                profit = %profit,
                "Attempt resolved"
            );
            run.push_attempt(attempt);
            self.log_balance().await;

            if won {
                run.finish(RunResult::Win, self.clock.now());
                return;
            }
            if attempt_index + 1 == plan.attempts_allowed {
                break;
            }
            stake = match strategy.next_stake(stake) {
                Ok(next) => next,
                Err(e) => {
                    warn!(
                        %instrument,
                        attempt = attempt_index + 1,
                        error = %e,
                        "Gale stake rejected"
                    );
                    run.finish_with_failure(
                        RunResult::SubmissionFailed,
                        e.to_string(),
                        self.clock.now(),
                    );
                    return;
                }
            };
        }

        run.finish(RunResult::Loss, self.clock.now());
    }

    /// Poll until the order settles or `timeout` passes.
    async fn await_outcome(&self, order_reference: &str, timeout: Duration) -> Option<Decimal> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.venue.query_outcome(order_reference.to_string()).await {
                Ok(status) if status.resolved => return Some(status.profit),
                Ok(_) => {}
                Err(e) => debug!(order_reference, error = %e, "Outcome query failed"),
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    async fn log_balance(&self) {
        match self.venue.balance().await {
            Ok(balance) => info!(balance = %balance, "Account balance"),
            Err(e) => warn!(error = %e, "Balance query failed"),
        }
    }

    fn log_run(&self, run: &ExecutionRun) {
        info!(
            run_id = %run.run_id,
            signal = %run.signal,
            mode = %run.mode,
            attempts = run.attempts.len(),
            total_profit = %run.total_profit,
            "Run finished: {}",
            run.summary()
        );
    }
}
