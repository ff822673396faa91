//! Stake sizing strategies.
//!
//! Classic and smart martingale are mutually exclusive, selected per run
//! from the settings snapshot. The engine's attempt loop only sees a
//! `StakePlan` and `next_stake`, never the mode itself.

use std::sync::Arc;

use rust_decimal::Decimal;
use sigex_core::{Instrument, RunResult, StakeMode};
use tracing::info;

use crate::error::{ExecutorError, ExecutorResult};
use crate::ledger::MartingaleLedger;
use crate::settings::TradingSettings;

/// Starting stake and attempt budget for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakePlan {
    pub stake: Decimal,
    /// Total attempts allowed, direct one included.
    pub attempts_allowed: u32,
    /// Ledger level the stake was derived from (0 in classic mode).
    pub level: u32,
}

pub trait StakeStrategy: Send + Sync {
    fn mode(&self) -> StakeMode;

    /// # Errors
    ///
    /// `ExecutorError::StakeOverflow` if the escalated stake is not representable.
    fn resolve_stake_and_attempt_budget(
        &self,
        instrument: &Instrument,
        settings: &TradingSettings,
    ) -> ExecutorResult<StakePlan>;

    /// Stake for the attempt after a lost one.
    ///
    /// # Errors
    ///
    /// `ExecutorError::StakeOverflow` if the escalated stake is not representable.
    fn next_stake(&self, current: Decimal) -> ExecutorResult<Decimal>;

    /// Update cross-run state once the run is terminal.
    fn record_result(&self, instrument: &Instrument, result: RunResult, settings: &TradingSettings);
}

/// Intra-run escalation: up to `max_gales + 1` attempts, stake doubling per gale.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassicMartingale;

impl StakeStrategy for ClassicMartingale {
    fn mode(&self) -> StakeMode {
        StakeMode::Classic
    }

    fn resolve_stake_and_attempt_budget(
        &self,
        _instrument: &Instrument,
        settings: &TradingSettings,
    ) -> ExecutorResult<StakePlan> {
        Ok(StakePlan {
            stake: settings.base_stake,
            attempts_allowed: settings.max_gales.saturating_add(1),
            level: 0,
        })
    }

    fn next_stake(&self, current: Decimal) -> ExecutorResult<Decimal> {
        current
            .checked_mul(Decimal::TWO)
            .ok_or_else(|| ExecutorError::StakeOverflow(format!("{current} x 2")))
    }

    fn record_result(&self, _: &Instrument, _: RunResult, _: &TradingSettings) {}
}

/// Cross-run escalation: one attempt per run, stake from the ledger level.
#[derive(Debug, Clone)]
pub struct SmartMartingale {
    ledger: Arc<MartingaleLedger>,
}

impl SmartMartingale {
    #[must_use]
    pub fn new(ledger: Arc<MartingaleLedger>) -> Self {
        Self { ledger }
    }
}

impl StakeStrategy for SmartMartingale {
    fn mode(&self) -> StakeMode {
        StakeMode::Smart
    }

    fn resolve_stake_and_attempt_budget(
        &self,
        instrument: &Instrument,
        settings: &TradingSettings,
    ) -> ExecutorResult<StakePlan> {
        let level = self.ledger.get_level(instrument);
        let mut stake = settings.base_stake;
        for _ in 0..level {
            stake = stake
                .checked_mul(settings.martingale_multiplier)
                .ok_or_else(|| {
                    ExecutorError::StakeOverflow(format!(
                        "{} x {}^{level}",
                        settings.base_stake, settings.martingale_multiplier
                    ))
                })?;
        }
        Ok(StakePlan {
            stake,
            attempts_allowed: 1,
            level,
        })
    }

    fn next_stake(&self, current: Decimal) -> ExecutorResult<Decimal> {
        Ok(current)
    }

    fn record_result(&self, instrument: &Instrument, result: RunResult, settings: &TradingSettings) {
        match result {
            RunResult::Win => self.ledger.reset(instrument),
            RunResult::Loss => {
                let level = self
                    .ledger
                    .increment_or_reset(instrument, settings.max_gales);
                info!(%instrument, level, "Smart martingale level advanced");
            }
            // Nothing resolved, level unchanged.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn inst() -> Instrument {
        Instrument::new("EURUSD").unwrap()
    }

    #[test]
    fn test_classic_plan() {
        let settings = TradingSettings {
            base_stake: dec!(5),
            max_gales: 3,
            ..Default::default()
        };
        let plan = ClassicMartingale
            .resolve_stake_and_attempt_budget(&inst(), &settings)
            .unwrap();
        assert_eq!(plan.stake, dec!(5));
        assert_eq!(plan.attempts_allowed, 4);
        assert_eq!(ClassicMartingale.next_stake(dec!(5)).unwrap(), dec!(10));
    }

    #[test]
    fn test_smart_plan_follows_ledger() {
        let ledger = Arc::new(MartingaleLedger::new());
        let strategy = SmartMartingale::new(Arc::clone(&ledger));
        let settings = TradingSettings {
            base_stake: dec!(1.5),
            max_gales: 2,
            martingale_multiplier: dec!(2.5),
            smart_martingale: true,
            ..Default::default()
        };

        let plan = strategy
            .resolve_stake_and_attempt_budget(&inst(), &settings)
            .unwrap();
        assert_eq!(plan.stake, dec!(1.5));
        assert_eq!(plan.attempts_allowed, 1);

        strategy.record_result(&inst(), RunResult::Loss, &settings);
        strategy.record_result(&inst(), RunResult::Loss, &settings);
        let plan = strategy
            .resolve_stake_and_attempt_budget(&inst(), &settings)
            .unwrap();
        assert_eq!(plan.level, 2);
        assert_eq!(plan.stake, dec!(9.375));

        // Ceiling passed, back to base.
        strategy.record_result(&inst(), RunResult::Loss, &settings);
        assert_eq!(ledger.get_level(&inst()), 0);
    }

    #[test]
    fn test_smart_ignores_unresolved_runs() {
        let ledger = Arc::new(MartingaleLedger::new());
        let strategy = SmartMartingale::new(Arc::clone(&ledger));
        let settings = TradingSettings::default();

        strategy.record_result(&inst(), RunResult::Loss, &settings);
        strategy.record_result(&inst(), RunResult::NoData, &settings);
        strategy.record_result(&inst(), RunResult::SubmissionFailed, &settings);
        assert_eq!(ledger.get_level(&inst()), 1);

        strategy.record_result(&inst(), RunResult::Win, &settings);
        assert_eq!(ledger.get_level(&inst()), 0);
    }

    #[test]
    fn test_classic_next_stake_overflow_is_error() {
        let err = ClassicMartingale.next_stake(Decimal::MAX).unwrap_err();
        assert!(matches!(err, ExecutorError::StakeOverflow(_)));
    }

    #[test]
    fn test_smart_stake_overflow_is_error() {
        let ledger = Arc::new(MartingaleLedger::new());
        let strategy = SmartMartingale::new(Arc::clone(&ledger));
        let settings = TradingSettings {
            max_gales: 20,
            martingale_multiplier: dec!(1000),
            smart_martingale: true,
            ..Default::default()
        };
        for _ in 0..12 {
            strategy.record_result(&inst(), RunResult::Loss, &settings);
        }
        assert_eq!(ledger.get_level(&inst()), 12);

        let err = strategy
            .resolve_stake_and_attempt_budget(&inst(), &settings)
            .unwrap_err();
        assert!(matches!(err, ExecutorError::StakeOverflow(_)));
    }
}
