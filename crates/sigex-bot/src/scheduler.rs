//! Signal scheduling.
//!
//! Signals are grouped by scheduled time and fired group by group. Every
//! signal in a group runs concurrently; runs from earlier groups may still
//! be awaiting outcomes when a later group fires. On shutdown no further
//! group fires, but runs already started are awaited, since an abandoned
//! run leaves stake at the venue with no local record of its outcome.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sigex_core::{Clock, ExecutionRun, Signal, StakeMode};
use sigex_executor::TradeEngine;
use sigex_telemetry::Metrics;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Group signals by due instant, earliest first.
pub fn group_by_time(signals: Vec<Signal>) -> Vec<(DateTime<Utc>, Vec<Signal>)> {
    let mut groups: BTreeMap<DateTime<Utc>, Vec<Signal>> = BTreeMap::new();
    for signal in signals {
        groups
            .entry(signal.scheduled_time().with_timezone(&Utc))
            .or_default()
            .push(signal);
    }
    groups.into_iter().collect()
}

pub struct SignalScheduler {
    engine: Arc<TradeEngine>,
    clock: Arc<dyn Clock>,
}

impl SignalScheduler {
    #[must_use]
    pub fn new(engine: Arc<TradeEngine>, clock: Arc<dyn Clock>) -> Self {
        Self { engine, clock }
    }

    /// Fire every group at its due time. Returns the finished runs.
    pub async fn run(&self, signals: Vec<Signal>, shutdown: CancellationToken) -> Vec<ExecutionRun> {
        let groups = group_by_time(signals);
        info!(groups = groups.len(), "Scheduler started");

        let mut in_flight = JoinSet::new();

        for (due, group) in groups {
            let wait = (due - self.clock.now()).to_std().unwrap_or_default();
            if !wait.is_zero() {
                info!(due = %due, signals = group.len(), wait_secs = wait.as_secs(), "Waiting for next group");
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Shutdown requested, no further groups fire");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            }
            if shutdown.is_cancelled() {
                break;
            }

            for signal in group {
                let engine = Arc::clone(&self.engine);
                in_flight.spawn(async move {
                    Metrics::run_started();
                    let run = engine.execute(&signal).await;
                    Metrics::run_finished(&run);
                    if run.mode == StakeMode::Smart {
                        let instrument = signal.instrument();
                        Metrics::martingale_level(instrument, engine.ledger().get_level(instrument));
                    }
                    run
                });
            }
        }

        let mut runs = Vec::new();
        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok(run) => runs.push(run),
                Err(e) => error!(error = %e, "Execution task failed"),
            }
        }

        runs.sort_by_key(|run| run.started_at);
        info!(runs = runs.len(), "Scheduler finished");
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use sigex_core::{Direction, Instrument, RunResult, SystemClock};
    use sigex_executor::{MockVenue, ScriptedOrder, SettingsHandle, TradingSettings};

    fn signal_at(at: DateTime<Utc>, pair: &str) -> Signal {
        Signal::new(
            at.with_timezone(&chrono_tz::UTC),
            Instrument::new(pair).unwrap(),
            Direction::Call,
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_group_by_time_orders_groups() {
        let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let groups = group_by_time(vec![
            signal_at(t1, "EURUSD"),
            signal_at(t2, "GBPUSD"),
            signal_at(t1, "AUDCAD"),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, t2);
        assert_eq!(groups[1].1.len(), 2);
    }

    #[tokio::test]
    async fn test_due_groups_fire_concurrently() {
        let venue = Arc::new(MockVenue::with_script([
            ScriptedOrder::Settle(dec!(0.8)),
            ScriptedOrder::Settle(dec!(-1)),
        ]));
        let settings = SettingsHandle::new(TradingSettings {
            max_gales: 0,
            ..Default::default()
        })
        .unwrap();
        let engine = Arc::new(TradeEngine::new(venue.clone(), settings));
        let scheduler = SignalScheduler::new(engine, Arc::new(SystemClock));

        let past = Utc::now() - chrono::Duration::minutes(1);
        let runs = scheduler
            .run(
                vec![signal_at(past, "EURUSD"), signal_at(past, "GBPUSD")],
                CancellationToken::new(),
            )
            .await;

        assert_eq!(runs.len(), 2);
        assert_eq!(venue.placed_orders().len(), 2);
        assert!(runs.iter().any(|r| r.final_result == Some(RunResult::Win)));
        assert!(runs.iter().any(|r| r.final_result == Some(RunResult::Loss)));
    }

    #[tokio::test]
    async fn test_shutdown_skips_future_groups() {
        let venue = Arc::new(MockVenue::new());
        let engine = Arc::new(TradeEngine::new(venue.clone(), SettingsHandle::default()));
        let scheduler = SignalScheduler::new(engine, Arc::new(SystemClock));

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let future = Utc::now() + chrono::Duration::hours(1);
        let runs = scheduler
            .run(vec![signal_at(future, "EURUSD")], shutdown)
            .await;

        assert!(runs.is_empty());
        assert!(venue.placed_orders().is_empty());
    }
}
