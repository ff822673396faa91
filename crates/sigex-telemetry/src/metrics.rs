//! Prometheus metrics for the sigex bot.
//!
//! Covers:
//! - Connection state and reconnects
//! - Correlated request timeouts
//! - Signal intake (parsed / rejected)
//! - Execution runs, attempts and session profit
//! - Smart martingale level per instrument
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec,
    register_int_gauge, CounterVec, Encoder, Gauge, GaugeVec, HistogramVec, IntGauge,
    TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sigex_core::{ExecutionRun, Instrument};

use crate::error::TelemetryResult;

/// WebSocket connection state (1 = connected, 0 = disconnected).
pub static WS_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "sigex_ws_connected",
        "WebSocket connection state (1=connected)"
    )
    .unwrap()
});

/// Total WebSocket (re)connection attempts.
/// Labels: reason (startup/health_check)
pub static WS_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigex_ws_reconnect_total",
        "Total WebSocket reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Correlated requests that got no reply in time.
pub static REQUEST_TIMEOUT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigex_request_timeout_total",
        "Total correlated requests that timed out",
        &["name"]
    )
    .unwrap()
});

/// Signals accepted by the normalizer.
pub static SIGNALS_PARSED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigex_signals_parsed_total",
        "Total signals normalized",
        &["source"]
    )
    .unwrap()
});

/// Lines or blocks the normalizer dropped.
pub static SIGNALS_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigex_signals_rejected_total",
        "Total malformed signal chunks dropped",
        &["source"]
    )
    .unwrap()
});

/// Finished execution runs.
/// Labels: result (WIN/LOSS/...), mode (classic/smart)
pub static RUNS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigex_runs_total",
        "Total execution runs by terminal result",
        &["result", "mode"]
    )
    .unwrap()
});

/// Attempts placed, by resolved outcome.
pub static ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigex_attempts_total",
        "Total trade attempts by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Wall-clock duration of finished runs in seconds.
pub static RUN_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "sigex_run_duration_seconds",
        "Execution run duration in seconds",
        &["result"],
        vec![1.0, 5.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0]
    )
    .unwrap()
});

/// Sum of run profits since process start.
pub static SESSION_PROFIT: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "sigex_session_profit",
        "Cumulative profit of finished runs"
    )
    .unwrap()
});

/// Runs currently executing.
pub static ACTIVE_RUNS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("sigex_active_runs", "Execution runs in flight").unwrap()
});

/// Smart martingale level per instrument.
pub static MARTINGALE_LEVEL: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "sigex_martingale_level",
        "Current smart martingale level",
        &["instrument"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record WebSocket connected.
    pub fn ws_connected() {
        WS_CONNECTED.set(1.0);
    }

    /// Record WebSocket disconnected.
    pub fn ws_disconnected() {
        WS_CONNECTED.set(0.0);
    }

    /// Record a connection attempt.
    pub fn ws_reconnect(reason: &str) {
        WS_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn request_timeout(name: &str) {
        REQUEST_TIMEOUT_TOTAL.with_label_values(&[name]).inc();
    }

    /// Record one normalized batch.
    pub fn signals_normalized(source: &str, parsed: usize, rejected: usize) {
        SIGNALS_PARSED_TOTAL
            .with_label_values(&[source])
            .inc_by(parsed as f64);
        SIGNALS_REJECTED_TOTAL
            .with_label_values(&[source])
            .inc_by(rejected as f64);
    }

    pub fn run_started() {
        ACTIVE_RUNS.inc();
    }

    /// Record a finished run: result, attempts, profit and duration.
    pub fn run_finished(run: &ExecutionRun) {
        ACTIVE_RUNS.dec();

        let Some(result) = run.final_result else {
            return;
        };
        let result = result.to_string();
        let mode = run.mode.to_string();
        RUNS_TOTAL
            .with_label_values(&[result.as_str(), mode.as_str()])
            .inc();

        for attempt in &run.attempts {
            let outcome = attempt.outcome.to_string();
            ATTEMPTS_TOTAL.with_label_values(&[outcome.as_str()]).inc();
        }

        SESSION_PROFIT.add(decimal_to_f64(run.total_profit));

        if let Some(finished_at) = run.finished_at {
            let secs = (finished_at - run.started_at).num_milliseconds() as f64 / 1000.0;
            RUN_DURATION_SECONDS
                .with_label_values(&[result.as_str()])
                .observe(secs.max(0.0));
        }
    }

    pub fn martingale_level(instrument: &Instrument, level: u32) {
        MARTINGALE_LEVEL
            .with_label_values(&[instrument.as_str()])
            .set(f64::from(level));
    }

    /// Render the default registry in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use sigex_core::{Direction, RunResult, Signal, StakeMode, TradeAttempt};

    fn finished_run(profits: &[Decimal], result: RunResult) -> ExecutionRun {
        let at = chrono_tz::UTC
            .with_ymd_and_hms(2024, 3, 1, 21, 30, 0)
            .unwrap();
        let signal = Signal::new(at, Instrument::new("AUDCAD").unwrap(), Direction::Call, 1)
            .unwrap();
        let started = Utc.with_ymd_and_hms(2024, 3, 1, 21, 30, 0).unwrap();
        let mut run = ExecutionRun::new(signal, StakeMode::Classic, started);
        for (i, profit) in profits.iter().enumerate() {
            let attempt = run.push_attempt(TradeAttempt::new(i as u32, dec!(1), i.to_string()));
            attempt.resolve(*profit);
        }
        run.finish(result, started + chrono::Duration::seconds(130));
        run
    }

    #[test]
    fn test_run_finished_counts_result_and_attempts() {
        let runs = RUNS_TOTAL.with_label_values(&["WIN", "classic"]);
        let losses = ATTEMPTS_TOTAL.with_label_values(&["LOSS"]);
        let (runs_before, losses_before) = (runs.get(), losses.get());

        Metrics::run_started();
        Metrics::run_finished(&finished_run(&[dec!(-1), dec!(1.6)], RunResult::Win));

        assert_eq!(runs.get() - runs_before, 1.0);
        assert_eq!(losses.get() - losses_before, 1.0);
    }

    #[test]
    fn test_martingale_level_gauge() {
        let inst = Instrument::new("NZDJPY-OTC").unwrap();
        Metrics::martingale_level(&inst, 2);
        assert_eq!(
            MARTINGALE_LEVEL.with_label_values(&["NZDJPY-OTC"]).get(),
            2.0
        );
    }

    #[test]
    fn test_gather_text_contains_registered_metrics() {
        Metrics::signals_normalized("test", 3, 1);
        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("sigex_signals_parsed_total"));
        assert!(text.contains("sigex_signals_rejected_total"));
    }
}
