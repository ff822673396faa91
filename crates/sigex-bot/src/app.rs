//! Main application orchestration.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sigex_core::{ExecutionRun, RunResult, Signal, SystemClock};
use sigex_executor::{SettingsHandle, TradeEngine, WsVenue};
use sigex_signal::SignalNormalizer;
use sigex_telemetry::Metrics;
use sigex_ws::{ConnectionManager, ResponseCorrelator, WsFrame};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::metered_venue::MeteredVenue;
use crate::scheduler::SignalScheduler;
use crate::supervisor::ConnectionSupervisor;

/// Inbound frame queue between the connection and the router.
const FRAME_BUFFER: usize = 1024;

/// Main application state.
pub struct Application {
    config: AppConfig,
    connection: Arc<ConnectionManager>,
    correlator: Arc<ResponseCorrelator>,
    supervisor: Arc<ConnectionSupervisor>,
    engine: Arc<TradeEngine>,
    normalizer: SignalNormalizer,
    /// Taken by the router when `run` starts.
    message_rx: Option<mpsc::Receiver<WsFrame>>,
    shutdown: CancellationToken,
}

impl Application {
    /// Create a new application instance.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let (message_tx, message_rx) = mpsc::channel(FRAME_BUFFER);
        let connection = Arc::new(ConnectionManager::new(
            config.websocket.connection_config(&config.ws_url),
            message_tx,
        ));
        let correlator = Arc::new(ResponseCorrelator::new(
            connection.write_handle(),
            config.websocket.request_timeout_ms,
        ));
        let supervisor = Arc::new(ConnectionSupervisor::new(
            Arc::clone(&connection),
            config.supervisor.clone(),
        ));

        let venue = Arc::new(MeteredVenue::new(Arc::new(WsVenue::new(Arc::clone(
            &correlator,
        )))));
        let settings = SettingsHandle::new(config.trading.settings())?;
        let engine = TradeEngine::new(venue, settings).with_config((&config.engine).into());
        engine.registry().set_enabled(config.trading.suppression);

        let normalizer =
            SignalNormalizer::with_timezone_name(&config.timezone, config.signals.late_grace_minutes)?;

        info!(
            ws_url = %config.ws_url,
            timezone = %normalizer.timezone(),
            smart_martingale = config.trading.smart_martingale,
            suppression = config.trading.suppression,
            "Application configured"
        );

        Ok(Self {
            config,
            connection,
            correlator,
            supervisor,
            engine: Arc::new(engine),
            normalizer,
            message_rx: Some(message_rx),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<TradeEngine> {
        &self.engine
    }

    /// Token that stops the application when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Normalize raw signal text into signals.
    pub fn normalize(&self, text: &str, source: &str) -> Vec<Signal> {
        let batch = self.normalizer.normalize_batch(text, Utc::now());
        Metrics::signals_normalized(source, batch.signals.len(), batch.rejected);
        if batch.rejected > 0 {
            warn!(source, rejected = batch.rejected, "Some signal chunks were dropped");
        }
        batch.signals
    }

    /// Read and normalize a signal file.
    pub async fn load_signals(&self, path: &str) -> AppResult<Vec<Signal>> {
        let text = tokio::fs::read_to_string(path).await?;
        let signals = self.normalize(&text, "file");
        info!(path, signals = signals.len(), "Signal file loaded");
        Ok(signals)
    }

    /// Connect, execute `signals` on schedule, then shut down.
    pub async fn run(&mut self, signals: Vec<Signal>) -> AppResult<Vec<ExecutionRun>> {
        let router = self
            .message_rx
            .take()
            .map(|rx| self.correlator.spawn_router(rx));

        self.supervisor.ensure_connected("startup").await?;
        let health = self.supervisor.spawn_health_loop(self.shutdown.clone());

        let ctrl_c_token = self.shutdown.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                ctrl_c_token.cancel();
            }
        });

        let scheduler = SignalScheduler::new(Arc::clone(&self.engine), Arc::new(SystemClock));
        let runs = scheduler.run(signals, self.shutdown.clone()).await;
        log_session(&runs);

        // Cleanup
        self.shutdown.cancel();
        ctrl_c.abort();
        let _ = health.await;
        let abandoned = self.correlator.cancel_all();
        if abandoned > 0 {
            warn!(abandoned, "Pending requests abandoned at shutdown");
        }
        self.connection.shutdown();
        Metrics::ws_disconnected();
        if let Some(router) = router {
            router.abort();
        }

        Ok(runs)
    }
}

fn log_session(runs: &[ExecutionRun]) {
    let count = |result: RunResult| {
        runs.iter()
            .filter(|r| r.final_result == Some(result))
            .count()
    };
    let total_profit: Decimal = runs.iter().map(|r| r.total_profit).sum();

    info!(
        runs = runs.len(),
        wins = count(RunResult::Win),
        losses = count(RunResult::Loss),
        suppressed = count(RunResult::Suppressed),
        skipped = count(RunResult::Skipped),
        no_data = count(RunResult::NoData),
        submission_failed = count(RunResult::SubmissionFailed),
        total_profit = %total_profit,
        "Session summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_normalize_counts_rejections() {
        let app = Application::new(AppConfig::default()).unwrap();
        let signals = app.normalize("21:30;GBPUSD;CALL;5\nnot a signal\n", "test");
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].instrument().as_str(), "GBPUSD");
    }

    #[tokio::test]
    async fn test_suppression_flag_wired() {
        let mut config = AppConfig::default();
        config.trading.suppression = false;
        let app = Application::new(config).unwrap();
        assert!(!app.engine().registry().is_enabled());
    }
}
