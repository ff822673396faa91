//! Connection supervision.
//!
//! The connection manager never reconnects by itself. The supervisor owns
//! that policy: bounded connect attempts with exponential backoff, and a
//! health loop that reconnects when the socket is found closed.

use std::sync::Arc;
use std::time::Duration;

use sigex_telemetry::Metrics;
use sigex_ws::ConnectionManager;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SupervisorConfig;
use crate::error::{AppError, AppResult};

pub struct ConnectionSupervisor {
    connection: Arc<ConnectionManager>,
    config: SupervisorConfig,
}

impl ConnectionSupervisor {
    #[must_use]
    pub fn new(connection: Arc<ConnectionManager>, config: SupervisorConfig) -> Self {
        Self { connection, config }
    }

    /// Connect if not already open, retrying up to `max_connect_attempts`.
    ///
    /// # Errors
    ///
    /// `ConnectionExhausted` once every attempt failed.
    pub async fn ensure_connected(&self, reason: &str) -> AppResult<()> {
        if self.connection.is_open() {
            return Ok(());
        }

        let max_attempts = self.config.max_connect_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            Metrics::ws_reconnect(reason);
            match self.connection.connect().await {
                Ok(()) => {
                    Metrics::ws_connected();
                    info!(attempt, reason, "Venue connection established");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "Connect attempt failed");
                    last_error = e.to_string();
                }
            }

            if attempt < max_attempts && !self.connection.is_shutdown() {
                let delay = backoff_delay(
                    self.config.backoff_base_ms,
                    self.config.backoff_max_ms,
                    attempt,
                );
                debug!(delay_ms = delay.as_millis() as u64, "Backing off before reconnect");
                tokio::time::sleep(delay).await;
            }
        }

        Metrics::ws_disconnected();
        Err(AppError::ConnectionExhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    /// Periodically reconnect a closed connection until `shutdown` fires.
    pub fn spawn_health_loop(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let period = Duration::from_millis(this.config.health_check_interval_ms.max(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick fires immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Health loop stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        if this.connection.is_open() {
                            continue;
                        }
                        Metrics::ws_disconnected();
                        warn!("Venue connection closed, reconnecting");
                        if let Err(e) = this.ensure_connected("health_check").await {
                            error!(error = %e, "Reconnect failed");
                        }
                    }
                }
            }
        })
    }
}

/// Exponential backoff with jitter: `base * 2^(attempt-1)`, capped at
/// `max`, plus 0-999 ms.
pub fn backoff_delay(base_ms: u64, max_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let delay = base_ms.saturating_mul(1u64 << exponent).min(max_ms);
    Duration::from_millis(delay + rand_jitter())
}

/// Generate random jitter (0-1000ms).
fn rand_jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigex_ws::{ConnectionConfig, WsFrame};
    use tokio::sync::mpsc;

    #[test]
    fn test_backoff_grows_and_caps() {
        let first = backoff_delay(100, 1_000, 1).as_millis() as u64;
        let second = backoff_delay(100, 1_000, 2).as_millis() as u64;
        let tenth = backoff_delay(100, 1_000, 10).as_millis() as u64;

        assert!((100..1_100).contains(&first));
        assert!((200..1_200).contains(&second));
        assert!((1_000..2_000).contains(&tenth));
    }

    #[tokio::test]
    async fn test_ensure_connected_gives_up() {
        let (tx, _rx) = mpsc::channel::<WsFrame>(8);
        let connection = Arc::new(ConnectionManager::new(
            ConnectionConfig {
                url: "ws://127.0.0.1:9".to_string(),
                open_timeout_ms: 500,
                ..Default::default()
            },
            tx,
        ));
        let supervisor = ConnectionSupervisor::new(
            connection,
            SupervisorConfig {
                max_connect_attempts: 2,
                backoff_base_ms: 10,
                backoff_max_ms: 20,
                health_check_interval_ms: 100,
            },
        );

        let err = supervisor.ensure_connected("test").await.unwrap_err();
        assert!(matches!(err, AppError::ConnectionExhausted { attempts: 2, .. }));
    }
}
