//! Application configuration.
//!
//! Loaded from a TOML file. Every section and field has a default, so an
//! empty file (or no file) yields a runnable configuration.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sigex_executor::{EngineConfig, TradingSettings};
use sigex_signal::DEFAULT_LATE_GRACE_MINUTES;
use sigex_telemetry::DEFAULT_LOG_FILTER;
use sigex_ws::{ConnectionConfig, DEFAULT_REQUEST_TIMEOUT_MS};
use std::path::Path;
use std::time::Duration;

/// Config path used when neither `--config` nor `SIGEX_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable overriding the config path.
pub const CONFIG_ENV_VAR: &str = "SIGEX_CONFIG";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Venue WebSocket URL.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// IANA timezone signal clock times are written in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Signal file read at startup when `--signals` is not given.
    #[serde(default)]
    pub signal_file: Option<String>,
    #[serde(default)]
    pub websocket: WsConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub signals: SignalsConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_ws_url() -> String {
    "ws://127.0.0.1:8765".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

// ============================================================================
// [websocket]
// ============================================================================

/// WebSocket configuration subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Bound on the open handshake (ms).
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
    /// Bound on a correlated reply (ms).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Heartbeat interval (ms).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Pong deadline (ms).
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
}

fn default_open_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    10_000
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            open_timeout_ms: default_open_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
        }
    }
}

impl WsConfig {
    pub fn connection_config(&self, url: &str) -> ConnectionConfig {
        ConnectionConfig {
            url: url.to_string(),
            open_timeout_ms: self.open_timeout_ms,
            heartbeat_interval_ms: self.heartbeat_interval_ms,
            heartbeat_timeout_ms: self.heartbeat_timeout_ms,
            ..Default::default()
        }
    }
}

// ============================================================================
// [trading]
// ============================================================================

/// Trading settings plus the suppression switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_base_stake")]
    pub base_stake: Decimal,
    #[serde(default = "default_max_gales")]
    pub max_gales: u32,
    #[serde(default = "default_martingale_multiplier")]
    pub martingale_multiplier: Decimal,
    #[serde(default)]
    pub smart_martingale: bool,
    /// Suppress a signal whose instrument and direction is already in flight.
    #[serde(default = "default_suppression")]
    pub suppression: bool,
    /// Start with trading paused.
    #[serde(default)]
    pub paused: bool,
}

fn default_base_stake() -> Decimal {
    TradingSettings::default().base_stake
}

fn default_max_gales() -> u32 {
    TradingSettings::default().max_gales
}

fn default_martingale_multiplier() -> Decimal {
    TradingSettings::default().martingale_multiplier
}

fn default_suppression() -> bool {
    true
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            base_stake: default_base_stake(),
            max_gales: default_max_gales(),
            martingale_multiplier: default_martingale_multiplier(),
            smart_martingale: false,
            suppression: default_suppression(),
            paused: false,
        }
    }
}

impl TradingConfig {
    pub fn settings(&self) -> TradingSettings {
        TradingSettings {
            base_stake: self.base_stake,
            max_gales: self.max_gales,
            martingale_multiplier: self.martingale_multiplier,
            smart_martingale: self.smart_martingale,
            paused: self.paused,
        }
    }
}

// ============================================================================
// [engine]
// ============================================================================

/// Outcome polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Outcome wait per minute of expiry (ms).
    #[serde(default = "default_outcome_wait_per_minute_ms")]
    pub outcome_wait_per_minute_ms: u64,
    #[serde(default = "default_outcome_grace_ms")]
    pub outcome_grace_ms: u64,
    /// Candles fetched for the approval filter.
    #[serde(default = "default_approval_candles")]
    pub approval_candles: u32,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_outcome_wait_per_minute_ms() -> u64 {
    60_000
}

fn default_outcome_grace_ms() -> u64 {
    30_000
}

fn default_approval_candles() -> u32 {
    30
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            outcome_wait_per_minute_ms: default_outcome_wait_per_minute_ms(),
            outcome_grace_ms: default_outcome_grace_ms(),
            approval_candles: default_approval_candles(),
        }
    }
}

impl From<&EngineSection> for EngineConfig {
    fn from(cfg: &EngineSection) -> Self {
        Self {
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            outcome_wait_per_minute: Duration::from_millis(cfg.outcome_wait_per_minute_ms),
            outcome_grace: Duration::from_millis(cfg.outcome_grace_ms),
            approval_candles: cfg.approval_candles,
        }
    }
}

// ============================================================================
// [signals] / [supervisor] / [telemetry]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalsConfig {
    /// A clock time past by more than this resolves to tomorrow.
    #[serde(default = "default_late_grace_minutes")]
    pub late_grace_minutes: u32,
}

fn default_late_grace_minutes() -> u32 {
    DEFAULT_LATE_GRACE_MINUTES
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            late_grace_minutes: default_late_grace_minutes(),
        }
    }
}

/// Connection supervision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_max_connect_attempts")]
    pub max_connect_attempts: u32,
    /// Base delay for reconnection backoff (ms).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
}

fn default_max_connect_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_health_check_interval_ms() -> u64 {
    5_000
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_connect_attempts: default_max_connect_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            timezone: default_timezone(),
            signal_file: None,
            websocket: WsConfig::default(),
            trading: TradingConfig::default(),
            engine: EngineSection::default(),
            signals: SignalsConfig::default(),
            supervisor: SupervisorConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Path precedence: `cli_path` > `SIGEX_CONFIG` > `config/default.toml`.
    /// A missing default file yields defaults; a missing explicit file is
    /// an error.
    pub fn load(cli_path: Option<&str>) -> AppResult<Self> {
        let explicit = cli_path
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok());

        match explicit {
            Some(path) => Self::from_file(&path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => {
                tracing::warn!(path = DEFAULT_CONFIG_PATH, "Config file not found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.ws_url.is_empty() {
            return Err(AppError::Config("ws_url must not be empty".to_string()));
        }
        if self.supervisor.max_connect_attempts == 0 {
            return Err(AppError::Config(
                "supervisor.max_connect_attempts must be at least 1".to_string(),
            ));
        }
        self.trading.settings().validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.timezone, "UTC");
        assert!(config.trading.suppression);
        assert_eq!(config.trading.base_stake, dec!(1));
        assert_eq!(config.trading.max_gales, 2);
        assert_eq!(config.websocket.open_timeout_ms, 10_000);
        assert_eq!(config.websocket.request_timeout_ms, 2_000);
        assert_eq!(config.signals.late_grace_minutes, 30);
        assert_eq!(config.supervisor.max_connect_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.ws_url, default_ws_url());
        assert_eq!(config.engine.outcome_grace_ms, 30_000);
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            ws_url = "wss://venue.example/ws"
            timezone = "America/Sao_Paulo"

            [trading]
            base_stake = "2.5"
            smart_martingale = true
            suppression = false

            [engine]
            poll_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.timezone, "America/Sao_Paulo");
        assert_eq!(config.trading.base_stake, dec!(2.5));
        assert!(config.trading.smart_martingale);
        assert!(!config.trading.suppression);
        assert_eq!(config.trading.max_gales, 2);

        let engine = EngineConfig::from(&config.engine);
        assert_eq!(engine.poll_interval, Duration::from_millis(250));
        assert_eq!(engine.outcome_wait_per_minute, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_stake_rejected() {
        let err = AppConfig::from_toml("[trading]\nbase_stake = \"-1\"\n").unwrap_err();
        assert!(matches!(err, AppError::Executor(_)));
    }

    #[test]
    fn test_excessive_gales_rejected() {
        let err = AppConfig::from_toml("[trading]\nmax_gales = 40\nmartingale_multiplier = \"10\"\n")
            .unwrap_err();
        assert!(matches!(err, AppError::Executor(_)));
    }

    #[test]
    fn test_connection_config_mapping() {
        let ws = WsConfig {
            open_timeout_ms: 5_000,
            ..Default::default()
        };
        let conn = ws.connection_config("ws://localhost:1");
        assert_eq!(conn.url, "ws://localhost:1");
        assert_eq!(conn.open_timeout_ms, 5_000);
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string(&AppConfig::default()).unwrap();
        assert!(toml_str.contains("ws_url"));
        assert!(toml_str.contains("[trading]"));
    }
}
