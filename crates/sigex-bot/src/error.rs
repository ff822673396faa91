//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] sigex_ws::WsError),

    #[error("Could not connect after {attempts} attempts: {last_error}")]
    ConnectionExhausted { attempts: u32, last_error: String },

    #[error("Signal error: {0}")]
    Signal(#[from] sigex_signal::SignalError),

    #[error("Executor error: {0}")]
    Executor(#[from] sigex_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] sigex_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
