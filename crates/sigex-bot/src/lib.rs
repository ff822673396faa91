//! Signal-driven options trade execution bot.
//!
//! Main application that orchestrates all components:
//! - WebSocket connection to the venue, with supervision
//! - Signal intake and normalization
//! - Scheduled execution through the trade engine

pub mod app;
pub mod config;
pub mod error;
pub mod metered_venue;
pub mod scheduler;
pub mod supervisor;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use scheduler::SignalScheduler;
pub use supervisor::ConnectionSupervisor;
