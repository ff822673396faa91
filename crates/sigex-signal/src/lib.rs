//! Signal normalization for sigex.
//!
//! Converts heterogeneous signal text into canonical
//! [`Signal`](sigex_core::Signal) records:
//! - Block announcements (`Trade:` / `Timer:` / `Entry:` / `Direction:`)
//! - Compact lines (`HH:MM;PAIR;DIRECTION;EXPIRY`), with a cleaning pass for
//!   hand-typed noise
//!
//! Clock times are anchored to a date in a configurable timezone.

mod block;
mod compact;
pub mod error;
pub mod normalizer;
mod parsed;
mod patterns;
pub mod resolve;

pub use block::is_signal_message;
pub use error::{SignalError, SignalResult};
pub use normalizer::{NormalizedBatch, SignalNormalizer, DEFAULT_LATE_GRACE_MINUTES};
pub use parsed::ParsedSignal;
pub use resolve::resolve_clock_time;
