//! Canonical trade signal.

use crate::{CoreError, Direction, Instrument, Result};
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;

/// A normalized instruction to trade an instrument in a direction,
/// for a fixed expiry, starting at a scheduled wall-clock time.
///
/// Immutable once built; all fields are validated by [`Signal::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signal {
    scheduled_time: DateTime<Tz>,
    instrument: Instrument,
    direction: Direction,
    expiry_minutes: u32,
}

impl Signal {
    /// Build a signal. Fails if `expiry_minutes` is zero.
    pub fn new(
        scheduled_time: DateTime<Tz>,
        instrument: Instrument,
        direction: Direction,
        expiry_minutes: u32,
    ) -> Result<Self> {
        if expiry_minutes == 0 {
            return Err(CoreError::InvalidExpiry(expiry_minutes));
        }
        Ok(Self {
            scheduled_time,
            instrument,
            direction,
            expiry_minutes,
        })
    }

    pub fn scheduled_time(&self) -> DateTime<Tz> {
        self.scheduled_time
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn expiry_minutes(&self) -> u32 {
        self.expiry_minutes
    }

    /// Re-serialize into the compact `HH:MM;INSTRUMENT;DIRECTION;EXPIRY` form.
    ///
    /// Only the clock time is kept; the date is re-resolved when parsed again.
    pub fn to_compact(&self) -> String {
        format!(
            "{};{};{};{}",
            self.scheduled_time.format("%H:%M"),
            self.instrument,
            self.direction,
            self.expiry_minutes
        )
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}m",
            self.scheduled_time.format("%Y-%m-%d %H:%M %Z"),
            self.instrument,
            self.direction,
            self.expiry_minutes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Tz> {
        chrono_tz::UTC.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_signal_rejects_zero_expiry() {
        let inst = Instrument::new("EURUSD").unwrap();
        let err = Signal::new(at(8, 5), inst, Direction::Call, 0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidExpiry(0)));
    }

    #[test]
    fn test_signal_to_compact() {
        let inst = Instrument::new("EUR/USD").unwrap().otc();
        let signal = Signal::new(at(8, 5), inst, Direction::Put, 15).unwrap();
        assert_eq!(signal.to_compact(), "08:05;EURUSD-OTC;PUT;15");
    }

    #[test]
    fn test_signal_display() {
        let inst = Instrument::new("GBPUSD").unwrap();
        let signal = Signal::new(at(21, 30), inst, Direction::Call, 5).unwrap();
        assert_eq!(signal.to_string(), "2024-03-01 21:30 UTC GBPUSD CALL 5m");
    }
}
