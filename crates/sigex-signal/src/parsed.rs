//! Parser output before the clock time is anchored to a date.

use sigex_core::{Direction, Instrument};

/// Fields of one signal as written in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSignal {
    /// 24-hour clock.
    pub hour: u32,
    pub minute: u32,
    pub instrument: Instrument,
    pub direction: Direction,
    pub expiry_minutes: u32,
}
