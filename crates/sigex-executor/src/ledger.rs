//! Per-instrument martingale level for smart mode.

use std::collections::HashMap;

use parking_lot::Mutex;
use sigex_core::Instrument;
use tracing::debug;

/// Loss-streak level per instrument. Absent means 0.
#[derive(Debug, Default)]
pub struct MartingaleLedger {
    levels: Mutex<HashMap<Instrument, u32>>,
}

impl MartingaleLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_level(&self, instrument: &Instrument) -> u32 {
        self.levels.lock().get(instrument).copied().unwrap_or(0)
    }

    pub fn reset(&self, instrument: &Instrument) {
        if self.levels.lock().remove(instrument).is_some() {
            debug!(%instrument, "Martingale level reset");
        }
    }

    /// Bump the level after a loss. Once the bumped level would pass
    /// `ceiling`, the level wraps back to 0. Returns the new level.
    pub fn increment_or_reset(&self, instrument: &Instrument, ceiling: u32) -> u32 {
        let mut levels = self.levels.lock();
        let current = levels.get(instrument).copied().unwrap_or(0);
        let next = current + 1;
        if next > ceiling {
            levels.remove(instrument);
            debug!(%instrument, ceiling, "Martingale ceiling passed, level reset");
            0
        } else {
            levels.insert(instrument.clone(), next);
            next
        }
    }
}
