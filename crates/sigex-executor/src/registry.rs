//! Duplicate-trade suppression.
//!
//! At most one execution run may be active per (instrument, direction).
//! Acquisition is a single check-and-insert under one lock, so two
//! concurrent attempts for the same key cannot both succeed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use sigex_core::{Direction, Instrument};
use tracing::debug;

type TradeKey = (Instrument, Direction);

/// Set of currently active (instrument, direction) runs.
#[derive(Debug)]
pub struct ActiveTradeRegistry {
    active: Mutex<HashSet<TradeKey>>,
    enabled: AtomicBool,
}

impl Default for ActiveTradeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveTradeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Turn suppression on or off. While off, every acquisition succeeds
    /// and nothing is recorded.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Mark the key active. Returns false if it already was.
    pub fn try_acquire(&self, instrument: &Instrument, direction: Direction) -> bool {
        self.acquire_inner(instrument, direction).is_some()
    }

    /// Returns `Some(true)` if a key was inserted, `Some(false)` if
    /// suppression is off, `None` if the key is taken.
    fn acquire_inner(&self, instrument: &Instrument, direction: Direction) -> Option<bool> {
        if !self.is_enabled() {
            return Some(false);
        }
        let inserted = self.active.lock().insert((instrument.clone(), direction));
        if inserted {
            debug!(%instrument, %direction, "Trade key acquired");
            Some(true)
        } else {
            None
        }
    }

    /// Remove the key. Releasing an absent key is a no-op.
    pub fn release(&self, instrument: &Instrument, direction: Direction) {
        if self.active.lock().remove(&(instrument.clone(), direction)) {
            debug!(%instrument, %direction, "Trade key released");
        }
    }

    pub fn is_active(&self, instrument: &Instrument, direction: Direction) -> bool {
        self.active.lock().contains(&(instrument.clone(), direction))
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Acquire the key for the lifetime of the returned lease.
    pub fn try_lease(
        &self,
        instrument: &Instrument,
        direction: Direction,
    ) -> Option<ActiveTradeLease<'_>> {
        let owns_key = self.acquire_inner(instrument, direction)?;
        Some(ActiveTradeLease {
            registry: self,
            instrument: instrument.clone(),
            direction,
            owns_key,
        })
    }
}

/// Releases its key on drop, whichever way the run ends.
#[derive(Debug)]
pub struct ActiveTradeLease<'a> {
    registry: &'a ActiveTradeRegistry,
    instrument: Instrument,
    direction: Direction,
    owns_key: bool,
}

impl Drop for ActiveTradeLease<'_> {
    fn drop(&mut self) {
        if self.owns_key {
            self.registry.release(&self.instrument, self.direction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn eurusd() -> Instrument {
        Instrument::new("EURUSD").unwrap()
    }

    #[test]
    fn test_acquire_release() {
        let registry = ActiveTradeRegistry::new();
        assert!(registry.try_acquire(&eurusd(), Direction::Call));
        assert!(!registry.try_acquire(&eurusd(), Direction::Call));
        // Opposite direction is a different key.
        assert!(registry.try_acquire(&eurusd(), Direction::Put));
        assert_eq!(registry.active_count(), 2);

        registry.release(&eurusd(), Direction::Call);
        assert!(!registry.is_active(&eurusd(), Direction::Call));
        assert!(registry.try_acquire(&eurusd(), Direction::Call));

        // Absent key.
        registry.release(&Instrument::new("GBPUSD").unwrap(), Direction::Put);
        assert_eq!(registry.active_count(), 2);
    }

    #[test]
    fn test_lease_releases_on_drop() {
        let registry = ActiveTradeRegistry::new();
        {
            let lease = registry.try_lease(&eurusd(), Direction::Call);
            assert!(lease.is_some());
            assert!(registry.try_lease(&eurusd(), Direction::Call).is_none());
        }
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_failed_lease_keeps_holder() {
        let registry = ActiveTradeRegistry::new();
        let _held = registry.try_lease(&eurusd(), Direction::Put).unwrap();
        // Dropping a failed lease attempt must not free the holder's key.
        drop(registry.try_lease(&eurusd(), Direction::Put));
        assert!(registry.is_active(&eurusd(), Direction::Put));
    }

    #[test]
    fn test_disabled_registry_never_suppresses() {
        let registry = ActiveTradeRegistry::new();
        registry.set_enabled(false);
        let _a = registry.try_lease(&eurusd(), Direction::Call).unwrap();
        let _b = registry.try_lease(&eurusd(), Direction::Call).unwrap();
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_concurrent_acquire_single_winner() {
        let registry = Arc::new(ActiveTradeRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.try_acquire(&eurusd(), Direction::Call))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
