//! Externally owned trading settings.
//!
//! The engine reads one snapshot at the start of each run and never writes
//! settings back; operators (config reload, admin commands) own mutation.

use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutorError, ExecutorResult};

/// Upper bound on `max_gales`.
pub const MAX_GALES: u32 = 20;

fn default_base_stake() -> Decimal {
    Decimal::ONE
}

fn default_max_gales() -> u32 {
    2
}

fn default_multiplier() -> Decimal {
    Decimal::TWO
}

/// Stake sizing and run gating read by the engine at run start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingSettings {
    #[serde(default = "default_base_stake")]
    pub base_stake: Decimal,
    /// Escalations allowed after the direct attempt (classic mode), or the
    /// ledger ceiling (smart mode).
    #[serde(default = "default_max_gales")]
    pub max_gales: u32,
    /// Smart-mode stake factor per ledger level.
    #[serde(default = "default_multiplier")]
    pub martingale_multiplier: Decimal,
    #[serde(default)]
    pub smart_martingale: bool,
    #[serde(default)]
    pub paused: bool,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            base_stake: default_base_stake(),
            max_gales: default_max_gales(),
            martingale_multiplier: default_multiplier(),
            smart_martingale: false,
            paused: false,
        }
    }
}

impl TradingSettings {
    /// Reject settings the engine cannot trade with.
    pub fn validate(&self) -> ExecutorResult<()> {
        if self.base_stake <= Decimal::ZERO {
            return Err(ExecutorError::InvalidSettings(format!(
                "base_stake must be positive, got {}",
                self.base_stake
            )));
        }
        if self.max_gales > MAX_GALES {
            return Err(ExecutorError::InvalidSettings(format!(
                "max_gales must be at most {MAX_GALES}, got {}",
                self.max_gales
            )));
        }
        if self.martingale_multiplier < Decimal::ONE {
            return Err(ExecutorError::InvalidSettings(format!(
                "martingale_multiplier must be at least 1, got {}",
                self.martingale_multiplier
            )));
        }
        Ok(())
    }
}

/// Shared, mutable handle to the current settings.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<TradingSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: TradingSettings) -> ExecutorResult<Self> {
        settings.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(settings)),
        })
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> TradingSettings {
        self.inner.read().clone()
    }

    /// Replace all settings. Invalid settings leave the current ones in place.
    pub fn update(&self, settings: TradingSettings) -> ExecutorResult<()> {
        settings.validate()?;
        *self.inner.write() = settings;
        Ok(())
    }

    pub fn set_paused(&self, paused: bool) {
        self.inner.write().paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.read().paused
    }
}
