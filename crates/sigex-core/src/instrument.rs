//! Instrument and direction types.
//!
//! An instrument is a base/quote pair in its canonical venue form
//! (`EURUSD`), optionally tagged as the over-the-counter variant
//! (`EURUSD-OTC`) that trades outside normal market hours.

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Suffix marking the over-the-counter variant of an instrument.
pub const OTC_SUFFIX: &str = "-OTC";

/// Canonical instrument identifier.
///
/// Always non-empty and upper-case, with pair separators (`/`) and
/// whitespace removed: `eur/usd` and `EURUSD` name the same instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Instrument(String);

impl Instrument {
    /// Normalize and validate an instrument identifier.
    pub fn new(raw: &str) -> Result<Self> {
        let canonical: String = raw
            .chars()
            .filter(|c| *c != '/' && !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect();

        let base = canonical.strip_suffix(OTC_SUFFIX).unwrap_or(&canonical);
        if base.is_empty() || !base.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidInstrument(raw.to_string()));
        }

        Ok(Self(canonical))
    }

    /// Returns the canonical identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the over-the-counter variant.
    pub fn is_otc(&self) -> bool {
        self.0.ends_with(OTC_SUFFIX)
    }

    /// Returns the over-the-counter variant of this instrument.
    #[must_use]
    pub fn otc(&self) -> Self {
        if self.is_otc() {
            self.clone()
        } else {
            Self(format!("{}{OTC_SUFFIX}", self.0))
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Instrument {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Instrument {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Instrument> for String {
    fn from(value: Instrument) -> Self {
        value.0
    }
}

/// Option direction: CALL (price goes up) or PUT (price goes down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Call,
    Put,
}

impl Direction {
    /// Map a trade verb to a direction: BUY is CALL, SELL is PUT.
    pub fn from_trade_word(word: &str) -> Result<Self> {
        match word.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Call),
            "SELL" => Ok(Self::Put),
            _ => Err(CoreError::InvalidDirection(word.to_string())),
        }
    }

    /// Lower-case form used on the venue wire.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    /// Accepts exactly CALL or PUT (case-insensitive).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CALL" => Ok(Self::Call),
            "PUT" => Ok(Self::Put),
            _ => Err(CoreError::InvalidDirection(s.to_string())),
        }
    }
}
