//! Signal normalizer: raw text in, canonical [`Signal`]s out.
//!
//! Each chunk is tried as a block announcement first, then as a compact
//! line; the first parser that succeeds wins. Batch input is processed
//! line by line (or block by block) and malformed entries are logged and
//! dropped without failing the batch.

use crate::block::{is_block_shaped, parse_block, split_blocks};
use crate::compact::{parse_compact, split_compact_signals};
use crate::error::{SignalError, SignalResult};
use crate::parsed::ParsedSignal;
use crate::patterns::Patterns;
use crate::resolve::resolve_clock_time;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use sigex_core::Signal;
use tracing::{debug, info, warn};

/// Default window during which a past clock time still means today.
pub const DEFAULT_LATE_GRACE_MINUTES: u32 = 30;

/// Result of normalizing a batch of text.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub signals: Vec<Signal>,
    /// Entries that looked like signals but failed validation.
    pub rejected: usize,
}

/// Converts raw signal text into canonical signals.
#[derive(Debug)]
pub struct SignalNormalizer {
    tz: Tz,
    late_grace: Duration,
    patterns: Patterns,
}

impl SignalNormalizer {
    /// Create a normalizer resolving clock times in `tz`.
    pub fn new(tz: Tz, late_grace_minutes: u32) -> SignalResult<Self> {
        Ok(Self {
            tz,
            late_grace: Duration::minutes(i64::from(late_grace_minutes)),
            patterns: Patterns::compile()?,
        })
    }

    /// Create a normalizer from an IANA zone name. Unknown names fall back
    /// to UTC with a warning.
    pub fn with_timezone_name(name: &str, late_grace_minutes: u32) -> SignalResult<Self> {
        let tz = match name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(e) => {
                warn!(timezone = %name, error = %e, "Unknown timezone, falling back to UTC");
                Tz::UTC
            }
        };
        info!(timezone = %tz.name(), "Signal timezone set");
        Self::new(tz, late_grace_minutes)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Normalize one chunk holding a single signal in either form.
    pub fn normalize_chunk(&self, chunk: &str, now: DateTime<Utc>) -> SignalResult<Signal> {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            return Err(SignalError::Empty);
        }

        let parsed = if is_block_shaped(&self.patterns, chunk) {
            match parse_block(&self.patterns, chunk) {
                Ok(parsed) => parsed,
                Err(block_err) => {
                    parse_compact(&self.patterns, chunk).map_err(|_| block_err)?
                }
            }
        } else {
            parse_compact(&self.patterns, chunk)?
        };

        self.to_signal(parsed, now)
    }

    /// Normalize free text holding any number of signals.
    ///
    /// Text carrying block announcements is parsed block by block;
    /// otherwise every line is split at its clock tokens and each piece
    /// parsed as a compact signal. Lines starting with `#` are comments.
    pub fn normalize_batch(&self, text: &str, now: DateTime<Utc>) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();

        if is_block_shaped(&self.patterns, text) {
            for block in split_blocks(&self.patterns, text) {
                let result = parse_block(&self.patterns, block)
                    .and_then(|parsed| self.to_signal(parsed, now));
                self.collect(&mut batch, block, result);
            }
            info!(
                parsed = batch.signals.len(),
                rejected = batch.rejected,
                format = "block",
                "Normalized signal batch"
            );
            return batch;
        }

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let segments = split_compact_signals(&self.patterns, trimmed);
            if segments.is_empty() {
                warn!(line = %trimmed, "Skipping line without a clock time");
                batch.rejected += 1;
                continue;
            }

            for segment in segments {
                let result = parse_compact(&self.patterns, &segment)
                    .and_then(|parsed| self.to_signal(parsed, now));
                self.collect(&mut batch, &segment, result);
            }
        }

        info!(
            parsed = batch.signals.len(),
            rejected = batch.rejected,
            format = "compact",
            "Normalized signal batch"
        );
        batch
    }

    fn collect(&self, batch: &mut NormalizedBatch, source: &str, result: SignalResult<Signal>) {
        match result {
            Ok(signal) => {
                debug!(%signal, "Parsed signal");
                batch.signals.push(signal);
            }
            Err(e) => {
                warn!(input = %source.trim(), error = %e, "Dropping malformed signal");
                batch.rejected += 1;
            }
        }
    }

    fn to_signal(&self, parsed: ParsedSignal, now: DateTime<Utc>) -> SignalResult<Signal> {
        let scheduled_time =
            resolve_clock_time(self.tz, now, parsed.hour, parsed.minute, self.late_grace)?;
        Ok(Signal::new(
            scheduled_time,
            parsed.instrument,
            parsed.direction,
            parsed.expiry_minutes,
        )?)
    }
}
