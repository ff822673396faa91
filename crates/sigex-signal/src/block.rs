//! Block form: labeled multi-line announcements.
//!
//! ```text
//! NEW SIGNAL!
//! Trade: AUD/JPY (OTC)
//! Timer: 5 minutes
//! Entry: 12:36 PM
//! Direction: BUY
//! ```
//!
//! Decorations (emoji, flags, trailing martingale schedules) are ignored.
//! BUY maps to CALL and SELL to PUT.

use crate::compact::parse_clock;
use crate::error::{SignalError, SignalResult};
use crate::parsed::ParsedSignal;
use crate::patterns::Patterns;
use sigex_core::{Direction, Instrument};

const BLOCK_INDICATORS: [&str; 4] = ["Trade:", "Timer:", "Entry:", "Direction:"];

/// True when `text` carries every block field label.
pub fn is_signal_message(text: &str) -> bool {
    !text.is_empty() && BLOCK_INDICATORS.iter().all(|label| text.contains(label))
}

pub(crate) fn is_block_shaped(p: &Patterns, text: &str) -> bool {
    p.block_trade.is_match(text)
}

/// Split text holding several announcements at each `Trade:` label.
pub(crate) fn split_blocks<'a>(p: &Patterns, text: &'a str) -> Vec<&'a str> {
    let starts: Vec<usize> = p.block_trade.find_iter(text).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .collect()
}

/// Parse one announcement.
pub(crate) fn parse_block(p: &Patterns, text: &str) -> SignalResult<ParsedSignal> {
    let pair = p
        .block_pair
        .captures(text)
        .ok_or(SignalError::MissingBlockField("Trade"))?;
    let raw_pair = format!("{}/{}", &pair[1], &pair[2]);
    let mut instrument =
        Instrument::new(&raw_pair).map_err(|_| SignalError::InvalidPair(raw_pair.clone()))?;
    if p.block_otc.is_match(text) {
        instrument = instrument.otc();
    }

    let timer = p
        .block_timer
        .captures(text)
        .ok_or(SignalError::MissingBlockField("Timer"))?;
    let expiry_minutes = match timer[1].parse::<u32>() {
        Ok(minutes) if minutes > 0 => minutes,
        _ => return Err(SignalError::InvalidExpiry(timer[1].to_string())),
    };

    let entry = p
        .block_entry
        .captures(text)
        .ok_or(SignalError::MissingBlockField("Entry"))?;
    let clock = format!("{}:{}", &entry[1], &entry[2]);
    let (hour, minute) = match entry.get(3) {
        Some(meridiem) => to_24h(&clock, &entry[1], &entry[2], meridiem.as_str())?,
        None => parse_clock(p, &clock)?,
    };

    let word = p
        .block_direction
        .captures(text)
        .ok_or(SignalError::MissingBlockField("Direction"))?;
    let direction = Direction::from_trade_word(&word[1])
        .map_err(|_| SignalError::InvalidDirection(word[1].to_string()))?;

    Ok(ParsedSignal {
        hour,
        minute,
        instrument,
        direction,
        expiry_minutes,
    })
}

/// 12-hour clock to 24-hour: 12 AM is 00, 12 PM is 12.
fn to_24h(clock: &str, hour: &str, minute: &str, meridiem: &str) -> SignalResult<(u32, u32)> {
    let invalid = || SignalError::InvalidTime(format!("{clock} {meridiem}"));
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&hour) || minute > 59 {
        return Err(invalid());
    }
    let pm = meridiem.eq_ignore_ascii_case("PM");
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    Ok((hour, minute))
}
