//! Compact form: `HH:MM;PAIR;DIRECTION;EXPIRY`.
//!
//! Hand-typed lines are noisy, so a cleaning pass runs before splitting:
//! letter-O typed for zero is repaired, spaced separator words become `;`,
//! bare whitespace becomes `;` when the line has no `;` at all, and lines
//! mashed together without separators are recovered by pattern.

use crate::error::{SignalError, SignalResult};
use crate::parsed::ParsedSignal;
use crate::patterns::Patterns;
use sigex_core::{Direction, Instrument};

/// Repair `O`/`o` typed for `0` in clock and expiry tokens.
pub(crate) fn fix_zero_typos(p: &Patterns, line: &str) -> String {
    let line = p.o_before_digit.replace_all(line, "${1}0${2}");
    let line = p.o_before_colon.replace_all(&line, "${1}0:");
    p.o_after_digit.replace_all(&line, "${1}0").into_owned()
}

/// Normalize a raw compact line to `;`-separated fields.
pub(crate) fn clean_compact_line(p: &Patterns, line: &str) -> String {
    let line = line.trim();
    let line = p.separators.replace_all(line, ";");
    let line = fix_zero_typos(p, &line);

    let mut line = if line.contains(';') {
        line
    } else {
        p.whitespace.replace_all(line.trim(), ";").into_owned()
    };
    line.retain(|c| !c.is_whitespace());

    if field_count(&line) < 4 {
        let recovered = p
            .mashed
            .captures(&line)
            .map(|caps| format!("{};{};{};{}", &caps[1], &caps[2], &caps[3], &caps[4]));
        if let Some(recovered) = recovered {
            line = recovered;
        }
    }

    line
}

fn field_count(line: &str) -> usize {
    line.split(';').filter(|f| !f.is_empty()).count()
}

/// Split a line holding several compact signals at each clock token.
///
/// Text before the first clock token is dropped. Returns nothing when the
/// line has no clock token at all.
pub(crate) fn split_compact_signals(p: &Patterns, line: &str) -> Vec<String> {
    let fixed = fix_zero_typos(p, line);
    let starts: Vec<usize> = p.clock_token.find_iter(&fixed).map(|m| m.start()).collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(fixed.len());
            fixed[start..end]
                .trim()
                .trim_end_matches([';', ',', '|'])
                .to_string()
        })
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Parse one compact signal.
pub(crate) fn parse_compact(p: &Patterns, line: &str) -> SignalResult<ParsedSignal> {
    let cleaned = clean_compact_line(p, line);
    if cleaned.is_empty() {
        return Err(SignalError::Empty);
    }

    let fields: Vec<&str> = cleaned.split(';').filter(|f| !f.is_empty()).collect();
    if fields.len() < 4 {
        return Err(SignalError::MissingFields {
            found: fields.len(),
            line: line.trim().to_string(),
        });
    }

    let (hour, minute) = parse_clock(p, fields[0])?;
    let instrument =
        Instrument::new(fields[1]).map_err(|_| SignalError::InvalidPair(fields[1].to_string()))?;
    let direction: Direction = fields[2]
        .parse()
        .map_err(|_| SignalError::InvalidDirection(fields[2].to_string()))?;
    let expiry_minutes = parse_expiry(p, fields[3])?;

    Ok(ParsedSignal {
        hour,
        minute,
        instrument,
        direction,
        expiry_minutes,
    })
}

/// Strict 24-hour `H:MM` / `HH:MM`.
pub(crate) fn parse_clock(p: &Patterns, token: &str) -> SignalResult<(u32, u32)> {
    let invalid = || SignalError::InvalidTime(token.to_string());
    let caps = p.clock_exact.captures(token).ok_or_else(invalid)?;
    let hour: u32 = caps[1].parse().map_err(|_| invalid())?;
    let minute: u32 = caps[2].parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

/// Expiry tokens such as `5`, `M5`, `5m`, `15min`. Must contain a digit.
fn parse_expiry(p: &Patterns, token: &str) -> SignalResult<u32> {
    if !token.chars().any(|c| c.is_ascii_digit()) {
        return Err(SignalError::ExpiryWithoutDigits(token.to_string()));
    }
    let digits = p.non_digit.replace_all(token, "");
    match digits.parse::<u32>() {
        Ok(minutes) if minutes > 0 => Ok(minutes),
        _ => Err(SignalError::InvalidExpiry(token.to_string())),
    }
}
