//! Compiled regular expressions shared by the parsers.

use regex::Regex;

/// All patterns, compiled once per normalizer.
#[derive(Debug)]
pub(crate) struct Patterns {
    /// `O`/`o` typed for zero in front of a digit: `O8:O5`.
    pub o_before_digit: Regex,
    /// `O`/`o` typed for zero in front of a colon: `1O:05`, `O :05`.
    pub o_before_colon: Regex,
    /// `O`/`o` typed for zero after a digit: `10:3O`.
    pub o_after_digit: Regex,
    /// Spaced separator words and symbols: ` i `, `|`, `,`, ` - `.
    pub separators: Regex,
    pub whitespace: Regex,
    /// Clock token anywhere in a line.
    pub clock_token: Regex,
    /// Strict `H:MM` / `HH:MM`.
    pub clock_exact: Regex,
    /// Mashed compact line: `12:00EURUSDCALL5`.
    pub mashed: Regex,
    pub non_digit: Regex,

    pub block_trade: Regex,
    pub block_pair: Regex,
    pub block_otc: Regex,
    pub block_timer: Regex,
    pub block_entry: Regex,
    pub block_direction: Regex,
}

impl Patterns {
    pub fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            o_before_digit: Regex::new(r"(^|[^A-Za-z])[Oo](\d)")?,
            o_before_colon: Regex::new(r"(^|[^A-Za-z])[Oo]\s*:")?,
            o_after_digit: Regex::new(r"(\d)[Oo]")?,
            separators: Regex::new(r"\s+i\s+|\s*\|\s*|\s*,\s*|\s+-\s+")?,
            whitespace: Regex::new(r"\s+")?,
            clock_token: Regex::new(r"\d{1,2}:\d{2}")?,
            clock_exact: Regex::new(r"^(\d{1,2}):(\d{2})$")?,
            mashed: Regex::new(
                r"(?i)^(\d{1,2}:\d{2});*([A-Z]{3}/?[A-Z]{3}(?:-OTC)?);*(CALL|PUT);*([A-Z]*\d{1,3}[A-Z]*)$",
            )?,
            non_digit: Regex::new(r"\D")?,

            block_trade: Regex::new(r"(?i)Trade:")?,
            block_pair: Regex::new(r"(?i)Trade:[^\n]*?([A-Z]{3})\s*/\s*([A-Z]{3})")?,
            block_otc: Regex::new(r"(?i)Trade:[^\n]*\bOTC\b")?,
            block_timer: Regex::new(r"(?i)Timer:\s*(\d+)\s*min")?,
            block_entry: Regex::new(r"(?i)Entry:\s*(\d{1,2}):(\d{2})\s*(AM|PM)?")?,
            block_direction: Regex::new(r"(?i)Direction:\s*([A-Z]+)")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        let p = Patterns::compile().unwrap();
        assert!(p.clock_exact.is_match("8:05"));
        assert!(!p.clock_exact.is_match("108:05"));
        assert!(p.mashed.is_match("12:00EURUSDCALL5"));
        assert!(p.mashed.is_match("12:00;EUR/USD-OTC;put;M5"));
    }
}
