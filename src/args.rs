//! Parsers for command line values

use sump_shared::ConfigError;

/// Split `s` into a leading number (with its radix prefix) and the rest
fn split_number(s: &str) -> (&str, &str) {
    let digits_start = if s.starts_with("0x") || s.starts_with("0X") { 2 } else { 0 };
    let is_digit = |c: char| {
        if digits_start == 2 {
            c.is_ascii_hexdigit()
        } else {
            c.is_ascii_digit()
        }
    };

    let end = s[digits_start..]
        .find(|c: char| !is_digit(c))
        .map_or(s.len(), |i| i + digits_start);

    s.split_at(end)
}

/// Parse a 32 bit number in hex (`0x`), octal (leading `0`) or decimal
pub fn parse_number(s: &str) -> Result<u32, ConfigError> {
    let invalid = || ConfigError::InvalidNumber(s.to_string());

    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }

    u32::from_str_radix(digits, radix).map_err(|_| invalid())
}

/// Parse a number with an optional `k` or `M` multiplier, optionally
/// followed by `unit` in any case
fn parse_si(s: &str, unit: &str) -> Result<u32, ConfigError> {
    let invalid = || ConfigError::InvalidNumber(s.to_string());

    let (number, rest) = split_number(s);
    let value = u64::from(parse_number(number)?);

    let (multiplier, rest) = match rest.chars().next() {
        Some('k') | Some('K') => (1_000, &rest[1..]),
        Some('m') | Some('M') => (1_000_000, &rest[1..]),
        _ => (1, rest),
    };

    if !rest.is_empty() && !rest.eq_ignore_ascii_case(unit) {
        return Err(invalid());
    }

    let value = value * multiplier;
    if value > u64::from(u32::MAX) {
        return Err(invalid());
    }
    Ok(value as u32)
}

/// Parse a frequency such as `100M`, `48MHz` or `32768`
pub fn parse_frequency(s: &str) -> Result<u32, ConfigError> {
    parse_si(s, "hz")
}

/// Parse a memory size such as `16k`, `64KB` or `0x4000`
pub fn parse_memory_size(s: &str) -> Result<u32, ConfigError> {
    parse_si(s, "B")
}

/// Parse a `mask=value` trigger condition
pub fn parse_trigger(s: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = || ConfigError::InvalidTrigger(s.to_string());

    let mut parts = s.splitn(2, '=');
    let mask = parts.next().ok_or_else(invalid)?;
    let value = parts.next().ok_or_else(invalid)?;

    Ok((
        parse_number(mask).map_err(|_| invalid())?,
        parse_number(value).map_err(|_| invalid())?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_in_each_radix() {
        assert_eq!(parse_number("12"), Ok(12));
        assert_eq!(parse_number("0"), Ok(0));
        assert_eq!(parse_number("0x1F"), Ok(31));
        assert_eq!(parse_number("0Xff"), Ok(255));
        assert_eq!(parse_number("010"), Ok(8));
        assert_eq!(parse_number("4294967295"), Ok(u32::MAX));
    }

    #[test]
    fn bad_numbers() {
        for s in &["", "0x", "abc", "12a", "09", "4294967296", "-1", " 1"] {
            assert!(parse_number(s).is_err(), "{:?} should not parse", s);
        }
    }

    #[test]
    fn si_suffixes() {
        assert_eq!(parse_frequency("100M"), Ok(100_000_000));
        assert_eq!(parse_frequency("100m"), Ok(100_000_000));
        assert_eq!(parse_frequency("48MHz"), Ok(48_000_000));
        assert_eq!(parse_frequency("32768"), Ok(32768));
        assert_eq!(parse_frequency("10hz"), Ok(10));
        assert_eq!(parse_memory_size("16k"), Ok(16_000));
        assert_eq!(parse_memory_size("24KB"), Ok(24_000));
        assert_eq!(parse_memory_size("0x4000"), Ok(0x4000));
        assert_eq!(parse_memory_size("0x10k"), Ok(16_000));
    }

    #[test]
    fn bad_si_values() {
        assert!(parse_frequency("100Mb").is_err());
        assert!(parse_frequency("5000M").is_err());
        assert!(parse_memory_size("16kHz").is_err());
        assert!(parse_memory_size("k").is_err());
    }

    #[test]
    fn trigger_pairs() {
        assert_eq!(parse_trigger("0x1=0x1"), Ok((1, 1)));
        assert_eq!(parse_trigger("0xF0=16"), Ok((0xF0, 16)));
        assert!(parse_trigger("0x1").is_err());
        assert!(parse_trigger("0x1=").is_err());
        assert!(parse_trigger("=1").is_err());
    }
}
