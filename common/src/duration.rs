// common/src/duration.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! Human-readable duration parsing for configuration values.
//!
//! Accepts `"45s"`, `"10m"`, `"2h"`, `"1d"`, combinations such as `"1h30m"`,
//! and bare seconds (`"600"`) for backward compatibility.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDurationError {
    input: String,
    reason: String,
}

impl ParseDurationError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseDurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid duration '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for ParseDurationError {}

/// Parse a duration string into seconds.
pub fn parse_duration(input: &str) -> Result<u64, ParseDurationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseDurationError::new(input, "empty string"));
    }

    // Bare seconds keep working.
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(secs);
    }

    let mut total: u64 = 0;
    let mut digits = String::new();

    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let unit = match c.to_ascii_lowercase() {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            other => {
                return Err(ParseDurationError::new(
                    input,
                    format!("unknown unit '{other}' (use d, h, m or s)"),
                ))
            }
        };

        if digits.is_empty() {
            return Err(ParseDurationError::new(
                input,
                format!("expected a number before '{c}'"),
            ));
        }

        let value: u64 = digits
            .parse()
            .map_err(|_| ParseDurationError::new(input, format!("invalid number '{digits}'")))?;
        digits.clear();

        total = value
            .checked_mul(unit)
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| ParseDurationError::new(input, "duration overflow"))?;
    }

    if !digits.is_empty() {
        return Err(ParseDurationError::new(
            input,
            format!("number '{digits}' is missing a unit"),
        ));
    }

    Ok(total)
}

/// Read a duration from an environment variable, in seconds, falling back to
/// `default` when unset or unparsable.
pub fn env_duration(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| parse_duration(&s).ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn parses_single_units() {
        assert_eq!(parse_duration("45s").unwrap(), 45);
        assert_eq!(parse_duration("10m").unwrap(), 600);
        assert_eq!(parse_duration("2h").unwrap(), 7_200);
        assert_eq!(parse_duration("1d").unwrap(), 86_400);
    }

    #[test]
    fn parses_raw_seconds() {
        assert_eq!(parse_duration("0").unwrap(), 0);
        assert_eq!(parse_duration("600").unwrap(), 600);
    }

    #[test]
    fn parses_combined_units() {
        assert_eq!(parse_duration("1h30m").unwrap(), 5_400);
        assert_eq!(parse_duration("1d2h3m4s").unwrap(), 86_400 + 7_200 + 180 + 4);
    }

    #[test]
    fn is_case_insensitive_and_trims() {
        assert_eq!(parse_duration(" 10M ").unwrap(), 600);
        assert_eq!(parse_duration("1H").unwrap(), 3_600);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("10m5").is_err());
    }

    #[test]
    #[serial]
    fn env_duration_falls_back() {
        let key = "WALLETGATE_TEST_DURATION";

        std::env::remove_var(key);
        assert_eq!(env_duration(key, 600), 600);

        std::env::set_var(key, "1m");
        assert_eq!(env_duration(key, 0), 60);

        std::env::set_var(key, "not-a-duration");
        assert_eq!(env_duration(key, 600), 600);

        std::env::remove_var(key);
    }
}
