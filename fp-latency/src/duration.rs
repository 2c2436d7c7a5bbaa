//! Go-style duration strings.
//!
//! Accepts the grammar of Go's `time.ParseDuration`: an optional sign
//! followed by one or more decimal numbers, each with a unit suffix
//! (`"300ms"`, `"-1.5h"`, `"2h45m"`). Valid units are `ns`, `us` (or `µs`),
//! `ms`, `s`, `m` and `h`.

use std::time::Duration;

use thiserror::Error;

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

// Largest magnitude a Go duration (int64 nanoseconds) can hold.
const MAX_NANOS: u128 = i64::MAX as u128;

/// Errors returned by [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },

    #[error("duration {0:?} out of range")]
    Overflow(String),
}

fn unit_nanos(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(1),
        // U+00B5 micro sign and U+03BC Greek small letter mu.
        "us" | "\u{00b5}s" | "\u{03bc}s" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Split the leading run of ASCII digits off `s`.
fn take_digits(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    s.split_at(end)
}

/// Parse a Go duration string.
///
/// Negative durations are valid input but clamp to [`Duration::ZERO`],
/// since a negative wait elapses immediately.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());

    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        if !rest.starts_with(|c: char| c == '.' || c.is_ascii_digit()) {
            return Err(invalid());
        }

        let (int_digits, after_int) = take_digits(rest);
        let whole: u128 = if int_digits.is_empty() {
            0
        } else {
            int_digits
                .parse()
                .map_err(|_| DurationError::Overflow(input.to_string()))?
        };
        rest = after_int;

        // Fractional digits beyond nanosecond resolution of the largest
        // unit cannot change the result and are dropped.
        let mut frac: u128 = 0;
        let mut scale: u128 = 1;
        let mut frac_digits = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let (digits, after) = take_digits(after_dot);
            for d in digits.bytes().take(18) {
                frac = frac * 10 + u128::from(d - b'0');
                scale *= 10;
            }
            frac_digits = digits;
            rest = after;
        }

        if int_digits.is_empty() && frac_digits.is_empty() {
            return Err(invalid());
        }

        let unit_end = rest
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (unit, after_unit) = rest.split_at(unit_end);
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let nanos = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;
        rest = after_unit;

        let nanos = u128::from(nanos);
        total = whole
            .checked_mul(nanos)
            .and_then(|v| v.checked_add(frac * nanos / scale))
            .and_then(|v| total.checked_add(v))
            .filter(|v| *v <= MAX_NANOS)
            .ok_or_else(|| DurationError::Overflow(input.to_string()))?;
    }

    if negative {
        return Ok(Duration::ZERO);
    }

    // MAX_NANOS fits in a u64.
    Ok(Duration::from_nanos(total as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_units() {
        assert_eq!(parse_duration("10ms"), Ok(Duration::from_millis(10)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("7ns"), Ok(Duration::from_nanos(7)));
        assert_eq!(parse_duration("5us"), Ok(Duration::from_micros(5)));
        assert_eq!(parse_duration("5µs"), Ok(Duration::from_micros(5)));
        assert_eq!(parse_duration("5μs"), Ok(Duration::from_micros(5)));
    }

    #[test]
    fn test_compound_and_fractional() {
        assert_eq!(
            parse_duration("1h2m3s"),
            Ok(Duration::from_secs(3600 + 120 + 3))
        );
        assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration(".5s"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("1.s"), Ok(Duration::from_secs(1)));
        assert_eq!(parse_duration("+20ms"), Ok(Duration::from_millis(20)));
        assert_eq!(
            parse_duration("1.000000001s"),
            Ok(Duration::from_nanos(1_000_000_001))
        );
    }

    #[test]
    fn test_zero_and_negative() {
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert_eq!(parse_duration("-0"), Ok(Duration::ZERO));
        assert_eq!(parse_duration("0s"), Ok(Duration::ZERO));
        assert_eq!(parse_duration("-5s"), Ok(Duration::ZERO));
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(parse_duration(""), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("-"), Err(DurationError::Invalid(_))));
        assert!(matches!(
            parse_duration("invalid"),
            Err(DurationError::Invalid(_))
        ));
        assert!(matches!(parse_duration(".s"), Err(DurationError::Invalid(_))));
        assert!(matches!(
            parse_duration("10"),
            Err(DurationError::MissingUnit(_))
        ));
        assert!(matches!(
            parse_duration("10ms5"),
            Err(DurationError::MissingUnit(_))
        ));
        assert_eq!(
            parse_duration("3d"),
            Err(DurationError::UnknownUnit {
                unit: "d".to_string(),
                input: "3d".to_string(),
            })
        );
        assert!(matches!(
            parse_duration("1 s"),
            Err(DurationError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn test_overflow() {
        assert!(matches!(
            parse_duration("9223372036854775808ns"),
            Err(DurationError::Overflow(_))
        ));
        assert!(matches!(
            parse_duration("3000000h"),
            Err(DurationError::Overflow(_))
        ));
        assert_eq!(
            parse_duration("9223372036854775807ns"),
            Ok(Duration::from_nanos(i64::MAX as u64))
        );
    }
}
