//! Duration values in manifests.
//!
//! Accepted forms:
//! - integer milliseconds: `1500`
//! - a number with a unit (`ms`, `s`, `m`, `h`): `250ms`, `5s`, `2m`
//! - compound: `1m30s`, `1h 15m`

use std::time::Duration;

use serde::Deserialize;

/// Raw duration as written in the document.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    /// Bare integer, read as milliseconds.
    Millis(i64),
    /// Text with units.
    Text(String),
}

impl DurationValue {
    /// Converts to a [`Duration`]; the error is a human-readable reason.
    pub fn to_duration(&self) -> Result<Duration, String> {
        match self {
            DurationValue::Millis(ms) if *ms < 0 => Err(format!("negative duration: {ms}")),
            DurationValue::Millis(ms) => Ok(Duration::from_millis(ms.unsigned_abs())),
            DurationValue::Text(text) => parse_duration(text),
        }
    }
}

/// Parses `text` such as `"5s"`, `"250ms"` or `"1m30s"`.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let s = text.trim().to_lowercase();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s.starts_with('-') {
        return Err(format!("negative duration: {text:?}"));
    }
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }

    let invalid = || format!("invalid duration {text:?} (expected e.g. 500ms, 5s, 1m30s)");
    let mut total = Duration::ZERO;
    let mut rest = s.as_str();
    while !rest.is_empty() {
        rest = rest.trim_start();
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = rest[digits..].trim_start();

        let unit_len = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()).len();
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            _ => return Err(invalid()),
        };
        total = total.saturating_add(part);
        rest = &rest[unit_len..];
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units_and_compounds() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration(" 2M "), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("1h 15m"), Ok(Duration::from_secs(4500)));
        assert_eq!(parse_duration("1500"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("0s"), Ok(Duration::ZERO));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "s", "5 days", "1.5s", "-1s", "5sms", "ms5"] {
            assert!(parse_duration(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn integer_values_are_milliseconds() {
        assert_eq!(
            DurationValue::Millis(750).to_duration(),
            Ok(Duration::from_millis(750))
        );
        assert!(DurationValue::Millis(-1).to_duration().is_err());
    }
}
