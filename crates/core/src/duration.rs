//! Window duration parsing and formatting.
//!
//! Durations are written the way operators write them in source files:
//! `90s`, `45m`, `1h30m`, `1d12h`, `250ms`. A bare number is seconds.

use std::time::Duration;

use crate::error::{GeneratorError, Result};

/// Parse a human-readable duration string into a [`Duration`].
///
/// Supports components `Xd`, `Xh`, `Xm`, `Xs` and `Xms`, combinable in any
/// order ("2h30m", "1d12h", "1m30s500ms"). A string of digits alone is read
/// as seconds. Signs, fractions and unknown units are rejected.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(GeneratorError::InvalidDuration(s.to_string()));
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        let secs: u64 = trimmed
            .parse()
            .map_err(|_| GeneratorError::InvalidDuration(s.to_string()))?;
        return Ok(Duration::from_secs(secs));
    }

    let invalid = || GeneratorError::InvalidDuration(s.to_string());
    let mut total = Duration::ZERO;
    let mut chars = trimmed.chars().peekable();

    while chars.peek().is_some() {
        let mut digits = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(c);
            chars.next();
        }
        let n: u64 = digits.parse().map_err(|_| invalid())?;

        let component = match chars.next() {
            Some('d') => Duration::from_secs(n.checked_mul(86_400).ok_or_else(invalid)?),
            Some('h') => Duration::from_secs(n.checked_mul(3_600).ok_or_else(invalid)?),
            Some('m') if chars.peek() == Some(&'s') => {
                chars.next();
                Duration::from_millis(n)
            }
            Some('m') => Duration::from_secs(n.checked_mul(60).ok_or_else(invalid)?),
            Some('s') => Duration::from_secs(n),
            _ => return Err(invalid()),
        };
        total = total.checked_add(component).ok_or_else(invalid)?;
    }

    Ok(total)
}

/// Format a [`Duration`] in the component form accepted by [`parse_duration`].
///
/// Zero formats as `0s`.
pub fn format_duration(d: Duration) -> String {
    let mut secs = d.as_secs();
    let millis = d.subsec_millis();
    if secs == 0 && millis == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        if secs >= size {
            out.push_str(&format!("{}{}", secs / size, unit));
            secs %= size;
        }
    }
    if millis > 0 {
        out.push_str(&format!("{}ms", millis));
    }
    out
}

/// Serde adapter for `Duration` fields written as duration strings.
pub mod serde_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Seconds(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => super::parse_duration(&s).map_err(serde::de::Error::custom),
            Raw::Seconds(n) => Ok(Duration::from_secs(n)),
        }
    }
}
