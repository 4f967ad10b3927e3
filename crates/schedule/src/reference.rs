//! Reference-instant computation for a source.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use tracing::warn;

use cmg_core::config::parse_timezone;
use cmg_core::Result;

/// Pick the timezone a source is evaluated in.
///
/// An absent or blank name falls back to `default`; an unknown name is an
/// [`InvalidTimezone`](cmg_core::GeneratorError::InvalidTimezone) error.
pub fn resolve_timezone(name: Option<&str>, default: Tz) -> Result<Tz> {
    match name.map(str::trim) {
        None | Some("") => Ok(default),
        Some(name) => parse_timezone(name),
    }
}

/// `now` viewed in `tz`, shifted by `offset_seconds` (may be negative).
///
/// An offset that would overflow the calendar is ignored.
pub fn reference_instant(now: DateTime<Utc>, tz: Tz, offset_seconds: i64) -> DateTime<Tz> {
    let local = now.with_timezone(&tz);
    match TimeDelta::try_seconds(offset_seconds).and_then(|d| local.checked_add_signed(d)) {
        Some(shifted) => shifted,
        None => {
            warn!(offset_seconds, "reference offset out of range, ignoring");
            local
        }
    }
}
