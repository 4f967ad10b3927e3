//! The cron evaluation capability consumed by the resolver.
//!
//! The resolver only needs two questions answered about an expression:
//! "when did it last fire at or before this instant" and "when does it next
//! fire after this instant". [`CronClock`] is that seam; [`CronCrateClock`]
//! answers it with the `cron` crate, tests answer it with stubs.

use std::str::FromStr;

use chrono::{DateTime, SubsecRound};
use chrono_tz::Tz;
use cron::Schedule;
use thiserror::Error;

use cmg_core::GeneratorError;

use crate::cron::normalize_cron;

/// Errors produced while evaluating a cron expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("invalid cron expression `{expression}`: {reason}")]
    InvalidExpression { expression: String, reason: String },
}

impl From<ClockError> for GeneratorError {
    fn from(e: ClockError) -> Self {
        match e {
            ClockError::InvalidExpression { expression, reason } => {
                GeneratorError::InvalidExpression { expression, reason }
            }
        }
    }
}

/// Previous/next occurrence lookup for cron expressions.
///
/// Instants carry their timezone; expressions are evaluated in it.
/// `Ok(None)` means the expression is valid but has no occurrence in that
/// direction (for example a date that never exists).
pub trait CronClock: Send + Sync {
    /// Check that an expression parses.
    fn validate(&self, expression: &str) -> Result<(), ClockError>;

    /// Latest occurrence at or before `at`.
    fn previous(
        &self,
        expression: &str,
        at: &DateTime<Tz>,
    ) -> Result<Option<DateTime<Tz>>, ClockError>;

    /// Earliest occurrence strictly after `at`.
    fn next(&self, expression: &str, at: &DateTime<Tz>)
        -> Result<Option<DateTime<Tz>>, ClockError>;
}

/// [`CronClock`] backed by the `cron` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct CronCrateClock;

impl CronCrateClock {
    pub fn new() -> Self {
        Self
    }

    fn parse(&self, expression: &str) -> Result<Schedule, ClockError> {
        Schedule::from_str(&normalize_cron(expression)).map_err(|e| {
            ClockError::InvalidExpression {
                expression: expression.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

impl CronClock for CronCrateClock {
    fn validate(&self, expression: &str) -> Result<(), ClockError> {
        self.parse(expression).map(|_| ())
    }

    fn previous(
        &self,
        expression: &str,
        at: &DateTime<Tz>,
    ) -> Result<Option<DateTime<Tz>>, ClockError> {
        let schedule = self.parse(expression)?;

        // Occurrences fall on whole seconds, so an occurrence inside
        // `[floor, at]` can only be `floor` itself.
        let floor = at.trunc_subsecs(0);
        let probe = floor.clone() - chrono::Duration::seconds(1);
        if let Some(hit) = schedule.after(&probe).next() {
            if hit <= *at {
                return Ok(Some(hit));
            }
        }

        Ok(schedule.after(&floor).next_back())
    }

    fn next(
        &self,
        expression: &str,
        at: &DateTime<Tz>,
    ) -> Result<Option<DateTime<Tz>>, ClockError> {
        let schedule = self.parse(expression)?;
        Ok(schedule.after(at).next())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        chrono_tz::UTC.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn previous_includes_exact_occurrence() {
        let clock = CronCrateClock::new();
        let at = utc(2022, 1, 5, 12, 0);
        assert_eq!(clock.previous("0 12 * * *", &at).unwrap(), Some(at));
    }

    #[test]
    fn previous_before_todays_occurrence_is_yesterday() {
        let clock = CronCrateClock::new();
        let prev = clock.previous("0 12 * * *", &utc(2022, 1, 5, 11, 30)).unwrap();
        assert_eq!(prev, Some(utc(2022, 1, 4, 12, 0)));
    }

    #[test]
    fn previous_with_subsecond_instant() {
        let clock = CronCrateClock::new();
        let at = utc(2022, 1, 5, 12, 0) + chrono::Duration::nanoseconds(1);
        assert_eq!(
            clock.previous("0 12 * * *", &at).unwrap(),
            Some(utc(2022, 1, 5, 12, 0))
        );
    }

    #[test]
    fn next_is_strictly_after() {
        let clock = CronCrateClock::new();
        let at = utc(2022, 1, 5, 12, 0);
        assert_eq!(
            clock.next("0 12 * * *", &at).unwrap(),
            Some(utc(2022, 1, 6, 12, 0))
        );
        assert_eq!(
            clock.next("0 12 * * *", &utc(2022, 1, 5, 11, 59)).unwrap(),
            Some(at)
        );
    }

    #[test]
    fn weekday_follows_standard_numbering() {
        // 2022-01-05 is a Wednesday; the previous Monday noon is 2022-01-03.
        let clock = CronCrateClock::new();
        let prev = clock.previous("0 12 * * 1", &utc(2022, 1, 5, 12, 0)).unwrap();
        assert_eq!(prev, Some(utc(2022, 1, 3, 12, 0)));
    }

    #[test]
    fn evaluates_in_the_instant_timezone() {
        let clock = CronCrateClock::new();
        // 10:00 in Tokyo; 09:00 Tokyo is 00:00 UTC.
        let at = Utc
            .with_ymd_and_hms(2022, 1, 5, 1, 0, 0)
            .unwrap()
            .with_timezone(&chrono_tz::Asia::Tokyo);
        let prev = clock.previous("0 9 * * *", &at).unwrap().unwrap();
        assert_eq!(
            prev.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2022, 1, 5, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn descriptor_expression() {
        let clock = CronCrateClock::new();
        let prev = clock.previous("@daily", &utc(2022, 1, 5, 11, 30)).unwrap();
        assert_eq!(prev, Some(utc(2022, 1, 5, 0, 0)));
    }

    #[test]
    fn invalid_expression_is_reported() {
        let clock = CronCrateClock::new();
        let err = clock.validate("not a cron").unwrap_err();
        let ClockError::InvalidExpression { expression, .. } = err;
        assert_eq!(expression, "not a cron");
        assert!(clock.previous("61 * * * *", &utc(2022, 1, 5, 0, 0)).is_err());
    }

    #[test]
    fn clock_error_converts_to_generator_error() {
        let err: GeneratorError = ClockError::InvalidExpression {
            expression: "x".into(),
            reason: "bad".into(),
        }
        .into();
        assert!(matches!(err, GeneratorError::InvalidExpression { .. }));
    }
}
