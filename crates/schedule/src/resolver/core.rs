//! [`IntervalResolver`]: turns windows plus a reference instant into a [`StatusSnapshot`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use tracing::warn;

use cmg_core::{ScheduleWindow, StatusSnapshot, Transition};

use crate::clock::{ClockError, CronClock, CronCrateClock};

/// A window that survived validation, with its duration in calendar terms.
struct Usable<'a> {
    window: &'a ScheduleWindow,
    duration: TimeDelta,
}

/// The window in force at some instant.
#[derive(Clone, Copy)]
struct Active {
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    value: i64,
}

/// Resolves recurring windows against a reference instant.
///
/// Cheap to clone; clones share the clock.
#[derive(Clone)]
pub struct IntervalResolver {
    clock: Arc<dyn CronClock>,
}

impl fmt::Debug for IntervalResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalResolver").finish_non_exhaustive()
    }
}

impl Default for IntervalResolver {
    fn default() -> Self {
        Self::new(Arc::new(CronCrateClock::new()))
    }
}

impl IntervalResolver {
    pub fn new(clock: Arc<dyn CronClock>) -> Self {
        Self { clock }
    }

    /// Fail on the first window whose expression the clock rejects.
    pub fn validate(&self, windows: &[ScheduleWindow]) -> Result<(), ClockError> {
        windows
            .iter()
            .try_for_each(|w| self.clock.validate(&w.expression))
    }

    /// Resolve `windows` at `at`.
    ///
    /// Windows with an invalid expression or an unrepresentable duration are
    /// logged and left out; the remaining windows still resolve. The result
    /// is a pure function of the inputs.
    pub fn resolve(&self, windows: &[ScheduleWindow], at: &DateTime<Tz>) -> StatusSnapshot {
        let usable = self.usable(windows);
        let previous = self.previous_starts(&usable, at);

        let active = select_active(&usable, &previous, at);
        let base_start = active.map(|a| a.start);
        let base_end = active.map(|a| a.end);
        let current_value = active.map_or(0, |a| a.value);

        // Last transition: the latest end of any occurrence that began after
        // the active one, else the active start itself.
        let mut last = base_start;
        for (u, prev) in usable.iter().zip(&previous) {
            let Some(prev) = prev else { continue };
            if base_start.is_some_and(|base| *prev <= base) {
                continue;
            }
            if let Some(end) = prev.checked_add_signed(u.duration) {
                if last.map_or(true, |l| end > l) {
                    last = Some(end);
                }
            }
        }

        // Next transition: the earliest upcoming start within the active
        // window's horizon, else the active end.
        let mut next: Option<DateTime<Tz>> = None;
        for u in &usable {
            let candidate = match self.clock.next(&u.window.expression, at) {
                Ok(Some(c)) => c,
                Ok(None) => continue,
                Err(e) => {
                    warn!(expression = %u.window.expression, error = %e, "next occurrence lookup failed");
                    continue;
                }
            };
            if base_end.is_some_and(|end| candidate > end) {
                continue;
            }
            if next.map_or(true, |n| candidate < n) {
                next = Some(candidate);
            }
        }
        let next = next.or(base_end);

        let next_value = match next {
            Some(n) => self.value_just_after(&usable, &n),
            None => 0,
        };

        StatusSnapshot {
            current_value,
            last: Transition {
                at: last.map(|t| t.with_timezone(&Utc)),
                value: current_value,
            },
            next: Transition {
                at: next.map(|t| t.with_timezone(&Utc)),
                value: next_value,
            },
        }
    }

    /// The value in force one nanosecond after `instant`.
    fn value_just_after(&self, usable: &[Usable<'_>], instant: &DateTime<Tz>) -> i64 {
        let Some(probe) = instant.checked_add_signed(TimeDelta::nanoseconds(1)) else {
            return 0;
        };
        let previous = self.previous_starts(usable, &probe);
        select_active(usable, &previous, &probe).map_or(0, |a| a.value)
    }

    fn usable<'a>(&self, windows: &'a [ScheduleWindow]) -> Vec<Usable<'a>> {
        windows
            .iter()
            .filter_map(|window| {
                if let Err(e) = self.clock.validate(&window.expression) {
                    warn!(expression = %window.expression, error = %e, "skipping window with invalid cron expression");
                    return None;
                }
                match TimeDelta::from_std(window.duration) {
                    Ok(duration) => Some(Usable { window, duration }),
                    Err(_) => {
                        warn!(expression = %window.expression, "skipping window with out-of-range duration");
                        None
                    }
                }
            })
            .collect()
    }

    fn previous_starts(&self, usable: &[Usable<'_>], at: &DateTime<Tz>) -> Vec<Option<DateTime<Tz>>> {
        usable
            .iter()
            .map(|u| match self.clock.previous(&u.window.expression, at) {
                Ok(prev) => prev,
                Err(e) => {
                    warn!(expression = %u.window.expression, error = %e, "previous occurrence lookup failed");
                    None
                }
            })
            .collect()
    }
}

/// Most recently started window still running at `at`. Ties keep the
/// earlier window.
fn select_active(
    usable: &[Usable<'_>],
    previous: &[Option<DateTime<Tz>>],
    at: &DateTime<Tz>,
) -> Option<Active> {
    let mut active: Option<Active> = None;
    for (u, prev) in usable.iter().zip(previous) {
        let Some(start) = *prev else { continue };
        let Some(end) = start.checked_add_signed(u.duration) else {
            continue;
        };
        if end <= *at {
            continue;
        }
        if active.map_or(true, |a| start > a.start) {
            active = Some(Active {
                start,
                end,
                value: u.window.value,
            });
        }
    }
    active
}
