//! Tests for the resolver module.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use chrono_tz::Tz;

    use cmg_core::{ScheduleWindow, StatusSnapshot, Transition};

    use crate::clock::{ClockError, CronClock, CronCrateClock};
    use crate::resolver::IntervalResolver;

    fn window(expression: &str, minutes: u64, value: i64) -> ScheduleWindow {
        ScheduleWindow::new(expression, Duration::from_secs(minutes * 60), value)
    }

    fn instant(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn in_utc(t: DateTime<Utc>) -> DateTime<Tz> {
        t.with_timezone(&chrono_tz::UTC)
    }

    /// `(now, current, last, last value, next, next value)`, all on 2022-01-05
    /// unless a full timestamp is given.
    type Row = (&'static str, i64, &'static str, i64, &'static str, i64);

    fn day(s: &str) -> DateTime<Utc> {
        if s.contains('T') {
            instant(s)
        } else {
            instant(&format!("2022-01-05T{s}:00Z"))
        }
    }

    fn check_rows(windows: &[ScheduleWindow], rows: &[Row]) {
        let resolver = IntervalResolver::default();
        for &(now, current, last, last_value, next, next_value) in rows {
            let got = resolver.resolve(windows, &in_utc(day(now)));
            let want = StatusSnapshot {
                current_value: current,
                last: Transition::new(day(last), last_value),
                next: Transition::new(day(next), next_value),
            };
            assert_eq!(got, want, "at {now}");
        }
    }

    // ── Single window ──────────────────────────────────────────────

    #[test]
    fn single_window() {
        let windows = [window("0 12 * * *", 60, 10)];
        check_rows(
            &windows,
            &[
                ("11:30", 0, "2022-01-04T13:00:00Z", 0, "12:00", 10),
                ("12:00", 10, "12:00", 10, "13:00", 0),
                ("12:30", 10, "12:00", 10, "13:00", 0),
                ("13:00", 0, "13:00", 0, "2022-01-06T12:00:00Z", 10),
                ("13:30", 0, "13:00", 0, "2022-01-06T12:00:00Z", 10),
            ],
        );
    }

    // ── Two windows, no overlap ────────────────────────────────────

    #[test]
    fn two_disjoint_windows() {
        let windows = [window("0 12 * * *", 40, 10), window("10 13 * * *", 20, 5)];
        check_rows(
            &windows,
            &[
                ("11:00", 0, "2022-01-04T13:30:00Z", 0, "12:00", 10),
                ("12:30", 10, "12:00", 10, "12:40", 0),
                ("12:50", 0, "12:40", 0, "13:10", 5),
                ("13:20", 5, "13:10", 5, "13:30", 0),
                ("14:00", 0, "13:30", 0, "2022-01-06T12:00:00Z", 10),
            ],
        );
    }

    // ── Overlapping windows ────────────────────────────────────────

    #[test]
    fn later_start_takes_over_and_outlasts() {
        let windows = [window("0 12 * * *", 120, 10), window("10 13 * * *", 120, 5)];
        check_rows(
            &windows,
            &[
                ("11:00", 0, "2022-01-04T15:10:00Z", 0, "12:00", 10),
                ("12:30", 10, "12:00", 10, "13:10", 5),
                ("14:30", 5, "13:10", 5, "15:10", 0),
                ("15:30", 0, "15:10", 0, "2022-01-06T12:00:00Z", 10),
            ],
        );
    }

    #[test]
    fn later_start_nested_inside_earlier_window() {
        let windows = [window("0 12 * * *", 120, 10), window("10 13 * * *", 30, 5)];
        check_rows(
            &windows,
            &[
                ("11:00", 0, "2022-01-04T14:00:00Z", 0, "12:00", 10),
                ("12:00", 10, "12:00", 10, "13:10", 5),
                ("13:00", 10, "12:00", 10, "13:10", 5),
                ("13:10", 5, "13:10", 5, "13:40", 10),
                ("13:30", 5, "13:10", 5, "13:40", 10),
                ("13:40", 10, "13:40", 10, "14:00", 0),
                ("13:50", 10, "13:40", 10, "14:00", 0),
                ("14:00", 0, "14:00", 0, "2022-01-06T12:00:00Z", 10),
                ("15:00", 0, "14:00", 0, "2022-01-06T12:00:00Z", 10),
            ],
        );
    }

    #[test]
    fn three_overlapping_windows() {
        let windows = [
            window("0 12 * * *", 120, 10),
            window("20 13 * * *", 120, 5),
            window("40 13 * * *", 60, 20),
        ];
        check_rows(
            &windows,
            &[
                ("11:00", 0, "2022-01-04T15:20:00Z", 0, "12:00", 10),
                ("13:00", 10, "12:00", 10, "13:20", 5),
                ("13:30", 5, "13:20", 5, "13:40", 20),
                ("13:50", 20, "13:40", 20, "14:40", 5),
                ("14:10", 20, "13:40", 20, "14:40", 5),
                ("14:50", 5, "14:40", 5, "15:20", 0),
                ("15:30", 0, "15:20", 0, "2022-01-06T12:00:00Z", 10),
            ],
        );
    }

    // ── Edge cases ─────────────────────────────────────────────────

    #[test]
    fn tie_on_start_keeps_first_window() {
        let windows = [window("0 12 * * *", 60, 1), window("0 12 * * *", 120, 2)];
        check_rows(&windows, &[("12:30", 1, "12:00", 1, "13:00", 2)]);
    }

    #[test]
    fn zero_duration_window_is_never_active() {
        let windows = [window("0 12 * * *", 0, 10)];
        check_rows(
            &windows,
            &[("12:00", 0, "12:00", 0, "2022-01-06T12:00:00Z", 0)],
        );
    }

    #[test]
    fn no_windows_resolves_to_empty_snapshot() {
        let got = IntervalResolver::default().resolve(&[], &in_utc(day("12:00")));
        assert_eq!(got, StatusSnapshot::default());
    }

    #[test]
    fn resolves_in_the_reference_timezone() {
        // 09:00 Tokyo is 00:00 UTC.
        let windows = [window("0 9 * * *", 60, 3)];
        let at = instant("2022-01-05T00:30:00Z").with_timezone(&chrono_tz::Asia::Tokyo);
        let got = IntervalResolver::default().resolve(&windows, &at);
        assert_eq!(got.current_value, 3);
        assert_eq!(got.last, Transition::new(instant("2022-01-05T00:00:00Z"), 3));
        assert_eq!(got.next, Transition::new(instant("2022-01-05T01:00:00Z"), 0));
    }

    #[test]
    fn subsecond_reference_instant() {
        let windows = [window("0 12 * * *", 60, 10)];
        let at = in_utc(day("12:00") + TimeDelta::milliseconds(250));
        let got = IntervalResolver::default().resolve(&windows, &at);
        assert_eq!(got.current_value, 10);
        assert_eq!(got.last.at, Some(day("12:00")));
    }

    // ── Invalid windows ────────────────────────────────────────────

    #[test]
    fn invalid_expression_is_skipped() {
        let resolver = IntervalResolver::default();
        let valid = window("0 12 * * *", 60, 10);
        let mixed = [window("not a cron", 600, 99), valid.clone()];
        let at = in_utc(day("12:30"));
        assert_eq!(resolver.resolve(&mixed, &at), resolver.resolve(&[valid], &at));
    }

    #[test]
    fn validate_reports_first_invalid_window() {
        let resolver = IntervalResolver::default();
        let windows = [window("0 12 * * *", 60, 10), window("99 * * * *", 1, 1)];
        let err = resolver.validate(&windows).unwrap_err();
        assert!(matches!(err, ClockError::InvalidExpression { expression, .. } if expression == "99 * * * *"));
        assert!(resolver.validate(&windows[..1]).is_ok());
    }

    /// Rejects one expression, delegates the rest.
    struct RejectingClock {
        rejected: &'static str,
        inner: CronCrateClock,
    }

    impl RejectingClock {
        fn check(&self, expression: &str) -> Result<(), ClockError> {
            if expression == self.rejected {
                return Err(ClockError::InvalidExpression {
                    expression: expression.to_string(),
                    reason: "rejected by test clock".to_string(),
                });
            }
            Ok(())
        }
    }

    impl CronClock for RejectingClock {
        fn validate(&self, expression: &str) -> Result<(), ClockError> {
            self.check(expression)?;
            self.inner.validate(expression)
        }

        fn previous(&self, expression: &str, at: &DateTime<Tz>) -> Result<Option<DateTime<Tz>>, ClockError> {
            self.check(expression)?;
            self.inner.previous(expression, at)
        }

        fn next(&self, expression: &str, at: &DateTime<Tz>) -> Result<Option<DateTime<Tz>>, ClockError> {
            self.check(expression)?;
            self.inner.next(expression, at)
        }
    }

    #[test]
    fn injected_clock_controls_validity() {
        let resolver = IntervalResolver::new(Arc::new(RejectingClock {
            rejected: "10 13 * * *",
            inner: CronCrateClock::new(),
        }));
        let windows = [window("0 12 * * *", 120, 10), window("10 13 * * *", 30, 5)];
        let got = resolver.resolve(&windows, &in_utc(day("13:20")));
        assert_eq!(got.current_value, 10);
        assert_eq!(got.last, Transition::new(day("12:00"), 10));
        assert_eq!(got.next, Transition::new(day("14:00"), 0));
        assert!(resolver.validate(&windows).is_err());
    }

    /// A clock whose expressions never fire.
    struct SilentClock;

    impl CronClock for SilentClock {
        fn validate(&self, _: &str) -> Result<(), ClockError> {
            Ok(())
        }

        fn previous(&self, _: &str, _: &DateTime<Tz>) -> Result<Option<DateTime<Tz>>, ClockError> {
            Ok(None)
        }

        fn next(&self, _: &str, _: &DateTime<Tz>) -> Result<Option<DateTime<Tz>>, ClockError> {
            Ok(None)
        }
    }

    #[test]
    fn never_firing_windows_have_no_transitions() {
        let resolver = IntervalResolver::new(Arc::new(SilentClock));
        let got = resolver.resolve(&[window("anything", 60, 7)], &in_utc(day("12:00")));
        assert_eq!(got, StatusSnapshot::default());
    }

    // ── Properties over a day of reference instants ────────────────

    fn window_sets() -> Vec<Vec<ScheduleWindow>> {
        vec![
            vec![window("0 12 * * *", 60, 10)],
            vec![window("0 12 * * *", 40, 10), window("10 13 * * *", 20, 5)],
            vec![window("0 12 * * *", 120, 10), window("10 13 * * *", 120, 5)],
            vec![window("0 12 * * *", 120, 10), window("10 13 * * *", 30, 5)],
            vec![
                window("0 12 * * *", 120, 10),
                window("20 13 * * *", 120, 5),
                window("40 13 * * *", 60, 20),
            ],
            vec![window("*/15 * * * *", 10, 1), window("5 */2 * * *", 45, 2)],
        ]
    }

    fn sweep() -> impl Iterator<Item = DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2022, 1, 5, 0, 0, 0).unwrap();
        (0..(24 * 12)).map(move |i| start + TimeDelta::minutes(5 * i))
    }

    #[test]
    fn resolution_is_idempotent() {
        let resolver = IntervalResolver::default();
        for windows in window_sets() {
            for t in sweep() {
                let at = in_utc(t);
                assert_eq!(resolver.resolve(&windows, &at), resolver.resolve(&windows, &at));
            }
        }
    }

    #[test]
    fn reference_instant_lies_between_transitions() {
        let resolver = IntervalResolver::default();
        for windows in window_sets() {
            for t in sweep() {
                let got = resolver.resolve(&windows, &in_utc(t));
                let last = got.last.at.expect("last transition");
                let next = got.next.at.expect("next transition");
                assert!(last <= t, "last {last} after {t}");
                assert!(t < next, "next {next} not after {t}");
            }
        }
    }

    #[test]
    fn value_is_stable_between_transitions() {
        let resolver = IntervalResolver::default();
        for windows in window_sets() {
            for t in sweep() {
                let got = resolver.resolve(&windows, &in_utc(t));
                let last = got.last.at.unwrap();
                let next = got.next.at.unwrap();

                let at_last = resolver.resolve(&windows, &in_utc(last));
                assert_eq!(at_last.current_value, got.current_value, "at last {last} for {t}");
                assert_eq!(got.last.value, got.current_value);

                let before_next = resolver.resolve(&windows, &in_utc(next - TimeDelta::seconds(1)));
                assert_eq!(before_next.current_value, got.current_value, "before next {next} for {t}");

                let at_next = resolver.resolve(&windows, &in_utc(next));
                assert_eq!(at_next.current_value, got.next.value, "at next {next} for {t}");
            }
        }
    }

    #[test]
    fn nothing_active_means_zero() {
        let resolver = IntervalResolver::default();
        // Every window value is non-zero, so zero can only come from "none active".
        let windows = [window("0 12 * * *", 120, 10), window("10 13 * * *", 30, 5)];
        for t in sweep() {
            let got = resolver.resolve(&windows, &in_utc(t));
            let in_a = t >= day("12:00") && t < day("14:00");
            assert_eq!(got.current_value == 0, !in_a, "at {t}");
        }
    }
}
