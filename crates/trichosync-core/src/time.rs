//! Schedule time normalization.
//!
//! Visit records store their scheduled instant as free-form text: either a
//! bare date (`2025-03-10`) or a date with a time (`2025-03-10 14:30:00`).
//! This module resolves that ambiguity exactly once, at the boundary, into
//! [`ScheduleInput`], and turns it into a [`NormalizedSchedule`] with an
//! explicit start and end. Everything downstream works with local wall-clock
//! [`NaiveDateTime`] values in the fixed clinic timezone.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hour of day assigned to visits that carry no time component.
pub const DEFAULT_VISIT_HOUR: u32 = 10;

/// Duration assigned to visits with no explicit end.
pub fn default_visit_duration() -> Duration {
    Duration::hours(1)
}

/// A scheduled instant as parsed from the record store.
///
/// The variant is decided once here; callers never re-inspect the raw
/// string to guess whether a time component was present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleInput {
    /// A date with no time component.
    Dated(NaiveDate),
    /// A date with an explicit time.
    DatedAndTimed(NaiveDateTime),
}

impl ScheduleInput {
    /// Parses a raw schedule string from the record store.
    ///
    /// Accepted formats: `%Y-%m-%d`, `%Y-%m-%d %H:%M:%S`,
    /// `%Y-%m-%dT%H:%M:%S`, and `%Y-%m-%d %H:%M`.
    /// Returns `None` for anything else.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();

        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(Self::Dated(date));
        }

        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(Self::DatedAndTimed(dt));
            }
        }

        None
    }

    /// Returns the date portion of this input.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Dated(date) => *date,
            Self::DatedAndTimed(dt) => dt.date(),
        }
    }

    /// Returns `true` if the input carried an explicit time.
    pub fn has_time(&self) -> bool {
        matches!(self, Self::DatedAndTimed(_))
    }
}

/// A normalized schedule: explicit start and end instants.
///
/// Invariant: `end > start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSchedule {
    /// Start instant, local wall clock.
    pub start: NaiveDateTime,
    /// End instant, local wall clock.
    pub end: NaiveDateTime,
    /// Whether the input was malformed and the fallback was applied.
    pub fallback: bool,
}

impl NormalizedSchedule {
    /// Duration of the scheduled slot in minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Normalizes a raw schedule string with the default visit hour and duration.
///
/// - Date-only input starts at [`DEFAULT_VISIT_HOUR`] with a one-hour slot.
/// - Date-time input is taken exactly; the slot is still one hour.
/// - Malformed input never raises: it falls back to today (derived from
///   `now`) at the default hour, flagged with `fallback = true` and logged.
///   Callers needing strict validation must pre-validate with
///   [`ScheduleInput::parse`].
pub fn normalize_schedule(raw: &str, now: NaiveDateTime) -> NormalizedSchedule {
    normalize_schedule_with(raw, now, DEFAULT_VISIT_HOUR, default_visit_duration())
}

/// Normalizes a raw schedule string with explicit defaults.
pub fn normalize_schedule_with(
    raw: &str,
    now: NaiveDateTime,
    default_hour: u32,
    duration: Duration,
) -> NormalizedSchedule {
    match ScheduleInput::parse(raw) {
        Some(ScheduleInput::Dated(date)) => {
            let start = date
                .and_hms_opt(default_hour, 0, 0)
                .unwrap_or_else(|| date.and_hms_opt(0, 0, 0).expect("midnight is valid"));
            NormalizedSchedule {
                start,
                end: start + duration,
                fallback: false,
            }
        }
        Some(ScheduleInput::DatedAndTimed(start)) => NormalizedSchedule {
            start,
            end: start + duration,
            fallback: false,
        },
        None => {
            warn!(raw = %raw, "unparseable schedule, falling back to default slot today");
            let start = now
                .date()
                .and_hms_opt(default_hour, 0, 0)
                .expect("default visit hour is valid");
            NormalizedSchedule {
                start,
                end: start + duration,
                fallback: true,
            }
        }
    }
}

/// A query window over local wall-clock instants.
///
/// Both ends are inclusive: an event belongs to the window when its start
/// instant satisfies `start <= instant <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitWindow {
    /// Start of the window (inclusive).
    pub start: NaiveDateTime,
    /// End of the window (inclusive).
    pub end: NaiveDateTime,
}

impl VisitWindow {
    /// Creates a new window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        assert!(start <= end, "VisitWindow start must be <= end");
        Self { start, end }
    }

    /// Creates a window spanning whole days, midnight to end of the last day.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(
            start.and_hms_opt(0, 0, 0).expect("midnight is valid"),
            end.and_hms_opt(23, 59, 59).expect("end of day is valid"),
        )
    }

    /// Creates a window from `now` extending the given number of days.
    pub fn days_ahead(now: NaiveDateTime, days: i64) -> Self {
        Self::new(now, now + Duration::days(days))
    }

    /// Checks whether an instant falls inside the window (inclusive).
    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Duration of the window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod schedule_input {
        use super::*;

        #[test]
        fn parses_bare_date() {
            let input = ScheduleInput::parse("2025-03-10").unwrap();
            assert_eq!(input, ScheduleInput::Dated(date(2025, 3, 10)));
            assert!(!input.has_time());
        }

        #[test]
        fn parses_datetime() {
            let input = ScheduleInput::parse("2025-03-10 14:30:00").unwrap();
            assert_eq!(
                input,
                ScheduleInput::DatedAndTimed(dt(2025, 3, 10, 14, 30, 0))
            );
            assert!(input.has_time());
        }

        #[test]
        fn parses_iso_t_separator() {
            let input = ScheduleInput::parse("2025-03-10T14:30:00").unwrap();
            assert_eq!(
                input,
                ScheduleInput::DatedAndTimed(dt(2025, 3, 10, 14, 30, 0))
            );
        }

        #[test]
        fn parses_datetime_without_seconds() {
            let input = ScheduleInput::parse("2025-03-10 14:30").unwrap();
            assert_eq!(
                input,
                ScheduleInput::DatedAndTimed(dt(2025, 3, 10, 14, 30, 0))
            );
        }

        #[test]
        fn trims_whitespace() {
            assert!(ScheduleInput::parse("  2025-03-10  ").is_some());
        }

        #[test]
        fn rejects_garbage() {
            assert!(ScheduleInput::parse("").is_none());
            assert!(ScheduleInput::parse("next tuesday").is_none());
            assert!(ScheduleInput::parse("2025-13-40").is_none());
            assert!(ScheduleInput::parse("10/03/2025").is_none());
        }
    }

    mod normalize {
        use super::*;

        #[test]
        fn date_only_gets_default_slot() {
            let now = dt(2025, 1, 1, 8, 0, 0);
            let norm = normalize_schedule("2025-03-10", now);
            assert_eq!(norm.start, dt(2025, 3, 10, 10, 0, 0));
            assert_eq!(norm.end, dt(2025, 3, 10, 11, 0, 0));
            assert!(!norm.fallback);
        }

        #[test]
        fn datetime_is_taken_exactly() {
            let now = dt(2025, 1, 1, 8, 0, 0);
            let norm = normalize_schedule("2025-03-10 14:30:00", now);
            assert_eq!(norm.start, dt(2025, 3, 10, 14, 30, 0));
            assert_eq!(norm.end, dt(2025, 3, 10, 15, 30, 0));
            assert!(!norm.fallback);
        }

        #[test]
        fn malformed_falls_back_to_today() {
            let now = dt(2025, 6, 15, 16, 45, 0);
            let norm = normalize_schedule("not a date", now);
            assert_eq!(norm.start, dt(2025, 6, 15, 10, 0, 0));
            assert_eq!(norm.end, dt(2025, 6, 15, 11, 0, 0));
            assert!(norm.fallback);
        }

        #[test]
        fn malformed_never_yields_inverted_slot() {
            let now = dt(2025, 6, 15, 16, 45, 0);
            for raw in ["", "???", "2025-99-99", "sometime soon"] {
                let norm = normalize_schedule(raw, now);
                assert!(norm.start < norm.end, "inverted slot for {raw:?}");
            }
        }

        #[test]
        fn custom_defaults() {
            let now = dt(2025, 1, 1, 8, 0, 0);
            let norm =
                normalize_schedule_with("2025-03-10", now, 9, Duration::minutes(45));
            assert_eq!(norm.start, dt(2025, 3, 10, 9, 0, 0));
            assert_eq!(norm.duration_minutes(), 45);
        }
    }

    mod visit_window {
        use super::*;

        #[test]
        fn contains_is_inclusive_on_both_ends() {
            let window = VisitWindow::new(dt(2025, 3, 1, 0, 0, 0), dt(2025, 3, 31, 23, 59, 59));
            assert!(window.contains(dt(2025, 3, 1, 0, 0, 0)));
            assert!(window.contains(dt(2025, 3, 31, 23, 59, 59)));
            assert!(window.contains(dt(2025, 3, 15, 12, 0, 0)));
            assert!(!window.contains(dt(2025, 2, 28, 23, 59, 59)));
            assert!(!window.contains(dt(2025, 4, 1, 0, 0, 0)));
        }

        #[test]
        fn from_dates_spans_whole_days() {
            let window = VisitWindow::from_dates(date(2025, 3, 1), date(2025, 3, 2));
            assert!(window.contains(dt(2025, 3, 1, 0, 0, 0)));
            assert!(window.contains(dt(2025, 3, 2, 23, 59, 59)));
        }

        #[test]
        #[should_panic(expected = "start must be <= end")]
        fn inverted_window_panics() {
            VisitWindow::new(dt(2025, 3, 2, 0, 0, 0), dt(2025, 3, 1, 0, 0, 0));
        }

        #[test]
        fn days_ahead() {
            let now = dt(2025, 3, 1, 12, 0, 0);
            let window = VisitWindow::days_ahead(now, 90);
            assert_eq!(window.start, now);
            assert_eq!(window.duration(), Duration::days(90));
        }

        #[test]
        fn serde_roundtrip() {
            let window = VisitWindow::from_dates(date(2025, 3, 1), date(2025, 3, 31));
            let json = serde_json::to_string(&window).unwrap();
            let parsed: VisitWindow = serde_json::from_str(&json).unwrap();
            assert_eq!(window, parsed);
        }
    }
}
