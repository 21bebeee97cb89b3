use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};

use super::field::{CronField, FieldMask};
use crate::error::CronError;

/// How many calendar years past the reference year are searched before a
/// schedule is declared unsatisfiable.
pub const DEFAULT_LOOKAHEAD_YEARS: i32 = 5;

/// A parsed cron expression.
///
/// Accepts `[second] minute hour day-of-month month [day-of-week]`:
/// - 4 fields: `minute hour day-of-month month`
/// - 5 fields: `minute hour day-of-month month day-of-week`
/// - 6 fields: `second minute hour day-of-month month day-of-week`
///
/// Without a seconds field, schedules fire at second 0. Month and weekday
/// names (`JAN`, `MON`) are accepted, as are the `@yearly`, `@annually`,
/// `@monthly`, `@weekly`, `@daily`, `@midnight` and `@hourly` macros.
///
/// When both day-of-month and day-of-week are restricted (not written with a
/// leading `*`), a day matches if either of them does. Otherwise both must
/// match.
///
/// All times are evaluated on the UTC calendar.
///
/// ```rust
/// use femto_frame::cron::CronEntry;
///
/// let entry = CronEntry::parse("0,20,40 * * * *").unwrap();
/// // 1970-01-01 00:05:00
/// assert_eq!(20 * 60_000, entry.next_running_time(5 * 60_000).unwrap());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CronEntry {
    expression: String,
    seconds: FieldMask,
    minutes: FieldMask,
    hours: FieldMask,
    days_of_month: FieldMask,
    months: FieldMask,
    days_of_week: FieldMask,
    lookahead_years: i32,
}

impl CronEntry {
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let expanded = expand_macro(expression.trim());
        let fields = expanded.split_whitespace().collect::<Vec<_>>();
        let (second, rest, day_of_week) = match fields.as_slice() {
            [m, h, dom, mon] => (None, [*m, *h, *dom, *mon], None),
            [m, h, dom, mon, dow] => (None, [*m, *h, *dom, *mon], Some(*dow)),
            [s, m, h, dom, mon, dow] => (Some(*s), [*m, *h, *dom, *mon], Some(*dow)),
            _ => {
                return Err(CronError::FieldCount {
                    found: fields.len(),
                    expression: expression.to_string(),
                })
            }
        };
        let [minute, hour, day_of_month, month] = rest;
        Ok(Self {
            expression: expression.to_string(),
            seconds: match second {
                Some(text) => FieldMask::parse(CronField::Second, text)?,
                None => FieldMask::single(CronField::Second, 0)?,
            },
            minutes: FieldMask::parse(CronField::Minute, minute)?,
            hours: FieldMask::parse(CronField::Hour, hour)?,
            days_of_month: FieldMask::parse(CronField::DayOfMonth, day_of_month)?,
            months: FieldMask::parse(CronField::Month, month)?,
            days_of_week: match day_of_week {
                Some(text) => FieldMask::parse(CronField::DayOfWeek, text)?,
                None => FieldMask::all(CronField::DayOfWeek),
            },
            lookahead_years: DEFAULT_LOOKAHEAD_YEARS,
        })
    }

    /// Changes how many years past the reference year are searched.
    pub fn with_lookahead_years(mut self, years: u16) -> Self {
        self.lookahead_years = i32::from(years);
        self
    }

    /// The text this entry was parsed from.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn field(&self, field: CronField) -> &FieldMask {
        match field {
            CronField::Second => &self.seconds,
            CronField::Minute => &self.minutes,
            CronField::Hour => &self.hours,
            CronField::DayOfMonth => &self.days_of_month,
            CronField::Month => &self.months,
            CronField::DayOfWeek => &self.days_of_week,
        }
    }

    /// The earliest whole second strictly after `reference` (epoch
    /// milliseconds) that satisfies every field, in epoch milliseconds.
    pub fn next_running_time(&self, reference: i64) -> Result<i64, CronError> {
        let start = DateTime::<Utc>::from_timestamp(reference.div_euclid(1000) + 1, 0)
            .ok_or(CronError::OutOfRange(reference))?
            .naive_utc();
        let limit_year = start.year().saturating_add(self.lookahead_years);
        self.roll_forward(start, limit_year)
            .map(|next| next.and_utc().timestamp_millis())
            .ok_or_else(|| CronError::ScheduleUnsatisfiable {
                expression: self.expression.clone(),
                reference,
                years: self.lookahead_years,
            })
    }

    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
        let next = self.next_running_time(after.timestamp_millis())?;
        DateTime::<Utc>::from_timestamp_millis(next).ok_or(CronError::OutOfRange(next))
    }

    /// Successive running times after `reference`. Ends early if the
    /// schedule runs out of satisfiable times.
    pub fn upcoming(&self, reference: i64) -> impl Iterator<Item = i64> + '_ {
        std::iter::successors(self.next_running_time(reference).ok(), move |&previous| {
            self.next_running_time(previous).ok()
        })
    }

    /// Whether the second containing `time` (epoch milliseconds) satisfies
    /// every field.
    pub fn matches(&self, time: i64) -> bool {
        match DateTime::<Utc>::from_timestamp_millis(time) {
            Some(t) => {
                let t = t.naive_utc();
                self.seconds.contains(t.second())
                    && self.minutes.contains(t.minute())
                    && self.hours.contains(t.hour())
                    && self.months.contains(t.month())
                    && self.day_matches(t.date())
            }
            None => false,
        }
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let by_month = self.days_of_month.contains(date.day());
        let weekday = date.weekday().num_days_from_sunday();
        let by_week = self.days_of_week.contains(weekday)
            || (weekday == 0 && self.days_of_week.contains(7));
        if self.days_of_month.is_restricted() && self.days_of_week.is_restricted() {
            by_month || by_week
        } else {
            by_month && by_week
        }
    }

    /// Moves `t` forward to the first instant satisfying every field,
    /// largest unit first. A unit with no allowed value at or above its
    /// current one resets the smaller units and carries into the next larger
    /// unit. Gives up once the year passes `limit_year`.
    fn roll_forward(&self, mut t: NaiveDateTime, limit_year: i32) -> Option<NaiveDateTime> {
        loop {
            if t.year() > limit_year {
                return None;
            }
            let date = t.date();

            match self.months.next_at_or_after(t.month()) {
                Some(month) if month == t.month() => {}
                Some(month) => {
                    t = midnight(NaiveDate::from_ymd_opt(t.year(), month, 1)?)?;
                    continue;
                }
                None => {
                    let first = self.months.first()?;
                    t = midnight(NaiveDate::from_ymd_opt(t.year() + 1, first, 1)?)?;
                    continue;
                }
            }

            if !self.day_matches(date) {
                t = midnight(date.succ_opt()?)?;
                continue;
            }

            match self.hours.next_at_or_after(t.hour()) {
                Some(hour) if hour == t.hour() => {}
                Some(hour) => {
                    t = date.and_hms_opt(hour, 0, 0)?;
                    continue;
                }
                None => {
                    t = midnight(date.succ_opt()?)?;
                    continue;
                }
            }

            match self.minutes.next_at_or_after(t.minute()) {
                Some(minute) if minute == t.minute() => {}
                Some(minute) => {
                    t = date.and_hms_opt(t.hour(), minute, 0)?;
                    continue;
                }
                None => {
                    t = date
                        .and_hms_opt(t.hour(), 0, 0)?
                        .checked_add_signed(TimeDelta::hours(1))?;
                    continue;
                }
            }

            match self.seconds.next_at_or_after(t.second()) {
                Some(second) => return date.and_hms_opt(t.hour(), t.minute(), second),
                None => {
                    t = date
                        .and_hms_opt(t.hour(), t.minute(), 0)?
                        .checked_add_signed(TimeDelta::minutes(1))?;
                }
            }
        }
    }
}

fn midnight(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
}

fn expand_macro(expression: &str) -> &str {
    match expression.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => "0 0 1 1 *",
        "@monthly" => "0 0 1 * *",
        "@weekly" => "0 0 * * 0",
        "@daily" | "@midnight" => "0 0 * * *",
        "@hourly" => "0 * * * *",
        _ => expression,
    }
}

impl FromStr for CronEntry {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CronEntry::parse(s)
    }
}

impl fmt::Display for CronEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    fn next(expression: &str, reference: i64) -> i64 {
        CronEntry::parse(expression)
            .unwrap()
            .next_running_time(reference)
            .unwrap()
    }

    #[test]
    fn lands_on_next_listed_minute() {
        let reference = at(2024, 3, 15, 10, 5, 30) + 250;
        assert_eq!(at(2024, 3, 15, 10, 20, 0), next("0,20,40 * * * *", reference));
    }

    #[test]
    fn day_31_in_december() {
        let entry = CronEntry::parse("0 0 31 * *").unwrap();
        let dec_31 = at(2025, 12, 31, 0, 0, 0);
        assert_eq!(dec_31, entry.next_running_time(at(2025, 12, 5, 8, 0, 0)).unwrap());
        assert_eq!(at(2026, 1, 31, 0, 0, 0), entry.next_running_time(dec_31).unwrap());
    }

    #[test]
    fn result_is_strictly_after_reference() {
        let on_the_minute = at(2024, 3, 15, 10, 5, 0);
        assert_eq!(at(2024, 3, 15, 10, 6, 0), next("* * * * *", on_the_minute));
        assert_eq!(on_the_minute, next("* * * * *", on_the_minute - 1));
        assert_eq!(at(2024, 3, 15, 10, 5, 1), next("* * * * * *", on_the_minute));
        assert_eq!(at(2024, 3, 15, 10, 5, 1), next("* * * * * *", on_the_minute + 500));

        for expression in ["* * * * * *", "*/7 * * * *", "0 0 1 1 *", "15 10 * * 1-5"] {
            let entry = CronEntry::parse(expression).unwrap();
            for offset in (0..200).map(|i| i * 3_600_013) {
                let reference = on_the_minute + offset;
                let found = entry.next_running_time(reference).unwrap();
                assert!(found > reference, "{expression} at {reference}");
                assert!(entry.matches(found), "{expression} at {found}");
            }
        }
    }

    #[test]
    fn repeated_calls_agree() {
        let entry = CronEntry::parse("*/13 3-9 * * mon").unwrap();
        let reference = at(2024, 7, 4, 12, 0, 0);
        assert_eq!(
            entry.next_running_time(reference).unwrap(),
            entry.next_running_time(reference).unwrap()
        );
    }

    #[test]
    fn carries_across_day_and_year() {
        assert_eq!(
            at(2024, 3, 16, 23, 30, 0),
            next("30 23 * * *", at(2024, 3, 15, 23, 45, 0))
        );
        assert_eq!(
            at(2025, 1, 1, 23, 30, 0),
            next("30 23 * * *", at(2024, 12, 31, 23, 45, 0))
        );
        assert_eq!(at(2025, 1, 1, 0, 0, 0), next("0 0 1 1 *", at(2024, 6, 1, 0, 0, 0)));
    }

    #[test]
    fn both_day_fields_restricted_means_either() {
        // 2024-01-01 is a Monday, the first Friday is the 5th
        assert_eq!(
            at(2024, 1, 5, 0, 0, 0),
            next("0 0 13 * 5", at(2024, 1, 1, 0, 0, 0))
        );
        assert_eq!(
            at(2024, 1, 13, 0, 0, 0),
            next("0 0 13 * 5", at(2024, 1, 12, 0, 0, 0))
        );
    }

    #[test]
    fn starred_day_field_means_both() {
        assert_eq!(at(2024, 1, 13, 0, 0, 0), next("0 0 13 * *", at(2024, 1, 1, 0, 0, 0)));
        assert_eq!(at(2024, 1, 5, 0, 0, 0), next("0 0 * * 5", at(2024, 1, 1, 0, 0, 0)));
        // days 1, 11, 21, 31 that are also Fridays: the first is 2024-03-01
        assert_eq!(
            at(2024, 3, 1, 0, 0, 0),
            next("0 0 */10 * 5", at(2024, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn seven_is_sunday() {
        assert_eq!(at(2024, 1, 7, 12, 0, 0), next("0 12 * * 7", at(2024, 1, 1, 0, 0, 0)));
        assert_eq!(at(2024, 1, 7, 12, 0, 0), next("0 12 * * SUN", at(2024, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn wraparound_weekdays() {
        // Saturday through Monday, from Tuesday 2024-01-02
        let entry = CronEntry::parse("0 0 * * 6-1").unwrap();
        let found = entry.upcoming(at(2024, 1, 2, 0, 0, 0)).take(3).collect::<Vec<_>>();
        assert_eq!(
            vec![
                at(2024, 1, 6, 0, 0, 0),
                at(2024, 1, 7, 0, 0, 0),
                at(2024, 1, 8, 0, 0, 0)
            ],
            found
        );
    }

    #[test]
    fn field_count_forms() {
        assert_eq!(at(2024, 2, 1, 9, 30, 0), next("30 9 1 *", at(2024, 1, 1, 10, 0, 0)));
        assert_eq!(at(2024, 1, 1, 10, 0, 15), next("*/15 * * * * *", at(2024, 1, 1, 10, 0, 7)));

        let entry = CronEntry::parse("30 9 1 *").unwrap();
        assert_eq!(&FieldMask::all(CronField::DayOfWeek), entry.field(CronField::DayOfWeek));
        assert_eq!(vec![0], entry.field(CronField::Second).values().collect::<Vec<_>>());
    }

    #[test]
    fn macros_expand() {
        let reference = at(2024, 1, 1, 10, 5, 0);
        assert_eq!(at(2024, 1, 1, 11, 0, 0), next("@hourly", reference));
        assert_eq!(at(2024, 1, 2, 0, 0, 0), next("@daily", reference));
        assert_eq!(at(2024, 1, 2, 0, 0, 0), next("@midnight", reference));
        assert_eq!(at(2024, 1, 7, 0, 0, 0), next("@weekly", reference));
        assert_eq!(at(2024, 2, 1, 0, 0, 0), next("@monthly", reference));
        assert_eq!(at(2025, 1, 1, 0, 0, 0), next("@YEARLY", reference));
        assert_eq!(at(2025, 1, 1, 0, 0, 0), next("@annually", reference));
        assert_eq!("@hourly", CronEntry::parse("@hourly").unwrap().to_string());
    }

    #[test]
    fn leap_day_within_lookahead() {
        let reference = at(2025, 3, 1, 0, 0, 0);
        assert_eq!(at(2028, 2, 29, 0, 0, 0), next("0 0 29 2 *", reference));

        let short = CronEntry::parse("0 0 29 2 *").unwrap().with_lookahead_years(2);
        assert!(matches!(
            short.next_running_time(reference),
            Err(CronError::ScheduleUnsatisfiable { years: 2, .. })
        ));
    }

    #[test]
    fn impossible_dates_are_unsatisfiable() {
        for expression in ["0 0 31 2 *", "0 0 30 2 *", "0 0 31 4,6,9,11 *"] {
            let entry = CronEntry::parse(expression).unwrap();
            match entry.next_running_time(at(2024, 1, 1, 0, 0, 0)) {
                Err(CronError::ScheduleUnsatisfiable {
                    expression: e,
                    years,
                    ..
                }) => {
                    assert_eq!(expression, e);
                    assert_eq!(DEFAULT_LOOKAHEAD_YEARS, years);
                }
                other => panic!("{expression} gave {other:?}"),
            }
            assert_eq!(0, entry.upcoming(0).count());
        }
    }

    #[test]
    fn wrong_field_counts_fail() {
        for expression in ["", "* * *", "* * * * * * *", "@fortnightly"] {
            assert!(matches!(
                CronEntry::parse(expression),
                Err(CronError::FieldCount { .. })
            ));
        }
    }

    #[test]
    fn bad_field_names_the_field() {
        assert!(matches!(
            CronEntry::parse("0 25 * * *"),
            Err(CronError::Parse {
                field: CronField::Hour,
                ..
            })
        ));
        assert!(matches!(
            "61 * * * * *".parse::<CronEntry>(),
            Err(CronError::Parse {
                field: CronField::Second,
                ..
            })
        ));
    }

    #[test]
    fn matches_checks_every_field() {
        let entry = CronEntry::parse("0 9 * * mon-fri").unwrap();
        assert!(entry.matches(at(2024, 1, 1, 9, 0, 0)));
        assert!(entry.matches(at(2024, 1, 1, 9, 0, 0) + 999));
        assert!(!entry.matches(at(2024, 1, 1, 9, 0, 1)));
        assert!(!entry.matches(at(2024, 1, 6, 9, 0, 0)));
    }

    #[test]
    fn next_after_uses_datetimes() {
        let entry = CronEntry::parse("0 0 * * *").unwrap();
        let after = DateTime::<Utc>::from_timestamp_millis(at(2024, 1, 1, 10, 0, 0)).unwrap();
        let expected = DateTime::<Utc>::from_timestamp_millis(at(2024, 1, 2, 0, 0, 0)).unwrap();
        assert_eq!(expected, entry.next_after(after).unwrap());
    }

    #[test]
    fn entries_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CronEntry>();
    }
}
