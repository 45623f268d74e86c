// src/pac/datetime.rs
//! `weekdayRange`, `dateRange` and `timeRange`.
//!
//! Each accepts a trailing `"GMT"` argument that switches the reference
//! clock from local time to UTC. Any argument that does not parse, and any
//! argument shape not listed below, makes the call return `false`.

use super::helpers::PacArg;
use chrono::{Datelike, Local, Months, NaiveDate, NaiveDateTime, Timelike, Utc, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Local,
    Utc,
}

/// Source of "now" for the range helpers.
pub trait Clock: Send + Sync {
    fn now(&self, zone: Zone) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self, zone: Zone) -> NaiveDateTime {
        match zone {
            Zone::Local => Local::now().naive_local(),
            Zone::Utc => Utc::now().naive_utc(),
        }
    }
}

static WEEKDAYS: [(&str, Weekday); 7] = [
    ("SUN", Weekday::Sun),
    ("MON", Weekday::Mon),
    ("TUE", Weekday::Tue),
    ("WED", Weekday::Wed),
    ("THU", Weekday::Thu),
    ("FRI", Weekday::Fri),
    ("SAT", Weekday::Sat),
];

static MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Splits off a trailing `GMT` marker.
fn split_zone(args: &[PacArg]) -> (&[PacArg], Zone) {
    match args.split_last() {
        Some((last, rest)) if last.text().trim().eq_ignore_ascii_case("GMT") => (rest, Zone::Utc),
        _ => (args, Zone::Local),
    }
}

/// `start..=end`, or when `start > end` the range that wraps past the
/// domain's maximum back to its minimum.
fn in_cyclic_range<T: PartialOrd>(current: T, start: T, end: T) -> bool {
    if start <= end {
        current >= start && current <= end
    } else {
        current >= start || current <= end
    }
}

/// Upper-cased first three characters of a string argument.
fn name_key(arg: &PacArg) -> Option<String> {
    let s = arg.as_str()?.trim().to_uppercase();
    Some(s.chars().take(3).collect())
}

fn parse_weekday(arg: &PacArg) -> Option<Weekday> {
    if let Some(key) = name_key(arg) {
        if let Some((_, day)) = WEEKDAYS.iter().find(|(name, _)| *name == key) {
            return Some(*day);
        }
    }
    match arg.as_int()? {
        n @ 0..=6 => Some(WEEKDAYS[n as usize].1),
        _ => None,
    }
}

pub fn weekday_range(args: &[PacArg], clock: &dyn Clock) -> bool {
    let (args, zone) = split_zone(args);
    if args.is_empty() || args.len() > 2 {
        return false;
    }
    let Some(start) = parse_weekday(&args[0]) else {
        return false;
    };
    let today = clock.now(zone).weekday().num_days_from_sunday();
    match args.get(1) {
        None => today == start.num_days_from_sunday(),
        Some(arg) => match parse_weekday(arg) {
            Some(end) => in_cyclic_range(
                today,
                start.num_days_from_sunday(),
                end.num_days_from_sunday(),
            ),
            None => false,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateArg {
    Day(u32),
    Month(u32),
    Year(i32),
}

/// Month names win; otherwise a positive integer up to 31 is a day and
/// anything larger a year (two-digit years count from 1900).
fn parse_date_arg(arg: &PacArg) -> Option<DateArg> {
    if let Some(key) = name_key(arg) {
        if let Some(index) = MONTHS.iter().position(|name| *name == key) {
            return Some(DateArg::Month(index as u32 + 1));
        }
    }
    match arg.as_int()? {
        n if n <= 0 => None,
        n if n <= 31 => Some(DateArg::Day(n as u32)),
        n => i32::try_from(normalize_year(n)).ok().map(DateArg::Year),
    }
}

fn normalize_year(year: i64) -> i64 {
    if (0..100).contains(&year) {
        1900 + year
    } else {
        year
    }
}

pub fn date_range(args: &[PacArg], clock: &dyn Clock) -> bool {
    let (args, zone) = split_zone(args);
    if args.is_empty() {
        return false;
    }
    let Some(parsed) = args.iter().map(parse_date_arg).collect::<Option<Vec<_>>>() else {
        return false;
    };
    date_range_matches(&parsed, clock.now(zone).date())
}

fn date_range_matches(args: &[DateArg], today: NaiveDate) -> bool {
    use DateArg::*;

    let (day, month, year) = (today.day(), today.month(), today.year());
    match *args {
        [Day(d)] => day == d,
        [Month(m)] => month == m,
        [Year(y)] => year == y,

        [Day(d1), Day(d2)] => in_cyclic_range(day, d1, d2),
        [Month(m1), Month(m2)] => in_cyclic_range(month, m1, m2),
        [Year(y1), Year(y2)] => in_cyclic_range(year, y1, y2),
        [Day(d), Month(m)] => day == d && month == m,
        [Month(m), Year(y)] => month == m && year == y,

        [Day(d), Month(m), Year(y)] => day == d && month == m && year == y,

        [Day(d1), Month(m1), Day(d2), Month(m2)] => {
            match (make_date(year, m1, d1), make_date(year, m2, d2)) {
                (Some(start), Some(end)) => date_in_range(today, start, end, true),
                _ => false,
            }
        }
        [Month(m1), Year(y1), Month(m2), Year(y2)] => {
            match (make_date(y1, m1, 1), last_day_of_month(y2, m2)) {
                (Some(start), Some(end)) => date_in_range(today, start, end, false),
                _ => false,
            }
        }

        [Day(d1), Month(m1), Year(y), Day(d2), Month(m2)] => {
            match (make_date(y, m1, d1), make_date(y, m2, d2)) {
                (Some(start), Some(end)) => date_in_range(today, start, end, true),
                _ => false,
            }
        }

        [Day(d1), Month(m1), Year(y1), Day(d2), Month(m2), Year(y2)] => {
            match (make_date(y1, m1, d1), make_date(y2, m2, d2)) {
                (Some(start), Some(end)) => date_in_range(today, start, end, false),
                _ => false,
            }
        }

        _ => false,
    }
}

/// `None` for dates that do not exist, such as 31 April.
fn make_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    make_date(year, month, 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

/// Inclusive date range. With `allow_wrap`, an end before the start is read
/// as crossing a year boundary: whichever bound keeps `today` nearest moves
/// by a year.
fn date_in_range(today: NaiveDate, start: NaiveDate, end: NaiveDate, allow_wrap: bool) -> bool {
    let (start, end) = if allow_wrap && end < start {
        if today < start {
            match start.checked_sub_months(Months::new(12)) {
                Some(start) => (start, end),
                None => return false,
            }
        } else {
            match end.checked_add_months(Months::new(12)) {
                Some(end) => (start, end),
                None => return false,
            }
        }
    } else {
        (start, end)
    };
    start <= today && today <= end
}

pub fn time_range(args: &[PacArg], clock: &dyn Clock) -> bool {
    let (args, zone) = split_zone(args);
    if args.is_empty() {
        return false;
    }
    let Some(values) = args.iter().map(PacArg::as_int).collect::<Option<Vec<_>>>() else {
        return false;
    };
    time_range_matches(&values, clock.now(zone))
}

fn time_range_matches(values: &[i64], now: NaiveDateTime) -> bool {
    let (hour, minute, second) = (now.hour() as i64, now.minute() as i64, now.second() as i64);
    let now_secs = hour * 3600 + minute * 60 + second;

    match *values {
        [h] => valid_hour(h) && hour == h,
        [h1, h2] => {
            valid_hour(h1)
                && valid_hour(h2)
                && in_cyclic_range(now_secs, h1 * 3600, h2 * 3600 + 3599)
        }
        [h, m, s] => valid_time(h, m, s) && hour == h && minute == m && second == s,
        [h1, m1, h2, m2] => {
            valid_time(h1, m1, 0)
                && valid_time(h2, m2, 0)
                && in_cyclic_range(now_secs, h1 * 3600 + m1 * 60, h2 * 3600 + m2 * 60 + 59)
        }
        [h1, m1, s1, h2, m2, s2] => {
            valid_time(h1, m1, s1)
                && valid_time(h2, m2, s2)
                && in_cyclic_range(
                    now_secs,
                    h1 * 3600 + m1 * 60 + s1,
                    h2 * 3600 + m2 * 60 + s2,
                )
        }
        _ => false,
    }
}

fn valid_hour(hour: i64) -> bool {
    (0..=23).contains(&hour)
}

fn valid_time(hour: i64, minute: i64, second: i64) -> bool {
    valid_hour(hour) && (0..=59).contains(&minute) && (0..=59).contains(&second)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Local time and UTC deliberately differ so GMT handling is observable.
    struct FixedClock {
        local: NaiveDateTime,
        utc: NaiveDateTime,
    }

    impl FixedClock {
        fn at(local: &str) -> Self {
            let local = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S").unwrap();
            Self { local, utc: local }
        }

        fn with_utc(mut self, utc: &str) -> Self {
            self.utc = NaiveDateTime::parse_from_str(utc, "%Y-%m-%d %H:%M:%S").unwrap();
            self
        }
    }

    impl Clock for FixedClock {
        fn now(&self, zone: Zone) -> NaiveDateTime {
            match zone {
                Zone::Local => self.local,
                Zone::Utc => self.utc,
            }
        }
    }

    fn s(v: &str) -> PacArg {
        PacArg::from(v)
    }

    fn n(v: i64) -> PacArg {
        PacArg::from(v)
    }

    // 2024-03-15 is a Friday.
    const FRIDAY_NOON: &str = "2024-03-15 12:00:00";

    #[test]
    fn weekday_single_and_names() {
        let clock = FixedClock::at(FRIDAY_NOON);
        assert!(weekday_range(&[s("FRI")], &clock));
        assert!(weekday_range(&[s("fri")], &clock));
        assert!(weekday_range(&[s(" Friday ")], &clock));
        assert!(weekday_range(&[n(5)], &clock));
        assert!(weekday_range(&[s("5")], &clock));
        assert!(!weekday_range(&[s("MON")], &clock));
    }

    #[test]
    fn weekday_ranges_wrap() {
        let clock = FixedClock::at(FRIDAY_NOON);
        assert!(weekday_range(&[s("MON"), s("FRI")], &clock));
        assert!(!weekday_range(&[s("MON"), s("THU")], &clock));
        assert!(weekday_range(&[s("FRI"), s("MON")], &clock));
        assert!(weekday_range(&[s("THU"), s("SUN")], &clock));
        assert!(!weekday_range(&[s("SAT"), s("TUE")], &clock));
    }

    #[test]
    fn weekday_rejects_bad_input() {
        let clock = FixedClock::at(FRIDAY_NOON);
        assert!(!weekday_range(&[], &clock));
        assert!(!weekday_range(&[s("GMT")], &clock));
        assert!(!weekday_range(&[s("XYZ")], &clock));
        assert!(!weekday_range(&[n(7)], &clock));
        assert!(!weekday_range(&[s("MON"), s("NOPE")], &clock));
        assert!(!weekday_range(&[s("MON"), s("TUE"), s("WED")], &clock));
        assert!(!weekday_range(&[PacArg::Num(5.5)], &clock));
    }

    #[test]
    fn gmt_marker_selects_utc() {
        // Friday 00:30 locally, still Thursday in UTC.
        let clock = FixedClock::at("2024-03-15 00:30:00").with_utc("2024-03-14 23:30:00");
        assert!(weekday_range(&[s("FRI")], &clock));
        assert!(!weekday_range(&[s("FRI"), s("GMT")], &clock));
        assert!(weekday_range(&[s("THU"), s(" gmt ")], &clock));
        assert!(time_range(&[n(23), s("GMT")], &clock));
        assert!(!time_range(&[n(23)], &clock));
        assert!(date_range(&[n(14), s("GMT")], &clock));
    }

    #[test]
    fn cyclic_law_holds_for_every_weekday_pair() {
        for today in 0..7i64 {
            let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap() + chrono::Duration::days(today);
            let clock = FixedClock::at(&format!("{} 08:00:00", date));
            for start in 0..7i64 {
                for end in 0..7i64 {
                    let expected = if start <= end {
                        start <= today && today <= end
                    } else {
                        today >= start || today <= end
                    };
                    assert_eq!(
                        weekday_range(&[n(start), n(end)], &clock),
                        expected,
                        "today={today} start={start} end={end}"
                    );
                }
            }
        }
    }

    fn cyclic(current: i64, start: i64, end: i64) -> bool {
        if start <= end {
            start <= current && current <= end
        } else {
            current >= start || current <= end
        }
    }

    #[test]
    fn cyclic_law_holds_for_every_day_pair() {
        for today in 1..=31i64 {
            let clock = FixedClock::at(&format!("2024-01-{today:02} 08:00:00"));
            for start in 1..=31i64 {
                for end in 1..=31i64 {
                    assert_eq!(
                        date_range(&[n(start), n(end)], &clock),
                        cyclic(today, start, end),
                        "today={today} start={start} end={end}"
                    );
                }
            }
        }
    }

    #[test]
    fn cyclic_law_holds_for_every_month_pair() {
        for today in 1..=12i64 {
            let clock = FixedClock::at(&format!("2024-{today:02}-15 08:00:00"));
            for start in 1..=12i64 {
                for end in 1..=12i64 {
                    let args = [s(MONTHS[start as usize - 1]), s(MONTHS[end as usize - 1])];
                    assert_eq!(
                        date_range(&args, &clock),
                        cyclic(today, start, end),
                        "today={today} start={start} end={end}"
                    );
                }
            }
        }
    }

    #[test]
    fn cyclic_law_holds_for_year_pairs() {
        let years = 2020..=2028i64;
        for today in years.clone() {
            let clock = FixedClock::at(&format!("{today}-06-15 08:00:00"));
            for start in years.clone() {
                for end in years.clone() {
                    assert_eq!(
                        date_range(&[n(start), n(end)], &clock),
                        cyclic(today, start, end),
                        "today={today} start={start} end={end}"
                    );
                }
            }
        }
    }

    #[test]
    fn date_single_and_pairs() {
        let clock = FixedClock::at("2024-03-28 09:00:00");
        assert!(date_range(&[n(28)], &clock));
        assert!(date_range(&[s("MAR")], &clock));
        assert!(date_range(&[s("march")], &clock));
        assert!(date_range(&[n(2024)], &clock));
        assert!(!date_range(&[n(1995)], &clock));

        assert!(date_range(&[n(25), n(5)], &clock));
        assert!(!date_range(&[n(5), n(25)], &clock));
        assert!(date_range(&[s("NOV"), s("APR")], &clock));
        assert!(!date_range(&[s("APR"), s("NOV")], &clock));
        assert!(date_range(&[n(2020), n(2030)], &clock));
        assert!(date_range(&[n(28), s("MAR")], &clock));
        assert!(!date_range(&[n(28), s("APR")], &clock));
        assert!(date_range(&[s("MAR"), n(2024)], &clock));
        assert!(date_range(&[n(28), s("MAR"), n(2024)], &clock));
        assert!(!date_range(&[n(28), s("MAR"), n(2023)], &clock));
    }

    #[test]
    fn small_numbers_are_always_days() {
        // "24" reads as the 24th, never as 1924 or 2024.
        let clock = FixedClock::at("2024-03-28 09:00:00");
        assert!(!date_range(&[n(24)], &clock));
        assert!(date_range(&[n(99)], &FixedClock::at("1999-06-01 00:00:00")));
    }

    #[test]
    fn date_unrecognized_shapes_are_false() {
        let clock = FixedClock::at("2024-03-28 09:00:00");
        assert!(!date_range(&[], &clock));
        assert!(!date_range(&[s("MAR"), n(28)], &clock));
        assert!(!date_range(&[n(0)], &clock));
        assert!(!date_range(&[s("bogus")], &clock));
        assert!(!date_range(&[n(1), n(2), n(3)], &clock));
        assert!(!date_range(&[n(1), s("JAN"), n(2), s("FEB"), n(3), s("MAR"), n(2024)], &clock));
    }

    #[test]
    fn day_month_range_within_year() {
        let clock = FixedClock::at("2024-03-28 09:00:00");
        assert!(date_range(&[n(1), s("MAR"), n(31), s("MAR")], &clock));
        assert!(!date_range(&[n(1), s("APR"), n(30), s("JUN")], &clock));
        // 31 April does not exist.
        assert!(!date_range(&[n(1), s("MAR"), n(31), s("APR")], &clock));
    }

    #[test]
    fn day_month_range_wraps_year_end() {
        let december = FixedClock::at("2024-12-28 09:00:00");
        let january = FixedClock::at("2025-01-03 09:00:00");
        let june = FixedClock::at("2025-06-03 09:00:00");
        let range = [n(20), s("DEC"), n(5), s("JAN")];
        assert!(date_range(&range, &december));
        assert!(date_range(&range, &january));
        assert!(!date_range(&range, &june));
    }

    #[test]
    fn month_year_range_spans_full_months_without_wrap() {
        let clock = FixedClock::at("2024-02-29 09:00:00");
        assert!(date_range(&[s("NOV"), n(2023), s("FEB"), n(2024)], &clock));
        assert!(!date_range(&[s("MAR"), n(2024), s("FEB"), n(2024)], &clock));
        assert!(date_range(&[s("FEB"), n(2024), s("FEB"), n(2024)], &clock));
    }

    #[test]
    fn explicit_start_and_end_dates() {
        let clock = FixedClock::at("2024-03-28 09:00:00");
        assert!(date_range(&[n(1), s("MAR"), n(2024), n(1), s("APR")], &clock));
        assert!(date_range(
            &[n(15), s("DEC"), n(2023), n(15), s("JAN"), n(2025)],
            &clock
        ));
        assert!(!date_range(
            &[n(15), s("DEC"), n(2024), n(15), s("JAN"), n(2025)],
            &clock
        ));
        assert!(!date_range(
            &[n(30), s("FEB"), n(2024), n(15), s("JAN"), n(2025)],
            &clock
        ));
    }

    #[test]
    fn time_hour_forms() {
        let clock = FixedClock::at("2024-03-15 23:10:00");
        assert!(time_range(&[n(23)], &clock));
        assert!(!time_range(&[n(22)], &clock));
        assert!(time_range(&[n(22), n(2)], &clock));
        assert!(!time_range(&[n(22), n(2)], &FixedClock::at("2024-03-15 12:00:00")));
        assert!(time_range(&[n(22), n(2)], &FixedClock::at("2024-03-15 02:59:59")));
        assert!(!time_range(&[n(22), n(2)], &FixedClock::at("2024-03-15 03:00:00")));
        assert!(time_range(&[n(9), n(17)], &FixedClock::at("2024-03-15 17:59:59")));
    }

    #[test]
    fn time_minute_and_second_forms() {
        let clock = FixedClock::at("2024-03-15 12:30:45");
        assert!(time_range(&[n(12), n(30), n(45)], &clock));
        assert!(!time_range(&[n(12), n(30), n(44)], &clock));
        assert!(time_range(&[n(12), n(0), n(12), n(30)], &clock));
        assert!(!time_range(&[n(12), n(31), n(13), n(0)], &clock));
        assert!(time_range(&[n(12), n(30), n(0), n(12), n(30), n(45)], &clock));
        assert!(!time_range(&[n(12), n(30), n(46), n(12), n(31), n(0)], &clock));
        assert!(time_range(&[n(23), n(0), n(0), n(13), n(0), n(0)], &clock));
    }

    #[test]
    fn time_rejects_invalid_values_and_shapes() {
        let clock = FixedClock::at("2024-03-15 12:30:45");
        assert!(!time_range(&[], &clock));
        assert!(!time_range(&[n(24)], &clock));
        assert!(!time_range(&[n(-1), n(12)], &clock));
        assert!(!time_range(&[n(12), n(60), n(0)], &clock));
        assert!(!time_range(&[n(1), n(2), n(3), n(4), n(5)], &clock));
        assert!(!time_range(&[s("noon")], &clock));
        assert!(time_range(&[s("12")], &clock));
    }
}
