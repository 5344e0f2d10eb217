use chrono::{DateTime, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of days in the reading plan.
pub const PLAN_DAYS: u16 = 358;

/// One-based index into the reading schedule, always within `1..=PLAN_DAYS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub struct PlanDay(u16);

impl PlanDay {
    pub const FIRST: PlanDay = PlanDay(1);
    pub const LAST: PlanDay = PlanDay(PLAN_DAYS);

    pub fn new(day: i64) -> Option<Self> {
        if (1..=i64::from(PLAN_DAYS)).contains(&day) {
            Some(Self(day as u16))
        } else {
            None
        }
    }

    pub fn clamped(day: i64) -> Self {
        Self(day.clamp(1, i64::from(PLAN_DAYS)) as u16)
    }

    pub fn get(self) -> u16 {
        self.0
    }

    /// The day `delta` steps away, or `None` when that leaves the plan.
    pub fn offset(self, delta: i64) -> Option<Self> {
        Self::new(i64::from(self.0).saturating_add(delta))
    }

    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<i64> for PlanDay {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("plan day {value} is outside 1..={PLAN_DAYS}"))
    }
}

impl From<PlanDay> for u16 {
    fn from(day: PlanDay) -> Self {
        day.0
    }
}

impl fmt::Display for PlanDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Days elapsed from `start` to `date`, counting `start` itself as day 1.
///
/// Both sides are calendar dates, so the result is independent of time zones
/// and DST. The value is not clamped: dates before `start` give zero or a
/// negative number, dates past the plan give more than [`PLAN_DAYS`].
pub fn day_of_year(date: NaiveDate, start: NaiveDate) -> i64 {
    (date - start).num_days() + 1
}

/// Calendar date shown for `day_num`. Saturates at chrono's date range.
pub fn date_from_day(day_num: i64, start: NaiveDate) -> NaiveDate {
    let offset = day_num.saturating_sub(1);
    Duration::try_days(offset)
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(if offset < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

pub fn today_plan_day(today: NaiveDate, start: NaiveDate) -> PlanDay {
    PlanDay::clamped(day_of_year(today, start))
}

/// Long English form, e.g. `Monday, January 1, 2024`.
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp, keeping only the date.
pub fn parse_start_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(input)
        .ok()
        .map(|timestamp| timestamp.date_naive())
}

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn date_from_day_inverts_day_of_year_across_the_plan() {
        let start = ymd(2024, 1, 1);
        for day in 1..=i64::from(PLAN_DAYS) {
            assert_eq!(day_of_year(date_from_day(day, start), start), day);
        }
    }

    #[test]
    fn start_date_is_day_one() {
        let start = ymd(2024, 1, 1);
        assert_eq!(day_of_year(start, start), 1);
        assert_eq!(day_of_year(ymd(2024, 1, 10), start), 10);
        assert_eq!(day_of_year(ymd(2023, 12, 31), start), 0);
    }

    #[test]
    fn day_of_year_crosses_month_and_year_boundaries() {
        let start = ymd(2024, 12, 30);
        assert_eq!(day_of_year(ymd(2025, 1, 2), start), 4);
        assert_eq!(day_of_year(ymd(2024, 3, 1), ymd(2024, 2, 28)), 3);
        assert_eq!(date_from_day(4, start), ymd(2025, 1, 2));
    }

    #[test]
    fn date_from_day_accepts_out_of_range_numbers() {
        let start = ymd(2024, 1, 1);
        assert_eq!(date_from_day(0, start), ymd(2023, 12, 31));
        assert_eq!(date_from_day(-1, start), ymd(2023, 12, 30));
        assert_eq!(date_from_day(i64::MAX, start), NaiveDate::MAX);
    }

    #[test]
    fn plan_day_bounds() {
        assert!(PlanDay::new(0).is_none());
        assert!(PlanDay::new(359).is_none());
        assert_eq!(PlanDay::new(358), Some(PlanDay::LAST));
        assert_eq!(PlanDay::clamped(-40), PlanDay::FIRST);
        assert_eq!(PlanDay::clamped(1_000), PlanDay::LAST);
        assert_eq!(PlanDay::FIRST.offset(-1), None);
        assert_eq!(PlanDay::LAST.offset(1), None);
        assert_eq!(PlanDay::FIRST.offset(1).map(PlanDay::get), Some(2));
    }

    #[test]
    fn today_is_clamped_to_the_plan() {
        let start = ymd(2024, 1, 1);
        assert_eq!(today_plan_day(ymd(2024, 1, 10), start).get(), 10);
        assert_eq!(today_plan_day(ymd(2023, 6, 1), start), PlanDay::FIRST);
        assert_eq!(today_plan_day(ymd(2026, 6, 1), start), PlanDay::LAST);
    }

    #[test]
    fn parses_plain_and_timestamp_start_dates() {
        assert_eq!(parse_start_date("2024-03-05"), Some(ymd(2024, 3, 5)));
        assert_eq!(
            parse_start_date("2024-03-05T00:00:00.000Z"),
            Some(ymd(2024, 3, 5))
        );
        assert_eq!(parse_start_date(" 2024-03-05 "), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_start_date("not a date"), None);
        assert_eq!(parse_start_date("2024-02-30"), None);
    }

    #[test]
    fn long_date_format() {
        assert_eq!(format_long_date(ymd(2024, 1, 1)), "Monday, January 1, 2024");
    }
}
