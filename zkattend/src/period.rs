//! Reporting period arithmetic

use std::fmt;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};

/// Day of the previous month on which a period starts
pub const START_DAY: u32 = 25;

/// Closed window `[start, end]` of attendance to extract
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use zkattend::period::ReportingPeriod;
///
/// let now = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_hms_opt(14, 5, 0).unwrap();
/// let period = ReportingPeriod::ending_on(now);
/// assert_eq!(period.to_string(), "2024-02-25 00:00:00 .. 2024-03-10 23:59:59");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriod {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ReportingPeriod {
    /// Period from the 25th of the month before `now` to the end of `now`'s day
    pub fn ending_on(now: NaiveDateTime) -> Self {
        let today = now.date();
        let first_of_month = today.with_day(1).unwrap_or(today);
        let last_month = first_of_month - Duration::days(1);
        let start_date = NaiveDate::from_ymd_opt(last_month.year(), last_month.month(), START_DAY)
            .unwrap_or(last_month);

        Self {
            start: start_date.and_time(NaiveTime::MIN),
            end: today.and_time(end_of_day()),
        }
    }

    /// Period ending today on the local clock
    pub fn current() -> Self {
        Self::ending_on(Local::now().naive_local())
    }

    /// Inclusive on both ends
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format("%Y-%m-%d %H:%M:%S"),
            self.end.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}
