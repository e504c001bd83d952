//! Time ranges and bisection
//!
//! A range covers whole days of a single month. Oversized ranges are halved
//! at `mid = (start + end) / 2` into `[start, mid]` and `[mid + 1, end]`.

use chrono::NaiveDate;
use hmis_common::time::days_in_month;
use hmis_common::{Error, Result};
use std::fmt;

/// Inclusive day span within one month
///
/// Invariant: `1 <= start_day <= end_day <= days_in_month(year, month)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    year: i32,
    month: u32,
    start_day: u32,
    end_day: u32,
}

impl TimeRange {
    /// Create a validated range
    pub fn new(year: i32, month: u32, start_day: u32, end_day: u32) -> Result<Self> {
        let days = days_in_month(year, month)?;

        if start_day == 0 || start_day > end_day || end_day > days {
            return Err(Error::InvalidInput(format!(
                "Invalid day range {}..={} for {}-{:02} ({} days)",
                start_day, end_day, year, month, days
            )));
        }

        Ok(Self {
            year,
            month,
            start_day,
            end_day,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn start_day(&self) -> u32 {
        self.start_day
    }

    pub fn end_day(&self) -> u32 {
        self.end_day
    }

    /// Number of days covered
    pub fn days(&self) -> u32 {
        self.end_day - self.start_day + 1
    }

    pub fn is_single_day(&self) -> bool {
        self.start_day == self.end_day
    }

    pub fn start_date(&self) -> NaiveDate {
        self.date(self.start_day)
    }

    pub fn end_date(&self) -> NaiveDate {
        self.date(self.end_day)
    }

    fn date(&self, day: u32) -> NaiveDate {
        // Validated at construction
        NaiveDate::from_ymd_opt(self.year, self.month, day).unwrap_or(NaiveDate::MIN)
    }

    /// Query start, e.g. `2013-08-01T00:00:00`
    pub fn start_time(&self) -> String {
        format!("{}T00:00:00", self.start_date().format("%Y-%m-%d"))
    }

    /// Query end, e.g. `2013-08-31T23:00:00`
    pub fn end_time(&self) -> String {
        format!("{}T23:00:00", self.end_date().format("%Y-%m-%d"))
    }

    /// Bisect the range, or `None` for a single day
    pub fn split(&self) -> Option<(TimeRange, TimeRange)> {
        if self.is_single_day() {
            return None;
        }

        let mid = (self.start_day + self.end_day) / 2;
        let left = TimeRange {
            end_day: mid,
            ..*self
        };
        let right = TimeRange {
            start_day: mid + 1,
            ..*self
        };
        Some((left, right))
    }
}

/// `MM/DD/YYYY to MM/DD/YYYY`
impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start_date().format("%m/%d/%Y"),
            self.end_date().format("%m/%d/%Y")
        )
    }
}

/// Whether a result set of `count` records is over the per-request limit
pub fn should_split(count: u64, threshold: u64) -> bool {
    count > threshold
}

/// What to do with a range after searching it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPlan {
    /// Small enough to submit
    Submit,
    /// Replace the range with these halves
    Bisect(TimeRange, TimeRange),
    /// Over the limit but a single day; submitted as-is
    Oversized,
}

/// Decide how to treat `range` given its record count
pub fn plan(range: &TimeRange, count: u64, threshold: u64) -> SplitPlan {
    if !should_split(count, threshold) {
        return SplitPlan::Submit;
    }

    match range.split() {
        Some((left, right)) => SplitPlan::Bisect(left, right),
        None => SplitPlan::Oversized,
    }
}
