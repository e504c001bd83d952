//! Calendar and duration utilities

use crate::{Error, Result};
use chrono::{Datelike, NaiveDate};
use std::time::Duration;

/// Number of days in `month` of `year` (proleptic Gregorian calendar)
///
/// Leap years are handled by asking chrono for the first day of the
/// following month.
pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidInput(format!("Invalid month: {}-{:02}", year, month)))?;

    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let next_first = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(|| Error::InvalidInput(format!("Year out of range: {}", next_year)))?;

    Ok(next_first.signed_duration_since(first).num_days() as u32)
}

/// Check that `year`/`month`/`day` names a real calendar date
pub fn is_valid_date(year: i32, month: u32, day: u32) -> bool {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|date| date.day() == day)
        .unwrap_or(false)
}

/// Convert whole seconds to duration
pub fn secs_to_duration(secs: u64) -> Duration {
    Duration::from_secs(secs)
}
