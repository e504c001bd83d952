//! Staging sessions and record queries

use crate::range::TimeRange;
use hmis_common::time::days_in_month;
use hmis_common::{Error, Result, StagerConfig};
use uuid::Uuid;

/// One month of one year being staged
///
/// Attempt counters are not kept here: each queued range carries its own.
#[derive(Debug, Clone)]
pub struct StagingSession {
    /// Unique session identifier (for log correlation)
    pub session_id: Uuid,
    pub year: i32,
    pub month: u32,
    pub days_in_month: u32,
    pub series_name: String,
    pub notify_address: String,
    pub segment: String,
    pub sample_seconds: u32,
}

impl StagingSession {
    /// Create a session, taking days-in-month from the calendar unless overridden
    ///
    /// An override may shorten the month but never extend it past the calendar.
    pub fn new(
        year: i32,
        month: u32,
        days_override: Option<u32>,
        config: &StagerConfig,
        notify_address: impl Into<String>,
    ) -> Result<Self> {
        let calendar_days = days_in_month(year, month)?;
        let days = days_override.unwrap_or(calendar_days);

        if days == 0 || days > calendar_days {
            return Err(Error::InvalidInput(format!(
                "{}-{:02} has {} days, not {}",
                year, month, calendar_days, days
            )));
        }

        Ok(Self {
            session_id: Uuid::new_v4(),
            year,
            month,
            days_in_month: days,
            series_name: config.series_name.clone(),
            notify_address: notify_address.into(),
            segment: config.segment.clone(),
            sample_seconds: config.sample_seconds,
        })
    }

    /// Days 1 through `days_in_month`
    pub fn full_range(&self) -> Result<TimeRange> {
        self.range(1, self.days_in_month)
    }

    /// Operator-chosen sub-range of this month
    pub fn range(&self, start_day: u32, end_day: u32) -> Result<TimeRange> {
        if end_day > self.days_in_month {
            return Err(Error::InvalidInput(format!(
                "Day {} is past the session's last day {}",
                end_day, self.days_in_month
            )));
        }
        TimeRange::new(self.year, self.month, start_day, end_day)
    }

    /// Query parameters for searching `range`
    pub fn query(&self, range: TimeRange) -> RecordQuery {
        RecordQuery {
            series_name: self.series_name.clone(),
            range,
            notify_address: self.notify_address.clone(),
            segment: self.segment.clone(),
            sample_seconds: self.sample_seconds,
        }
    }

    /// `MM/YYYY` label for logs
    pub fn label(&self) -> String {
        format!("{:02}/{}", self.month, self.year)
    }
}

/// Parameters of one export search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub series_name: String,
    pub range: TimeRange,
    pub notify_address: String,
    pub segment: String,
    pub sample_seconds: u32,
}

impl RecordQuery {
    /// JSOC record set specification
    ///
    /// e.g. `hmi.sharp_cea_720s[][2013.08.01_00:00:00_TAI-2013.08.31_23:00:00_TAI@3600s]{bitmap}`
    pub fn record_set(&self) -> String {
        format!(
            "{}[][{}_00:00:00_TAI-{}_23:00:00_TAI@{}s]{{{}}}",
            self.series_name,
            self.range.start_date().format("%Y.%m.%d"),
            self.range.end_date().format("%Y.%m.%d"),
            self.sample_seconds,
            self.segment
        )
    }
}

/// Matching records for a query; only the count matters to the stager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    pub query: RecordQuery,
    pub count: u64,
}
