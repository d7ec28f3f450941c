//! Account time zone and date-range query parameters.
//!
//! The backend wants `from`/`until` as local timestamps carrying an explicit
//! `+HH:MM` offset, never a zone name.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::ApiError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// IANA time zone resolved from the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(Tz);

impl Timezone {
    pub fn parse(name: &str) -> Result<Self, ApiError> {
        name.trim()
            .parse::<Tz>()
            .map(Timezone)
            .map_err(|_| ApiError::UnknownTimezone(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Attach this zone to a naive local date-time.
    ///
    /// Ambiguous times (clocks going back) take the earlier instant; times
    /// skipped by a forward jump are moved one hour later.
    pub fn localize(&self, naive: NaiveDateTime) -> DateTime<Tz> {
        if let Some(local) = self.0.from_local_datetime(&naive).earliest() {
            return local;
        }
        self.0
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| self.0.from_utc_datetime(&naive))
    }

    /// `naive` localized and rendered as `YYYY-MM-DDTHH:MM:SS+HH:MM`.
    pub fn format_local(&self, naive: NaiveDateTime) -> String {
        format_timestamp(&self.localize(naive))
    }
}

impl FromStr for Timezone {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timezone::parse(s)
    }
}

pub fn format_timestamp(timestamp: &DateTime<Tz>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// A `from`/`until` pair for time-bounded collection queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    from: String,
    until: String,
}

impl DateWindow {
    /// Window from local midnight of `start` to the end of `end`, or to now
    /// when `end` is `None`.
    pub fn new(timezone: &Timezone, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self::at(timezone, start, end, Utc::now())
    }

    /// Same as [`DateWindow::new`] with an explicit "now".
    pub fn at(
        timezone: &Timezone,
        start: NaiveDate,
        end: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Self {
        let from = timezone.localize(start.and_time(NaiveTime::MIN));
        let until = match end {
            Some(end) => timezone.localize(end_of_day(end)),
            None => now.with_timezone(&timezone.0),
        };
        Self {
            from: format_timestamp(&from),
            until: format_timestamp(&until),
        }
    }

    /// `None` when there is no start date: the query goes out unfiltered.
    pub fn optional(
        timezone: &Timezone,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Option<Self> {
        start.map(|start| Self::new(timezone, start, end))
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn until(&self) -> &str {
        &self.until
    }

    pub fn query(&self) -> Vec<(String, String)> {
        vec![
            ("from".to_string(), self.from.clone()),
            ("until".to_string(), self.until.clone()),
        ]
    }
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::seconds(86_399)
}
