//! Date/time utilities for xCloud.

use std::time::SystemTime;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

use crate::{Result, XcloudError};

/// Timezone in which a calendar date is interpreted for date search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchZone {
    /// The host's local time.
    Local,
    /// A named IANA timezone.
    Named(Tz),
}

impl SearchZone {
    /// Build from a configured timezone name. Empty means local time.
    pub fn from_name(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Ok(SearchZone::Local);
        }
        name.parse::<Tz>()
            .map(SearchZone::Named)
            .map_err(|_| XcloudError::Config(format!("unknown timezone '{name}'")))
    }

    /// The half-open window `[start_of_day, start_of_day + 24h)` for `date`.
    pub fn day_window(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = match self {
            SearchZone::Local => start_of_day(date, &Local),
            SearchZone::Named(tz) => start_of_day(date, tz),
        };
        (start, start + Duration::hours(24))
    }
}

fn start_of_day<Z: TimeZone>(date: NaiveDate, zone: &Z) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::default());
    zone.from_local_datetime(&midnight)
        .earliest()
        // Midnight skipped by a DST jump: the day starts one hour later.
        .or_else(|| zone.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

/// Whether `ts` falls inside the day window.
pub fn in_window(ts: &DateTime<Utc>, window: &(DateTime<Utc>, DateTime<Utc>)) -> bool {
    *ts >= window.0 && *ts < window.1
}

/// Parse a search date given as `YYYY-MM-DD` or as an RFC 3339 timestamp.
pub fn parse_search_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(input).ok().map(|dt| dt.date_naive()))
}

/// Convert a filesystem timestamp to UTC.
pub fn from_system_time(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// Format as RFC 3339 with millisecond precision and a `Z` suffix.
pub fn to_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
