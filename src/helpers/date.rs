//! Date helper functions

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Format a date for display in `tz`
pub fn format_date(instant: &DateTime<Utc>, tz: Tz, format: &str) -> String {
    tz.from_utc_datetime(&instant.naive_utc())
        .format(format)
        .to_string()
}
