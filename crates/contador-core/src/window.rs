//! Date window classification for ledger rows
//!
//! All comparisons use local wall-clock time. "Today" is the calendar day of
//! `now`; "this week" runs from the most recent Sunday at `now`'s time of day
//! up to `now` inclusive.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime};

use crate::types::Window;

/// Formats tried, in order, for date cells read back from the sheet
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// True iff `ts` falls on the same calendar day as `now`
pub fn is_today(ts: NaiveDateTime, now: NaiveDateTime) -> bool {
    ts.date() == now.date()
}

/// Start of the current week: `now` minus its weekday index counted from Sunday.
/// The time of day is kept, not truncated to midnight.
pub fn week_start(now: NaiveDateTime) -> NaiveDateTime {
    now - Duration::days(i64::from(now.weekday().num_days_from_sunday()))
}

/// True iff `week_start(now) <= ts <= now`
pub fn is_this_week(ts: NaiveDateTime, now: NaiveDateTime) -> bool {
    ts >= week_start(now) && ts <= now
}

impl Window {
    /// Whether a row timestamp belongs to this window
    pub fn contains(&self, ts: NaiveDateTime, now: NaiveDateTime) -> bool {
        match self {
            Self::Today => is_today(ts, now),
            Self::ThisWeek => is_this_week(ts, now),
        }
    }
}

/// Parse a ledger date cell into local wall-clock time.
///
/// Accepts spreadsheet serial numbers (days since 1899-12-30), RFC 3339
/// timestamps (converted to local time) and the common day-first and ISO
/// layouts the sheet may render.
pub fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }

    if let Ok(serial) = cell.parse::<f64>() {
        return from_serial(serial);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.with_timezone(&Local).naive_local());
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(cell, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(cell, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

/// Render a timestamp the way it is written to the sheet
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
