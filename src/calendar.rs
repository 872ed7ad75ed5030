//! Trading calendar and session window computation.
//!
//! Converts between UTC and the exchange-local clock using the simple US
//! daylight-saving rule: UTC-4 from the second Sunday of March 02:00 local
//! through the first Sunday of November 02:00 local, UTC-5 otherwise. No
//! IANA database; the rule is computed exactly from the civil calendar.
//!
//! Session boundaries per local trading day:
//! - open 09:30 local, close 16:00 local
//! - `signal_window_end` = open + opening-range window (range variants)
//! - `no_entry_after` = configured cutoff time-of-day
//! - `flatten_deadline` = close - close buffer

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};

/// Standard (winter) offset from UTC in hours. New York is UTC-5.
const STANDARD_OFFSET_HOURS: i64 = 5;
/// Daylight-saving offset from UTC in hours. New York is UTC-4.
const DAYLIGHT_OFFSET_HOURS: i64 = 4;

/// Regular session open, local clock.
const SESSION_OPEN: (u32, u32) = (9, 30);
/// Regular session close, local clock.
const SESSION_CLOSE: (u32, u32) = (16, 0);

/// Find the nth occurrence of a weekday within a month (1-indexed).
///
/// Counts occurrences of the weekday inside the month exactly. Panics when
/// the occurrence does not exist: silently wrapping into the next month
/// would corrupt every session boundary downstream, so this fails loudly.
pub fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    assert!(n >= 1, "weekday occurrence is 1-indexed");
    let mut date = NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or_else(|| panic!("invalid month {year}-{month:02}"));
    let mut count = 0;
    while date.month() == month {
        if date.weekday() == weekday {
            count += 1;
            if count == n {
                return date;
            }
        }
        date = date.succ_opt().expect("date arithmetic overflow");
    }
    panic!("no occurrence {n} of {weekday:?} in {year}-{month:02}");
}

/// Local instant daylight saving begins: second Sunday of March, 02:00.
fn dst_start_local(year: i32) -> NaiveDateTime {
    nth_weekday_of_month(year, 3, Weekday::Sun, 2)
        .and_time(NaiveTime::from_hms_opt(2, 0, 0).expect("valid time"))
}

/// Local instant daylight saving ends: first Sunday of November, 02:00.
fn dst_end_local(year: i32) -> NaiveDateTime {
    nth_weekday_of_month(year, 11, Weekday::Sun, 1)
        .and_time(NaiveTime::from_hms_opt(2, 0, 0).expect("valid time"))
}

/// Whether a local wall-clock instant falls inside the daylight-saving window.
fn is_dst_local(local: NaiveDateTime) -> bool {
    let year = local.year();
    local >= dst_start_local(year) && local < dst_end_local(year)
}

/// Whether a UTC instant falls inside the daylight-saving window.
///
/// The boundaries are fixed in UTC: the spring transition happens while the
/// standard offset is in force (02:00 local = 07:00 UTC), the fall one while
/// the daylight offset is (02:00 local = 06:00 UTC).
fn is_dst_utc(utc: NaiveDateTime) -> bool {
    let year = utc.year();
    let start_utc = dst_start_local(year) + Duration::hours(STANDARD_OFFSET_HOURS);
    let end_utc = dst_end_local(year) + Duration::hours(DAYLIGHT_OFFSET_HOURS);
    utc >= start_utc && utc < end_utc
}

/// Convert a UTC instant to the local wall clock.
pub fn to_local(utc: DateTime<Utc>) -> NaiveDateTime {
    let offset = if is_dst_utc(utc.naive_utc()) {
        DAYLIGHT_OFFSET_HOURS
    } else {
        STANDARD_OFFSET_HOURS
    };
    utc.naive_utc() - Duration::hours(offset)
}

/// Convert a local wall-clock instant to UTC.
pub fn to_utc(local: NaiveDateTime) -> DateTime<Utc> {
    let offset = if is_dst_local(local) {
        DAYLIGHT_OFFSET_HOURS
    } else {
        STANDARD_OFFSET_HOURS
    };
    Utc.from_utc_datetime(&(local + Duration::hours(offset)))
}

/// Local calendar date of a UTC instant.
pub fn local_date_of(utc: DateTime<Utc>) -> NaiveDate {
    to_local(utc).date()
}

/// Session boundaries for one local trading day, stored as UTC instants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionBounds {
    /// Local calendar date these bounds were computed for
    pub date: NaiveDate,
    pub session_open: DateTime<Utc>,
    /// End of the opening-range window (equals open when no window is set)
    pub signal_window_end: DateTime<Utc>,
    pub session_close: DateTime<Utc>,
    /// First trades of the day are not allowed at or after this instant
    pub no_entry_after: DateTime<Utc>,
    /// All open positions are force-closed from this instant onward
    pub flatten_deadline: DateTime<Utc>,
}

/// Compute the session boundaries for a local calendar date.
///
/// The cutoff is clamped to the session close and the flatten deadline never
/// exceeds the close, preserving `open < no_entry_after <= close` and
/// `flatten_deadline <= close`.
pub fn session_bounds_for(
    date: NaiveDate,
    entry_cutoff: NaiveTime,
    close_buffer: Duration,
    signal_window: Duration,
) -> SessionBounds {
    let open_local = date.and_time(
        NaiveTime::from_hms_opt(SESSION_OPEN.0, SESSION_OPEN.1, 0).expect("valid time"),
    );
    let close_local = date.and_time(
        NaiveTime::from_hms_opt(SESSION_CLOSE.0, SESSION_CLOSE.1, 0).expect("valid time"),
    );

    let session_open = to_utc(open_local);
    let session_close = to_utc(close_local);
    let no_entry_after = to_utc(date.and_time(entry_cutoff)).min(session_close);
    let flatten_deadline = session_close - close_buffer.max(Duration::zero());
    let signal_window_end = session_open + signal_window.max(Duration::zero());

    SessionBounds {
        date,
        session_open,
        signal_window_end,
        session_close,
        no_entry_after,
        flatten_deadline,
    }
}
