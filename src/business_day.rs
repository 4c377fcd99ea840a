//! Business-date computation under a midnight-wrapping operating window.
//!
//! The spa runs service hours that straddle midnight (16:00–04:00), so a
//! completion logged at 01:30 belongs to the *previous* calendar day's
//! books. Every "today's revenue" and cutoff computation in the engine goes
//! through this module; nothing else is allowed to compare raw calendar
//! dates.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// The operating window the business-date rule is evaluated against.
///
/// All wall-clock conversions use the single fixed business timezone,
/// regardless of the caller's local timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    /// Local hour service opens (0–23).
    pub start_hour: u32,
    /// Local hour service closes (0–23). May be earlier than `start_hour`,
    /// meaning the window wraps past midnight.
    pub end_hour: u32,
    pub tz: Tz,
}

impl Default for OperatingWindow {
    fn default() -> Self {
        Self {
            start_hour: 16,
            end_hour: 4,
            tz: chrono_tz::America::New_York,
        }
    }
}

impl OperatingWindow {
    pub fn wraps_midnight(&self) -> bool {
        self.end_hour < self.start_hour
    }
}

/// The operating-day label for an instant.
///
/// Rule: if the window wraps midnight and the instant's local wall-clock
/// hour is strictly before the window's start hour, the business date is the
/// local calendar date minus one day; otherwise it is the local calendar
/// date. Pure and deterministic for identical inputs.
pub fn business_date(instant: DateTime<Utc>, window: &OperatingWindow) -> NaiveDate {
    let local = instant.with_timezone(&window.tz);
    let date = local.date_naive();
    if window.wraps_midnight() && local.hour() < window.start_hour {
        date.pred_opt().unwrap_or(date)
    } else {
        date
    }
}

/// `business_date` applied to now.
pub fn business_today(window: &OperatingWindow) -> NaiveDate {
    business_date(Utc::now(), window)
}

/// Business date of an RFC3339 timestamp string, or `None` if unparseable.
/// Aggregation callers degrade on `None` rather than failing.
pub fn business_date_of(ts: &str, window: &OperatingWindow) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| business_date(dt.with_timezone(&Utc), window))
}

/// Resolve a local date + hour in the business timezone to an instant,
/// handling DST gaps.
///
/// During a spring-forward gap `earliest()` returns `None`; we fall back to
/// `latest()` (the post-transition instant), and as a last resort use UTC.
pub fn resolve_local_datetime(tz: &Tz, date: NaiveDate, hour: u32) -> DateTime<Utc> {
    if let Some(dt) = tz
        .with_ymd_and_hms(date.year(), date.month(), date.day(), hour, 0, 0)
        .single()
    {
        return dt.with_timezone(&Utc);
    }

    let naive = chrono::NaiveDateTime::new(
        date,
        chrono::NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(chrono::NaiveTime::MIN),
    );

    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt.with_timezone(&Utc);
    }

    if let Some(dt) = tz.from_local_datetime(&naive).latest() {
        log::warn!(
            "DST gap detected for {} {:02}:00 in {}; using post-transition time",
            date,
            hour,
            tz
        );
        return dt.with_timezone(&Utc);
    }

    log::warn!(
        "Could not resolve local datetime {} {:02}:00 in {}; falling back to UTC",
        date,
        hour,
        tz
    );
    Utc.with_ymd_and_hms(date.year(), date.month(), date.day(), hour, 0, 0)
        .single()
        .expect("UTC datetime is always unambiguous")
}
