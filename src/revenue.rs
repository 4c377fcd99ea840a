//! Windowed revenue and activity aggregation.
//!
//! Pure read computations over a point-in-time booking snapshot. Completed
//! revenue is windowed by the business date of completion; pending and lost
//! revenue by creation time. Money is earned on completion, but pipeline
//! health tracks when requests arrived, so the two deliberately use
//! different clocks.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::business_day::{business_date, business_date_of, OperatingWindow};
use crate::db::{DbBooking, DbProfile, DbService};
use crate::types::{
    BookingStatus, RevenueReport, ServiceBreakdown, TherapistBreakdown, WeekBucket, Window,
};

#[derive(Debug, Clone, Copy)]
struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// The immediately preceding range of identical length.
    fn previous(&self) -> DateRange {
        let end = self.start - Duration::days(1);
        DateRange {
            start: end - Duration::days(self.len_days() - 1),
            end,
        }
    }
}

/// Resolve a window to a closed business-date range. `None` means unbounded.
fn window_range(window: Window, today: NaiveDate) -> Option<DateRange> {
    match window {
        Window::TrailingDays(n) => {
            let days = n.max(1) as i64;
            Some(DateRange {
                start: today - Duration::days(days - 1),
                end: today,
            })
        }
        Window::CalendarMonth { year, month } => {
            // Callers reject invalid months before resolving, so these
            // constructions cannot fail; the fallback keeps this total.
            let start = NaiveDate::from_ymd_opt(year, month, 1)?;
            let end = if month == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(year, month + 1, 1)?
            } - Duration::days(1);
            Some(DateRange { start, end })
        }
        Window::AllTime => None,
    }
}

/// An invalid calendar month must never resolve: `window_range` returns
/// `None` for it, and `None` elsewhere means unbounded, which would turn a
/// malformed month into an all-time aggregation.
fn window_is_valid(window: Window) -> bool {
    match window {
        Window::CalendarMonth { year, month } => NaiveDate::from_ymd_opt(year, month, 1).is_some(),
        Window::TrailingDays(_) | Window::AllTime => true,
    }
}

fn in_range(date: Option<NaiveDate>, range: Option<DateRange>) -> bool {
    match (date, range) {
        (_, None) => date.is_some(),
        (Some(d), Some(r)) => r.contains(d),
        (None, Some(_)) => false,
    }
}

fn price_of(booking: &DbBooking, prices: &HashMap<&str, f64>) -> f64 {
    match prices.get(booking.service_id.as_str()) {
        Some(price) => *price,
        None => {
            log::warn!(
                "booking {} references unknown service {}; pricing at 0",
                booking.id,
                booking.service_id
            );
            0.0
        }
    }
}

/// Business date a completed booking's revenue lands on. `None` when the
/// completion timestamp is missing or unparseable (the booking is then
/// excluded from revenue rather than failing the aggregation).
fn completion_date(booking: &DbBooking, operating: &OperatingWindow) -> Option<NaiveDate> {
    booking
        .completed_at
        .as_deref()
        .and_then(|ts| business_date_of(ts, operating))
}

fn completed_revenue_in(
    bookings: &[DbBooking],
    prices: &HashMap<&str, f64>,
    range: Option<DateRange>,
    operating: &OperatingWindow,
) -> (f64, u32) {
    let mut revenue = 0.0;
    let mut count = 0;
    for booking in bookings {
        if BookingStatus::parse(&booking.status) != Some(BookingStatus::Completed) {
            continue;
        }
        if in_range(completion_date(booking, operating), range) {
            revenue += price_of(booking, prices);
            count += 1;
        }
    }
    (revenue, count)
}

/// Aggregate a booking snapshot into a `RevenueReport` for the given window.
///
/// `therapists` supplies display names for the per-therapist breakdown;
/// missing names fall back to the raw id. Never fails: missing prices and
/// malformed timestamps degrade to zero/absent.
pub fn aggregate(
    bookings: &[DbBooking],
    services: &[DbService],
    therapists: &[DbProfile],
    window: Window,
    now: DateTime<Utc>,
    operating: &OperatingWindow,
) -> RevenueReport {
    if !window_is_valid(window) {
        log::warn!("aggregation window {window:?} has no valid date range; returning empty report");
        return RevenueReport::default();
    }

    let prices: HashMap<&str, f64> = services.iter().map(|s| (s.id.as_str(), s.price)).collect();
    let service_names: HashMap<&str, &str> =
        services.iter().map(|s| (s.id.as_str(), s.name.as_str())).collect();
    let therapist_names: HashMap<&str, &str> =
        therapists.iter().map(|p| (p.id.as_str(), p.full_name.as_str())).collect();

    let today = business_date(now, operating);
    let range = window_range(window, today);

    let (total_revenue, completed_count) =
        completed_revenue_in(bookings, &prices, range, operating);

    let mut pending_revenue = 0.0;
    let mut lost_revenue = 0.0;
    let mut today_revenue = 0.0;
    let mut by_service: HashMap<&str, (u32, f64)> = HashMap::new();
    let mut by_therapist: HashMap<&str, (u32, f64)> = HashMap::new();

    for booking in bookings {
        let Some(status) = BookingStatus::parse(&booking.status) else {
            log::warn!(
                "booking {} has unrecognized status '{}'; skipped in aggregation",
                booking.id,
                booking.status
            );
            continue;
        };
        match status {
            BookingStatus::Pending | BookingStatus::Confirmed => {
                if in_range(business_date_of(&booking.created_at, operating), range) {
                    pending_revenue += price_of(booking, &prices);
                }
            }
            BookingStatus::Cancelled => {
                if in_range(business_date_of(&booking.created_at, operating), range) {
                    lost_revenue += price_of(booking, &prices);
                }
            }
            BookingStatus::Completed => {
                let completed_on = completion_date(booking, operating);
                if completed_on == Some(today) {
                    today_revenue += price_of(booking, &prices);
                }
                if in_range(completed_on, range) {
                    let price = price_of(booking, &prices);
                    let service = by_service.entry(booking.service_id.as_str()).or_default();
                    service.0 += 1;
                    service.1 += price;
                    if let Some(therapist_id) = booking.therapist_id.as_deref() {
                        let therapist = by_therapist.entry(therapist_id).or_default();
                        therapist.0 += 1;
                        therapist.1 += price;
                    }
                }
            }
        }
    }

    let trend_pct = range.and_then(|r| {
        let (previous, _) = completed_revenue_in(bookings, &prices, Some(r.previous()), operating);
        if previous == 0.0 {
            None
        } else {
            Some((total_revenue - previous) / previous * 100.0)
        }
    });

    let mut by_service: Vec<ServiceBreakdown> = by_service
        .into_iter()
        .map(|(id, (count, revenue))| ServiceBreakdown {
            service_id: id.to_string(),
            name: service_names.get(id).unwrap_or(&id).to_string(),
            count,
            revenue,
        })
        .collect();
    by_service.sort_by(|a, b| {
        b.revenue
            .partial_cmp(&a.revenue)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut by_therapist: Vec<TherapistBreakdown> = by_therapist
        .into_iter()
        .map(|(id, (count, revenue))| TherapistBreakdown {
            therapist_id: id.to_string(),
            name: therapist_names.get(id).unwrap_or(&id).to_string(),
            count,
            revenue,
        })
        .collect();
    by_therapist.sort_by(|a, b| {
        b.revenue
            .partial_cmp(&a.revenue)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });

    let average_booking_value = if completed_count > 0 {
        total_revenue / completed_count as f64
    } else {
        0.0
    };

    RevenueReport {
        total_revenue,
        pending_revenue,
        lost_revenue,
        completed_count,
        average_booking_value,
        trend_pct,
        today_revenue,
        by_service,
        by_therapist,
    }
}

/// Bucket completed bookings' scheduled dates into `weeks` fixed 7-day
/// windows counted back from now, oldest first. Buckets with zero bookings
/// are still emitted so chart axes stay contiguous.
pub fn weekly_series(
    bookings: &[DbBooking],
    weeks: u32,
    now: DateTime<Utc>,
    operating: &OperatingWindow,
) -> Vec<WeekBucket> {
    let today = business_date(now, operating);
    let mut buckets: Vec<WeekBucket> = (0..weeks)
        .rev()
        .map(|back| WeekBucket {
            week_start: today - Duration::days(7 * back as i64 + 6),
            count: 0,
        })
        .collect();

    for booking in bookings {
        if BookingStatus::parse(&booking.status) != Some(BookingStatus::Completed) {
            continue;
        }
        let Ok(scheduled) = NaiveDate::parse_from_str(&booking.booking_date, "%Y-%m-%d") else {
            log::warn!(
                "booking {} has unparseable booking_date '{}'; skipped in series",
                booking.id,
                booking.booking_date
            );
            continue;
        };
        for bucket in buckets.iter_mut() {
            let end = bucket.week_start + Duration::days(6);
            if scheduled >= bucket.week_start && scheduled <= end {
                bucket.count += 1;
                break;
            }
        }
    }

    buckets
}
