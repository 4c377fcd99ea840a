//! Domain and derived types shared across the engine.
//!
//! Persisted row shapes live in `db::types`; this module holds the typed
//! vocabulary the engine's operations speak — booking statuses, tip
//! recipients, resolver output, and aggregation reports.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::DbDevice;

/// Booking lifecycle states.
///
/// `pending → confirmed → completed`, with `cancelled` reachable from
/// `pending` or `confirmed` and restorable back to `pending`. Deletion is a
/// hard removal, not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a captured gratuity is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipRecipient {
    Management,
    Therapist,
}

impl TipRecipient {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Management => "management",
            Self::Therapist => "therapist",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "management" => Some(Self::Management),
            "therapist" => Some(Self::Therapist),
            _ => None,
        }
    }
}

/// Input for creating a booking, from the public flow or admin manual entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_phone: Option<String>,
    pub service_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therapist_id: Option<String>,
    /// `YYYY-MM-DD` in the business timezone.
    pub booking_date: String,
    /// `HH:MM` in the business timezone.
    pub booking_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_token: Option<String>,
}

/// Field-level edit to an existing booking. `None` leaves a field unchanged.
///
/// `status` is a side channel: an edit may correct a booking's state outside
/// the live transition flow (see `lifecycle::edit`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therapist_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
}

/// Whether a resolved client is backed by a registered account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    Registered,
    Unregistered,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Unregistered => "unregistered",
        }
    }
}

/// A resolver-synthesized view of one distinguishable person.
///
/// Not persisted — recomputed on demand from bookings, profiles, visitors,
/// and devices. `key` is the account id for registered clients and the
/// anonymous correlation token for unregistered ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub kind: ClientKind,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub booking_count: u32,
    /// Ids of this client's bookings, ascending.
    pub booking_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_booking_at: Option<String>,
    /// Max of visitor/device last-seen, latest booking creation, and (for
    /// registered clients) account creation. RFC3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<String>,
    /// Devices whose identity key (user id or token) matches this client.
    pub devices: Vec<DbDevice>,
}

/// Presentation-layer filter over resolved clients.
#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    pub kind: Option<ClientKind>,
    /// Case-insensitive free-text match over name/email/phone/identity key.
    pub query: Option<String>,
}

/// Stable sort orders for resolved clients. Ties always break by identity
/// key ascending so output is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientSort {
    LastActiveDesc,
    BookingCountDesc,
    NameAsc,
}

/// An aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// The last N business dates, ending today.
    TrailingDays(u32),
    /// An explicit calendar month in the business timezone.
    CalendarMonth { year: i32, month: u32 },
    /// No bounds.
    AllTime,
}

/// Per-service slice of completed revenue within a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBreakdown {
    pub service_id: String,
    pub name: String,
    pub count: u32,
    pub revenue: f64,
}

/// Per-therapist slice of completed revenue within a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TherapistBreakdown {
    pub therapist_id: String,
    pub name: String,
    pub count: u32,
    pub revenue: f64,
}

/// Windowed revenue and pipeline statistics.
///
/// Completed revenue is windowed by the **business date of completion**;
/// pending and lost revenue by creation time — money is earned on
/// completion, but pipeline health tracks when requests arrived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueReport {
    pub total_revenue: f64,
    pub pending_revenue: f64,
    pub lost_revenue: f64,
    pub completed_count: u32,
    pub average_booking_value: f64,
    /// Percent change of completed revenue vs. the immediately preceding
    /// window of identical length. `None` for unbounded windows or a zero
    /// baseline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_pct: Option<f64>,
    /// Completed revenue whose completion business date is today's.
    pub today_revenue: f64,
    pub by_service: Vec<ServiceBreakdown>,
    pub by_therapist: Vec<TherapistBreakdown>,
}

/// One fixed-width bucket of a chart series. Buckets with zero bookings are
/// emitted with `count = 0` so chart axes stay contiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekBucket {
    pub week_start: NaiveDate,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("deleted"), None);
    }

    #[test]
    fn test_tip_recipient_parse() {
        assert_eq!(TipRecipient::parse("management"), Some(TipRecipient::Management));
        assert_eq!(TipRecipient::parse("therapist"), Some(TipRecipient::Therapist));
        assert_eq!(TipRecipient::parse(""), None);
    }
}
