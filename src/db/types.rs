//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

/// A row from the `bookings` table.
///
/// Timestamps (`created_at`, `completed_at`) are RFC3339 UTC strings;
/// `booking_date` is `YYYY-MM-DD` and `booking_time` is `HH:MM` in the
/// business timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbBooking {
    pub id: String,
    /// Registered account reference. A booking may carry this, a guest
    /// contact bundle, or both; at least one must resolve to a display name.
    pub requester_user_id: Option<String>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub service_id: String,
    pub therapist_id: Option<String>,
    pub booking_date: String,
    pub booking_time: String,
    pub status: String,
    pub completed_at: Option<String>,
    pub tip_amount: f64,
    pub tip_recipient: Option<String>,
    /// Anonymous-visitor correlation token from the public booking flow.
    pub visitor_token: Option<String>,
    pub created_at: String,
}

/// A row from the `profiles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbProfile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    /// `customer`, `therapist`, or `admin`.
    pub role: String,
    pub created_at: String,
}

/// A row from the `visitors` table — one per anonymous correlation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbVisitor {
    pub visitor_token: String,
    /// Set when an account was later registered from this device.
    pub user_id: Option<String>,
    pub first_visit: String,
    pub last_visit: String,
    pub visit_count: i64,
}

/// A row from the `client_devices` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDevice {
    pub id: String,
    pub user_id: Option<String>,
    pub visitor_token: Option<String>,
    pub device_model: String,
    pub os_name: String,
    pub os_version: String,
    pub browser: String,
    pub browser_version: String,
    pub device_type: String,
    pub first_seen: String,
    pub last_seen: String,
    pub session_count: i64,
}

/// A row from the `services` catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbService {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub duration_minutes: i64,
    pub active: bool,
}

/// A row from the `therapist_feedback` table — at most one per booking,
/// editable at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbFeedback {
    pub id: String,
    pub booking_id: String,
    pub therapist_id: String,
    pub rating: i64,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_rating: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<String>,
    pub edit_count: i64,
}
