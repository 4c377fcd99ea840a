//! Booking & client intelligence engine for a spa operations platform.
//!
//! This crate is the non-presentational core behind the booking surface,
//! therapist portal, and admin console: the booking lifecycle state machine
//! (`lifecycle`), cross-identity client resolution (`resolver`), and
//! timezone- and business-day-aware revenue aggregation (`revenue`), all
//! reading through one "business day" clock (`business_day`).
//!
//! The engine is stateless between calls: each operation reads a snapshot
//! from the SQLite store (`db`), computes, and issues at most one
//! persistence write. Status transitions are conditional writes so
//! concurrent operators cannot both move the same booking; see `lifecycle`
//! for the race semantics. It is a library boundary only — no CLI, no wire
//! format.

pub mod business_day;
pub mod db;
pub mod error;
pub mod feedback;
pub mod lifecycle;
mod migrations;
pub mod resolver;
pub mod revenue;
pub mod types;

pub use business_day::{business_date, business_today, OperatingWindow};
pub use error::EngineError;
pub use types::{
    BookingEdit, BookingStatus, Client, ClientFilter, ClientKind, ClientSort, NewBooking,
    RevenueReport, TipRecipient, WeekBucket, Window,
};
