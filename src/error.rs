//! Error types for booking engine operations.
//!
//! Errors are classified by what the caller should do next:
//! - Correctable: invalid transition or input — fix the request and resubmit
//! - Refresh: lost a conditional-write race — re-fetch, then decide
//! - Persistence: the store rejected or was unreachable — surface, don't retry here

use thiserror::Error;

use crate::db::DbError;
use crate::types::BookingStatus;

/// Error taxonomy for engine operations. Every mutation failure leaves the
/// stored record untouched.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid transition: cannot {action} a booking in state '{from}'")]
    InvalidTransition {
        action: &'static str,
        from: BookingStatus,
    },

    /// A conditional write observed a state that no longer matched. The
    /// caller must re-fetch; the engine never retries blindly.
    #[error("Booking was modified concurrently; re-fetch and retry the operation")]
    ConcurrentModification,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Db(#[from] DbError),
}

impl EngineError {
    /// True when the caller can correct the request and resubmit as-is.
    pub fn is_correctable(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidTransition { .. } | EngineError::Validation(_)
        )
    }

    /// True when the caller must re-fetch current state before acting again.
    pub fn requires_refresh(&self) -> bool {
        matches!(self, EngineError::ConcurrentModification)
    }
}
