//! Post-completion feedback.
//!
//! One review per completed booking, editable at most once. The single
//! allowed edit stashes the prior rating/comment so the original opinion is
//! never lost.

use chrono::Utc;
use uuid::Uuid;

use crate::db::{BookingDb, DbError, DbFeedback};
use crate::error::EngineError;
use crate::types::BookingStatus;

fn validate_rating(rating: i64) -> Result<(), EngineError> {
    if !(1..=5).contains(&rating) {
        return Err(EngineError::Validation(format!(
            "rating must be between 1 and 5, got {rating}"
        )));
    }
    Ok(())
}

/// Submit a review for a completed booking.
pub fn submit_review(
    db: &BookingDb,
    booking_id: &str,
    therapist_id: &str,
    rating: i64,
    comment: &str,
) -> Result<DbFeedback, EngineError> {
    validate_rating(rating)?;

    let booking = db
        .get_booking(booking_id)?
        .ok_or_else(|| EngineError::NotFound(format!("booking {booking_id}")))?;
    if BookingStatus::parse(&booking.status) != Some(BookingStatus::Completed) {
        return Err(EngineError::Validation(format!(
            "feedback is only accepted for completed bookings (booking is '{}')",
            booking.status
        )));
    }
    if db.get_feedback_for_booking(booking_id)?.is_some() {
        return Err(EngineError::Validation(format!(
            "booking {booking_id} already has feedback"
        )));
    }

    let feedback = DbFeedback {
        id: Uuid::new_v4().to_string(),
        booking_id: booking_id.to_string(),
        therapist_id: therapist_id.to_string(),
        rating,
        comment: comment.to_string(),
        previous_rating: None,
        previous_comment: None,
        edited_at: None,
        edit_count: 0,
    };
    insert_sole_review(db, &feedback)?;
    Ok(feedback)
}

/// Insert a review, letting the UNIQUE(booking_id) constraint arbitrate
/// races. The pre-read in `submit_review` gives the friendly duplicate
/// message; a submission that slips past it loses here instead of
/// surfacing a raw database error.
fn insert_sole_review(db: &BookingDb, feedback: &DbFeedback) -> Result<(), EngineError> {
    match db.insert_feedback(feedback) {
        Ok(()) => Ok(()),
        Err(DbError::Sqlite(rusqlite::Error::SqliteFailure(e, _)))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(EngineError::ConcurrentModification)
        }
        Err(e) => Err(e.into()),
    }
}

/// Apply the single allowed edit to a review.
pub fn edit_review(
    db: &BookingDb,
    review_id: &str,
    rating: i64,
    comment: &str,
) -> Result<DbFeedback, EngineError> {
    validate_rating(rating)?;

    let existing = db
        .get_feedback(review_id)?
        .ok_or_else(|| EngineError::NotFound(format!("review {review_id}")))?;
    if existing.edit_count > 0 {
        return Err(EngineError::Validation(
            "a review can only be edited once".to_string(),
        ));
    }

    // Guarded on edit_count = 0, so a racing second edit loses cleanly.
    if !db.apply_feedback_edit(review_id, rating, comment, &Utc::now().to_rfc3339())? {
        return Err(EngineError::ConcurrentModification);
    }
    db.get_feedback(review_id)?
        .ok_or_else(|| EngineError::NotFound(format!("review {review_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::lifecycle;
    use crate::types::NewBooking;
    use chrono::TimeZone;

    fn completed_booking(db: &BookingDb) -> String {
        let booking = lifecycle::create_booking(
            db,
            NewBooking {
                guest_name: Some("Mara Lindqvist".to_string()),
                service_id: "svc-swedish".to_string(),
                booking_date: "2026-03-05".to_string(),
                booking_time: "18:30".to_string(),
                ..NewBooking::default()
            },
        )
        .expect("create");
        lifecycle::confirm(db, &booking.id, Some("th-1")).expect("confirm");
        lifecycle::complete(
            db,
            &booking.id,
            Some(Utc.with_ymd_and_hms(2026, 3, 6, 4, 0, 0).unwrap()),
            0.0,
            None,
        )
        .expect("complete");
        booking.id
    }

    #[test]
    fn test_review_requires_completed_booking() {
        let db = test_db();
        let booking = lifecycle::create_booking(
            &db,
            NewBooking {
                guest_name: Some("Mara".to_string()),
                service_id: "svc-swedish".to_string(),
                booking_date: "2026-03-05".to_string(),
                booking_time: "18:30".to_string(),
                ..NewBooking::default()
            },
        )
        .expect("create");

        let err = submit_review(&db, &booking.id, "th-1", 5, "Lovely").expect_err("not completed");
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_one_review_per_booking() {
        let db = test_db();
        let booking_id = completed_booking(&db);

        submit_review(&db, &booking_id, "th-1", 5, "Lovely").expect("first review");
        let err = submit_review(&db, &booking_id, "th-1", 4, "Again").expect_err("duplicate");
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_racing_duplicate_loses_at_the_constraint() {
        let db = test_db();
        let booking_id = completed_booking(&db);
        let review = submit_review(&db, &booking_id, "th-1", 5, "Lovely").expect("first review");

        // A submission that raced past the pre-read hits the UNIQUE
        // constraint and must come back typed, not as a database error.
        let racer = DbFeedback {
            id: Uuid::new_v4().to_string(),
            rating: 4,
            comment: "Again".to_string(),
            ..review
        };
        let err = insert_sole_review(&db, &racer).expect_err("duplicate insert");
        assert!(matches!(err, EngineError::ConcurrentModification));
    }

    #[test]
    fn test_rating_bounds() {
        let db = test_db();
        let booking_id = completed_booking(&db);

        assert!(matches!(
            submit_review(&db, &booking_id, "th-1", 0, ""),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            submit_review(&db, &booking_id, "th-1", 6, ""),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_single_edit_keeps_history() {
        let db = test_db();
        let booking_id = completed_booking(&db);
        let review = submit_review(&db, &booking_id, "th-1", 5, "Wonderful").expect("review");

        let edited = edit_review(&db, &review.id, 4, "Still good, bit rushed").expect("edit");
        assert_eq!(edited.rating, 4);
        assert_eq!(edited.previous_rating, Some(5));
        assert_eq!(edited.previous_comment.as_deref(), Some("Wonderful"));
        assert!(edited.edited_at.is_some());
        assert_eq!(edited.edit_count, 1);

        let err = edit_review(&db, &review.id, 3, "Third thoughts").expect_err("second edit");
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
