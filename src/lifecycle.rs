//! Booking lifecycle state machine.
//!
//! `pending → confirmed → completed`, with `cancelled` reachable from
//! `pending` or `confirmed` and restorable back to `pending`. Deletion is an
//! explicit operator override from any state and is unrecoverable.
//!
//! Every transition is guard → validate → one conditional write. The write
//! carries the observed status in its WHERE clause, so a transition whose
//! state moved underneath it applies nothing and surfaces as
//! `ConcurrentModification` after a re-fetch. The engine never retries.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::db::{BookingDb, DbBooking};
use crate::error::EngineError;
use crate::types::{BookingEdit, BookingStatus, NewBooking, TipRecipient};

fn fetch(db: &BookingDb, id: &str) -> Result<DbBooking, EngineError> {
    db.get_booking(id)?
        .ok_or_else(|| EngineError::NotFound(format!("booking {id}")))
}

fn status_of(booking: &DbBooking) -> Result<BookingStatus, EngineError> {
    BookingStatus::parse(&booking.status).ok_or_else(|| {
        EngineError::Validation(format!(
            "booking {} has unrecognized status '{}'",
            booking.id, booking.status
        ))
    })
}

/// A conditional write applied nothing: the row changed between the guard
/// and the write, or vanished entirely.
fn lost_race(db: &BookingDb, id: &str) -> EngineError {
    match db.get_booking(id) {
        Ok(Some(_)) => EngineError::ConcurrentModification,
        Ok(None) => EngineError::NotFound(format!("booking {id}")),
        Err(e) => e.into(),
    }
}

fn validate_date_time(date: &str, time: &str) -> Result<(), EngineError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| EngineError::Validation(format!("invalid booking date '{date}'")))?;
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| EngineError::Validation(format!("invalid booking time '{time}'")))?;
    Ok(())
}

/// At least one of {registered requester, guest contact bundle} must resolve
/// to a display name.
fn validate_requester(
    db: &BookingDb,
    requester_user_id: Option<&str>,
    guest_name: Option<&str>,
) -> Result<(), EngineError> {
    if let Some(user_id) = requester_user_id {
        if db.get_profile(user_id)?.is_none() {
            return Err(EngineError::Validation(format!(
                "requester account '{user_id}' does not exist"
            )));
        }
        return Ok(());
    }
    match guest_name {
        Some(name) if !name.trim().is_empty() => Ok(()),
        _ => Err(EngineError::Validation(
            "booking needs a registered requester or a guest name".to_string(),
        )),
    }
}

fn validate_tip(amount: f64, recipient: Option<&str>) -> Result<(), EngineError> {
    if amount < 0.0 {
        return Err(EngineError::Validation(
            "tip amount cannot be negative".to_string(),
        ));
    }
    if amount > 0.0 && recipient.is_none() {
        return Err(EngineError::Validation(
            "a tip requires a recipient".to_string(),
        ));
    }
    if amount == 0.0 && recipient.is_some() {
        return Err(EngineError::Validation(
            "tip recipient must be empty when no tip was captured".to_string(),
        ));
    }
    Ok(())
}

/// Create a booking (public flow or admin manual entry). Starts `pending`.
pub fn create_booking(db: &BookingDb, new: NewBooking) -> Result<DbBooking, EngineError> {
    validate_requester(db, new.requester_user_id.as_deref(), new.guest_name.as_deref())?;
    validate_date_time(&new.booking_date, &new.booking_time)?;

    let booking = DbBooking {
        id: Uuid::new_v4().to_string(),
        requester_user_id: new.requester_user_id,
        guest_name: new.guest_name,
        guest_email: new.guest_email,
        guest_phone: new.guest_phone,
        service_id: new.service_id,
        therapist_id: new.therapist_id,
        booking_date: new.booking_date,
        booking_time: new.booking_time,
        status: BookingStatus::Pending.as_str().to_string(),
        completed_at: None,
        tip_amount: 0.0,
        tip_recipient: None,
        visitor_token: new.visitor_token,
        created_at: Utc::now().to_rfc3339(),
    };
    db.insert_booking(&booking)?;
    log::debug!("booking {} created ({})", booking.id, booking.booking_date);
    Ok(booking)
}

/// `pending → confirmed`. A therapist must be resolvable: either supplied
/// here or already assigned; otherwise nothing is written.
pub fn confirm(
    db: &BookingDb,
    id: &str,
    therapist_id: Option<&str>,
) -> Result<DbBooking, EngineError> {
    let booking = fetch(db, id)?;
    let from = status_of(&booking)?;
    if from != BookingStatus::Pending {
        return Err(EngineError::InvalidTransition { action: "confirm", from });
    }

    let therapist = match therapist_id.or(booking.therapist_id.as_deref()) {
        Some(t) => t.to_string(),
        None => {
            return Err(EngineError::Validation(
                "a therapist must be assigned before confirming".to_string(),
            ))
        }
    };

    if !db.confirm_if_pending(id, &therapist)? {
        return Err(lost_race(db, id));
    }
    fetch(db, id)
}

/// `confirmed → completed` against a snapshot the caller already holds.
///
/// The conditional write is guarded on the snapshot's status, so a booking
/// another operator moved in the meantime yields `ConcurrentModification`
/// rather than a silent double-completion.
pub fn complete_observed(
    db: &BookingDb,
    observed: &DbBooking,
    completed_at: Option<DateTime<Utc>>,
    tip_amount: f64,
    tip_recipient: Option<TipRecipient>,
) -> Result<DbBooking, EngineError> {
    let from = status_of(observed)?;
    if from != BookingStatus::Confirmed {
        return Err(EngineError::InvalidTransition { action: "complete", from });
    }

    // Completion requires operator confirmation of the actual end time; the
    // live path never defaults it. (The manual-correction path in `edit`
    // does — see there.)
    let completed_at = completed_at.ok_or_else(|| {
        EngineError::Validation("completion time must be supplied by the operator".to_string())
    })?;

    let recipient = tip_recipient.map(|r| r.as_str());
    validate_tip(tip_amount, recipient)?;

    if !db.complete_if_confirmed(
        &observed.id,
        &completed_at.to_rfc3339(),
        tip_amount,
        recipient,
    )? {
        return Err(lost_race(db, &observed.id));
    }
    fetch(db, &observed.id)
}

/// `confirmed → completed`, fetching the current row first.
pub fn complete(
    db: &BookingDb,
    id: &str,
    completed_at: Option<DateTime<Utc>>,
    tip_amount: f64,
    tip_recipient: Option<TipRecipient>,
) -> Result<DbBooking, EngineError> {
    let booking = fetch(db, id)?;
    complete_observed(db, &booking, completed_at, tip_amount, tip_recipient)
}

/// `pending|confirmed → cancelled`. Keeps the therapist assignment so a
/// later restore remembers it.
pub fn cancel(db: &BookingDb, id: &str) -> Result<DbBooking, EngineError> {
    let booking = fetch(db, id)?;
    let from = status_of(&booking)?;
    if !matches!(from, BookingStatus::Pending | BookingStatus::Confirmed) {
        return Err(EngineError::InvalidTransition { action: "cancel", from });
    }

    if !db.set_status_if(id, from.as_str(), BookingStatus::Cancelled.as_str())? {
        return Err(lost_race(db, id));
    }
    fetch(db, id)
}

/// `cancelled → pending`.
pub fn restore(db: &BookingDb, id: &str) -> Result<DbBooking, EngineError> {
    let booking = fetch(db, id)?;
    let from = status_of(&booking)?;
    if from != BookingStatus::Cancelled {
        return Err(EngineError::InvalidTransition { action: "restore", from });
    }

    if !db.set_status_if(id, from.as_str(), BookingStatus::Pending.as_str())? {
        return Err(lost_race(db, id));
    }
    fetch(db, id)
}

/// Permanently remove a booking, from any state. Irreversible — callers must
/// obtain explicit confirmation before invoking.
pub fn delete(db: &BookingDb, id: &str) -> Result<(), EngineError> {
    if !db.delete_booking(id)? {
        return Err(EngineError::NotFound(format!("booking {id}")));
    }
    log::debug!("booking {id} deleted");
    Ok(())
}

/// Edit a non-deleted booking: contact info, service, therapist, date/time,
/// and — as a side channel — status.
///
/// Deliberate asymmetry: when the edited status lands on `completed` with no
/// completion time on record, the current instant is stamped. This is a
/// manual correction of history, not a live completion event, so unlike
/// `complete` it does not demand an operator-supplied time. An edit that
/// moves a booking *out* of `completed` clears the completion timestamp and
/// gratuity fields.
pub fn edit(db: &BookingDb, id: &str, changes: BookingEdit) -> Result<DbBooking, EngineError> {
    let original = fetch(db, id)?;
    let original_status = status_of(&original)?;

    let mut updated = original.clone();
    if let Some(name) = changes.guest_name {
        updated.guest_name = Some(name);
    }
    if let Some(email) = changes.guest_email {
        updated.guest_email = Some(email);
    }
    if let Some(phone) = changes.guest_phone {
        updated.guest_phone = Some(phone);
    }
    if let Some(service_id) = changes.service_id {
        updated.service_id = service_id;
    }
    if let Some(therapist_id) = changes.therapist_id {
        updated.therapist_id = Some(therapist_id);
    }
    if let Some(date) = changes.booking_date {
        updated.booking_date = date;
    }
    if let Some(time) = changes.booking_time {
        updated.booking_time = time;
    }

    if let Some(new_status) = changes.status {
        updated.status = new_status.as_str().to_string();
        if new_status == BookingStatus::Completed {
            if updated.completed_at.is_none() {
                updated.completed_at = Some(Utc::now().to_rfc3339());
            }
        } else {
            updated.completed_at = None;
            updated.tip_amount = 0.0;
            updated.tip_recipient = None;
        }
    }

    let new_status = status_of(&updated)?;
    validate_requester(db, updated.requester_user_id.as_deref(), updated.guest_name.as_deref())?;
    validate_date_time(&updated.booking_date, &updated.booking_time)?;
    validate_tip(updated.tip_amount, updated.tip_recipient.as_deref())?;
    if new_status != BookingStatus::Pending && updated.therapist_id.is_none() {
        return Err(EngineError::Validation(format!(
            "a booking cannot be '{new_status}' without an assigned therapist"
        )));
    }

    if !db.update_booking_if_status(&updated, original_status.as_str())? {
        return Err(lost_race(db, id));
    }
    fetch(db, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::db::DbProfile;
    use chrono::TimeZone;

    fn guest_booking(db: &BookingDb) -> DbBooking {
        create_booking(
            db,
            NewBooking {
                guest_name: Some("Mara Lindqvist".to_string()),
                guest_email: Some("mara@example.com".to_string()),
                service_id: "svc-swedish".to_string(),
                booking_date: "2026-03-05".to_string(),
                booking_time: "18:30".to_string(),
                visitor_token: Some("tok-9f2a".to_string()),
                ..NewBooking::default()
            },
        )
        .expect("create booking")
    }

    fn completion_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 6, 4, 30, 0).unwrap()
    }

    #[test]
    fn test_create_requires_resolvable_requester() {
        let db = test_db();

        let err = create_booking(
            &db,
            NewBooking {
                service_id: "svc-swedish".to_string(),
                booking_date: "2026-03-05".to_string(),
                booking_time: "18:30".to_string(),
                ..NewBooking::default()
            },
        )
        .expect_err("no requester at all");
        assert!(matches!(err, EngineError::Validation(_)));

        // Registered requester must reference an existing profile.
        let err = create_booking(
            &db,
            NewBooking {
                requester_user_id: Some("u-ghost".to_string()),
                service_id: "svc-swedish".to_string(),
                booking_date: "2026-03-05".to_string(),
                booking_time: "18:30".to_string(),
                ..NewBooking::default()
            },
        )
        .expect_err("unknown account");
        assert!(matches!(err, EngineError::Validation(_)));

        db.upsert_profile(&DbProfile {
            id: "u1".to_string(),
            email: "jo@example.com".to_string(),
            full_name: "Jo Park".to_string(),
            role: "customer".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        })
        .expect("profile");
        let booking = create_booking(
            &db,
            NewBooking {
                requester_user_id: Some("u1".to_string()),
                service_id: "svc-swedish".to_string(),
                booking_date: "2026-03-05".to_string(),
                booking_time: "18:30".to_string(),
                ..NewBooking::default()
            },
        )
        .expect("registered requester");
        assert_eq!(booking.status, "pending");
    }

    #[test]
    fn test_confirm_requires_therapist() {
        let db = test_db();
        let booking = guest_booking(&db);

        let err = confirm(&db, &booking.id, None).expect_err("no therapist anywhere");
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(db.get_booking(&booking.id).unwrap().unwrap().status, "pending");

        let confirmed = confirm(&db, &booking.id, Some("th-1")).expect("confirm");
        assert_eq!(confirmed.status, "confirmed");
        assert_eq!(confirmed.therapist_id.as_deref(), Some("th-1"));

        let err = confirm(&db, &booking.id, Some("th-2")).expect_err("already confirmed");
        assert!(matches!(
            err,
            EngineError::InvalidTransition { action: "confirm", from: BookingStatus::Confirmed }
        ));
    }

    #[test]
    fn test_complete_only_from_confirmed() {
        let db = test_db();
        let booking = guest_booking(&db);

        // From pending
        let err = complete(&db, &booking.id, Some(completion_time()), 0.0, None)
            .expect_err("pending cannot complete");
        assert!(matches!(
            err,
            EngineError::InvalidTransition { action: "complete", from: BookingStatus::Pending }
        ));
        assert_eq!(db.get_booking(&booking.id).unwrap().unwrap().status, "pending");

        // From cancelled
        cancel(&db, &booking.id).expect("cancel");
        let err = complete(&db, &booking.id, Some(completion_time()), 0.0, None)
            .expect_err("cancelled cannot complete");
        assert!(matches!(err, EngineError::InvalidTransition { .. }));

        // From completed
        restore(&db, &booking.id).expect("restore");
        confirm(&db, &booking.id, Some("th-1")).expect("confirm");
        complete(&db, &booking.id, Some(completion_time()), 0.0, None).expect("complete");
        let err = complete(&db, &booking.id, Some(completion_time()), 0.0, None)
            .expect_err("completed is terminal");
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_complete_never_defaults_the_time() {
        let db = test_db();
        let booking = guest_booking(&db);
        confirm(&db, &booking.id, Some("th-1")).expect("confirm");

        let err = complete(&db, &booking.id, None, 0.0, None).expect_err("no time supplied");
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(db.get_booking(&booking.id).unwrap().unwrap().status, "confirmed");
    }

    #[test]
    fn test_tip_validation() {
        let db = test_db();
        let booking = guest_booking(&db);
        confirm(&db, &booking.id, Some("th-1")).expect("confirm");

        let err = complete(&db, &booking.id, Some(completion_time()), 25.0, None)
            .expect_err("tip without recipient");
        assert!(matches!(err, EngineError::Validation(_)));

        let err = complete(
            &db,
            &booking.id,
            Some(completion_time()),
            0.0,
            Some(TipRecipient::Therapist),
        )
        .expect_err("recipient without tip");
        assert!(matches!(err, EngineError::Validation(_)));

        let done = complete(
            &db,
            &booking.id,
            Some(completion_time()),
            25.0,
            Some(TipRecipient::Therapist),
        )
        .expect("complete with tip");
        assert_eq!(done.tip_amount, 25.0);
        assert_eq!(done.tip_recipient.as_deref(), Some("therapist"));
    }

    #[test]
    fn test_cancel_then_restore_keeps_assignment() {
        let db = test_db();
        let booking = guest_booking(&db);
        confirm(&db, &booking.id, Some("th-1")).expect("confirm");

        let cancelled = cancel(&db, &booking.id).expect("cancel");
        assert_eq!(cancelled.status, "cancelled");
        assert_eq!(cancelled.therapist_id.as_deref(), Some("th-1"));

        let restored = restore(&db, &booking.id).expect("restore");
        assert_eq!(restored.status, "pending");
        assert_eq!(restored.therapist_id.as_deref(), Some("th-1"));
        assert_eq!(restored.tip_amount, 0.0);
        assert!(restored.tip_recipient.is_none());
        assert!(restored.completed_at.is_none());

        let err = restore(&db, &booking.id).expect_err("restore needs cancelled");
        assert!(matches!(
            err,
            EngineError::InvalidTransition { action: "restore", from: BookingStatus::Pending }
        ));
    }

    #[test]
    fn test_concurrent_complete_has_one_winner() {
        let db = test_db();
        let booking = guest_booking(&db);
        confirm(&db, &booking.id, Some("th-1")).expect("confirm");

        // Two operators fetch the same confirmed snapshot.
        let snapshot_a = db.get_booking(&booking.id).unwrap().unwrap();
        let snapshot_b = snapshot_a.clone();

        let first = complete_observed(&db, &snapshot_a, Some(completion_time()), 0.0, None);
        assert!(first.is_ok());

        let second = complete_observed(&db, &snapshot_b, Some(completion_time()), 0.0, None);
        assert!(matches!(second, Err(EngineError::ConcurrentModification)));
    }

    #[test]
    fn test_delete_from_any_state_is_terminal() {
        let db = test_db();
        let booking = guest_booking(&db);
        confirm(&db, &booking.id, Some("th-1")).expect("confirm");

        delete(&db, &booking.id).expect("delete");
        let err = delete(&db, &booking.id).expect_err("already gone");
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_edit_into_completed_stamps_now() {
        let db = test_db();
        let booking = guest_booking(&db);
        confirm(&db, &booking.id, Some("th-1")).expect("confirm");

        let edited = edit(
            &db,
            &booking.id,
            BookingEdit {
                status: Some(BookingStatus::Completed),
                ..BookingEdit::default()
            },
        )
        .expect("edit to completed");
        assert_eq!(edited.status, "completed");
        let stamped = edited.completed_at.expect("completion time stamped");
        assert!(DateTime::parse_from_rfc3339(&stamped).is_ok());
    }

    #[test]
    fn test_edit_out_of_completed_clears_completion_fields() {
        let db = test_db();
        let booking = guest_booking(&db);
        confirm(&db, &booking.id, Some("th-1")).expect("confirm");
        complete(
            &db,
            &booking.id,
            Some(completion_time()),
            20.0,
            Some(TipRecipient::Management),
        )
        .expect("complete");

        let edited = edit(
            &db,
            &booking.id,
            BookingEdit {
                status: Some(BookingStatus::Cancelled),
                ..BookingEdit::default()
            },
        )
        .expect("edit to cancelled");
        assert_eq!(edited.status, "cancelled");
        assert!(edited.completed_at.is_none());
        assert_eq!(edited.tip_amount, 0.0);
        assert!(edited.tip_recipient.is_none());
    }

    #[test]
    fn test_edit_rejects_confirmed_without_therapist() {
        let db = test_db();
        let booking = guest_booking(&db);

        let err = edit(
            &db,
            &booking.id,
            BookingEdit {
                status: Some(BookingStatus::Confirmed),
                ..BookingEdit::default()
            },
        )
        .expect_err("no therapist assigned");
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_edit_updates_contact_and_schedule() {
        let db = test_db();
        let booking = guest_booking(&db);

        let edited = edit(
            &db,
            &booking.id,
            BookingEdit {
                guest_phone: Some("+1-555-0142".to_string()),
                booking_date: Some("2026-03-07".to_string()),
                booking_time: Some("20:00".to_string()),
                ..BookingEdit::default()
            },
        )
        .expect("edit");
        assert_eq!(edited.guest_phone.as_deref(), Some("+1-555-0142"));
        assert_eq!(edited.booking_date, "2026-03-07");

        let err = edit(
            &db,
            &booking.id,
            BookingEdit {
                booking_date: Some("March 7th".to_string()),
                ..BookingEdit::default()
            },
        )
        .expect_err("malformed date");
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
