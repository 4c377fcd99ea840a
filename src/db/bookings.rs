use rusqlite::params;

use super::*;

const BOOKING_COLUMNS: &str = "id, requester_user_id, guest_name, guest_email, guest_phone,
        service_id, therapist_id, booking_date, booking_time, status, completed_at,
        tip_amount, tip_recipient, visitor_token, created_at";

impl BookingDb {
    // =========================================================================
    // Bookings
    // =========================================================================

    fn map_booking_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbBooking> {
        Ok(DbBooking {
            id: row.get(0)?,
            requester_user_id: row.get(1)?,
            guest_name: row.get(2)?,
            guest_email: row.get(3)?,
            guest_phone: row.get(4)?,
            service_id: row.get(5)?,
            therapist_id: row.get(6)?,
            booking_date: row.get(7)?,
            booking_time: row.get(8)?,
            status: row.get(9)?,
            completed_at: row.get(10)?,
            tip_amount: row.get(11)?,
            tip_recipient: row.get(12)?,
            visitor_token: row.get(13)?,
            created_at: row.get(14)?,
        })
    }

    pub fn insert_booking(&self, booking: &DbBooking) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO bookings (
                id, requester_user_id, guest_name, guest_email, guest_phone,
                service_id, therapist_id, booking_date, booking_time, status,
                completed_at, tip_amount, tip_recipient, visitor_token, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                booking.id,
                booking.requester_user_id,
                booking.guest_name,
                booking.guest_email,
                booking.guest_phone,
                booking.service_id,
                booking.therapist_id,
                booking.booking_date,
                booking.booking_time,
                booking.status,
                booking.completed_at,
                booking.tip_amount,
                booking.tip_recipient,
                booking.visitor_token,
                booking.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_booking(&self, id: &str) -> Result<Option<DbBooking>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], Self::map_booking_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All bookings, oldest first (stable order for aggregation snapshots).
    pub fn all_bookings(&self) -> Result<Vec<DbBooking>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], Self::map_booking_row)?;
        let mut bookings = Vec::new();
        for row in rows {
            bookings.push(row?);
        }
        Ok(bookings)
    }

    // =========================================================================
    // Conditional status transitions
    //
    // Each write carries the expected current status in its WHERE clause so a
    // transition whose observed state moved underneath it affects zero rows
    // instead of silently overwriting. Callers turn `false` into a
    // ConcurrentModification (or NotFound) after re-fetching.
    // =========================================================================

    /// `pending → confirmed`, assigning a therapist in the same write.
    pub fn confirm_if_pending(&self, id: &str, therapist_id: &str) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE bookings SET status = 'confirmed', therapist_id = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id, therapist_id],
        )?;
        Ok(changed > 0)
    }

    /// `confirmed → completed`, stamping completion time and gratuity.
    pub fn complete_if_confirmed(
        &self,
        id: &str,
        completed_at: &str,
        tip_amount: f64,
        tip_recipient: Option<&str>,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE bookings SET status = 'completed', completed_at = ?2,
                    tip_amount = ?3, tip_recipient = ?4
             WHERE id = ?1 AND status = 'confirmed'",
            params![id, completed_at, tip_amount, tip_recipient],
        )?;
        Ok(changed > 0)
    }

    /// Plain status move guarded on the expected current status. Used for
    /// cancel and restore, which touch no other columns (cancel deliberately
    /// keeps the therapist assignment so restore can remember it).
    pub fn set_status_if(&self, id: &str, expected: &str, new: &str) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE bookings SET status = ?3 WHERE id = ?1 AND status = ?2",
            params![id, expected, new],
        )?;
        Ok(changed > 0)
    }

    /// Full-field edit, guarded on the status observed when the edit started.
    pub fn update_booking_if_status(
        &self,
        booking: &DbBooking,
        expected_status: &str,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE bookings SET
                requester_user_id = ?2, guest_name = ?3, guest_email = ?4, guest_phone = ?5,
                service_id = ?6, therapist_id = ?7, booking_date = ?8, booking_time = ?9,
                status = ?10, completed_at = ?11, tip_amount = ?12, tip_recipient = ?13
             WHERE id = ?1 AND status = ?14",
            params![
                booking.id,
                booking.requester_user_id,
                booking.guest_name,
                booking.guest_email,
                booking.guest_phone,
                booking.service_id,
                booking.therapist_id,
                booking.booking_date,
                booking.booking_time,
                booking.status,
                booking.completed_at,
                booking.tip_amount,
                booking.tip_recipient,
                expected_status,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Hard delete. Terminal and unrecoverable; callers obtain explicit
    /// confirmation before invoking.
    pub fn delete_booking(&self, id: &str) -> Result<bool, DbError> {
        let changed = self
            .conn
            .execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    fn sample_booking(id: &str) -> DbBooking {
        DbBooking {
            id: id.to_string(),
            requester_user_id: None,
            guest_name: Some("Mara Lindqvist".to_string()),
            guest_email: Some("mara@example.com".to_string()),
            guest_phone: None,
            service_id: "svc-swedish".to_string(),
            therapist_id: None,
            booking_date: "2026-03-05".to_string(),
            booking_time: "18:30".to_string(),
            status: "pending".to_string(),
            completed_at: None,
            tip_amount: 0.0,
            tip_recipient: None,
            visitor_token: Some("tok-9f2a".to_string()),
            created_at: "2026-03-01T14:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_get_round_trip() {
        let db = test_db();
        let booking = sample_booking("bk-001");
        db.insert_booking(&booking).expect("insert");

        let fetched = db.get_booking("bk-001").expect("query").expect("row");
        assert_eq!(fetched, booking);
        assert!(db.get_booking("bk-missing").expect("query").is_none());
    }

    #[test]
    fn test_confirm_requires_pending() {
        let db = test_db();
        db.insert_booking(&sample_booking("bk-002")).expect("insert");

        assert!(db.confirm_if_pending("bk-002", "th-1").expect("confirm"));
        // Second confirm observes 'confirmed' — zero rows affected.
        assert!(!db.confirm_if_pending("bk-002", "th-2").expect("confirm"));

        let row = db.get_booking("bk-002").expect("query").expect("row");
        assert_eq!(row.status, "confirmed");
        assert_eq!(row.therapist_id.as_deref(), Some("th-1"));
    }

    #[test]
    fn test_complete_is_conditional_on_confirmed() {
        let db = test_db();
        db.insert_booking(&sample_booking("bk-003")).expect("insert");

        // Not confirmed yet — the conditional write must not apply.
        assert!(!db
            .complete_if_confirmed("bk-003", "2026-03-05T23:30:00Z", 10.0, Some("therapist"))
            .expect("complete"));

        db.confirm_if_pending("bk-003", "th-1").expect("confirm");
        assert!(db
            .complete_if_confirmed("bk-003", "2026-03-05T23:30:00Z", 10.0, Some("therapist"))
            .expect("complete"));

        let row = db.get_booking("bk-003").expect("query").expect("row");
        assert_eq!(row.status, "completed");
        assert_eq!(row.completed_at.as_deref(), Some("2026-03-05T23:30:00Z"));
        assert_eq!(row.tip_amount, 10.0);
    }

    #[test]
    fn test_stale_expected_status_affects_zero_rows() {
        let db = test_db();
        db.insert_booking(&sample_booking("bk-004")).expect("insert");
        db.confirm_if_pending("bk-004", "th-1").expect("confirm");

        // A writer still holding the 'pending' snapshot loses the race.
        assert!(!db.set_status_if("bk-004", "pending", "cancelled").expect("update"));
        assert!(db.set_status_if("bk-004", "confirmed", "cancelled").expect("update"));
    }

    #[test]
    fn test_delete_is_terminal() {
        let db = test_db();
        db.insert_booking(&sample_booking("bk-005")).expect("insert");
        assert!(db.delete_booking("bk-005").expect("delete"));
        assert!(!db.delete_booking("bk-005").expect("delete"));
        assert!(db.get_booking("bk-005").expect("query").is_none());
    }
}
