use rusqlite::params;

use super::*;

const FEEDBACK_COLUMNS: &str = "id, booking_id, therapist_id, rating, comment,
        previous_rating, previous_comment, edited_at, edit_count";

impl BookingDb {
    // =========================================================================
    // Therapist feedback — one row per completed booking
    // =========================================================================

    fn map_feedback_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbFeedback> {
        Ok(DbFeedback {
            id: row.get(0)?,
            booking_id: row.get(1)?,
            therapist_id: row.get(2)?,
            rating: row.get(3)?,
            comment: row.get(4)?,
            previous_rating: row.get(5)?,
            previous_comment: row.get(6)?,
            edited_at: row.get(7)?,
            edit_count: row.get(8)?,
        })
    }

    pub fn insert_feedback(&self, feedback: &DbFeedback) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO therapist_feedback (
                id, booking_id, therapist_id, rating, comment,
                previous_rating, previous_comment, edited_at, edit_count
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                feedback.id,
                feedback.booking_id,
                feedback.therapist_id,
                feedback.rating,
                feedback.comment,
                feedback.previous_rating,
                feedback.previous_comment,
                feedback.edited_at,
                feedback.edit_count,
            ],
        )?;
        Ok(())
    }

    pub fn get_feedback(&self, id: &str) -> Result<Option<DbFeedback>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM therapist_feedback WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], Self::map_feedback_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_feedback_for_booking(
        &self,
        booking_id: &str,
    ) -> Result<Option<DbFeedback>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM therapist_feedback WHERE booking_id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![booking_id], Self::map_feedback_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Apply the single allowed edit, guarded on `edit_count = 0` so a racing
    /// second edit affects zero rows.
    pub fn apply_feedback_edit(
        &self,
        id: &str,
        rating: i64,
        comment: &str,
        edited_at: &str,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE therapist_feedback SET
                previous_rating = rating,
                previous_comment = comment,
                rating = ?2,
                comment = ?3,
                edited_at = ?4,
                edit_count = edit_count + 1
             WHERE id = ?1 AND edit_count = 0",
            params![id, rating, comment, edited_at],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    fn sample_feedback(id: &str, booking_id: &str) -> DbFeedback {
        DbFeedback {
            id: id.to_string(),
            booking_id: booking_id.to_string(),
            therapist_id: "th-1".to_string(),
            rating: 5,
            comment: "Wonderful session".to_string(),
            previous_rating: None,
            previous_comment: None,
            edited_at: None,
            edit_count: 0,
        }
    }

    #[test]
    fn test_one_feedback_per_booking() {
        let db = test_db();
        db.insert_feedback(&sample_feedback("fb-1", "bk-1")).expect("insert");

        let dup = db.insert_feedback(&sample_feedback("fb-2", "bk-1"));
        assert!(dup.is_err(), "UNIQUE(booking_id) must reject a second review");
    }

    #[test]
    fn test_edit_stashes_previous_and_caps_at_one() {
        let db = test_db();
        db.insert_feedback(&sample_feedback("fb-3", "bk-2")).expect("insert");

        assert!(db
            .apply_feedback_edit("fb-3", 4, "Still great, slightly rushed", "2026-03-06T10:00:00Z")
            .expect("edit"));

        let row = db.get_feedback("fb-3").expect("query").expect("row");
        assert_eq!(row.rating, 4);
        assert_eq!(row.previous_rating, Some(5));
        assert_eq!(row.previous_comment.as_deref(), Some("Wonderful session"));
        assert_eq!(row.edit_count, 1);

        // Second edit: guard on edit_count = 0 rejects it.
        assert!(!db
            .apply_feedback_edit("fb-3", 3, "Changed my mind again", "2026-03-07T10:00:00Z")
            .expect("edit"));
    }
}
