use rusqlite::params;

use super::*;

impl BookingDb {
    // =========================================================================
    // Profiles
    // =========================================================================

    fn map_profile_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbProfile> {
        Ok(DbProfile {
            id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get(2)?,
            role: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    /// Insert or update a profile. Email is normalized to lowercase.
    pub fn upsert_profile(&self, profile: &DbProfile) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO profiles (id, email, full_name, role, created_at)
             VALUES (?1, LOWER(?2), ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                email = LOWER(excluded.email),
                full_name = excluded.full_name,
                role = excluded.role",
            params![
                profile.id,
                profile.email,
                profile.full_name,
                profile.role,
                profile.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<DbProfile>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, full_name, role, created_at FROM profiles WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::map_profile_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All profiles with the given role, id ascending.
    pub fn profiles_by_role(&self, role: &str) -> Result<Vec<DbProfile>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, full_name, role, created_at FROM profiles
             WHERE role = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![role], Self::map_profile_row)?;
        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    pub fn all_profiles(&self) -> Result<Vec<DbProfile>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, full_name, role, created_at FROM profiles ORDER BY id",
        )?;
        let rows = stmt.query_map([], Self::map_profile_row)?;
        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }
}
