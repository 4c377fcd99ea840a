use rusqlite::params;

use super::*;

impl BookingDb {
    // =========================================================================
    // Visitors & devices
    //
    // Weak-identity facts about browsers/devices. Created on first sighting,
    // updated in place on every subsequent one, never deleted by normal
    // operation.
    // =========================================================================

    /// Record a page load from an anonymous token: insert with count 1, or
    /// bump `visit_count` and advance `last_visit` (max-wins, so replayed
    /// events can't move it backwards).
    pub fn record_visit(&self, token: &str, seen_at: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO visitors (visitor_token, first_visit, last_visit, visit_count)
             VALUES (?1, ?2, ?2, 1)
             ON CONFLICT(visitor_token) DO UPDATE SET
                visit_count = visitors.visit_count + 1,
                last_visit = CASE
                    WHEN excluded.last_visit > visitors.last_visit THEN excluded.last_visit
                    ELSE visitors.last_visit
                END",
            params![token, seen_at],
        )?;
        Ok(())
    }

    /// Attach a later-registered account to an anonymous token.
    pub fn link_visitor_to_user(&self, token: &str, user_id: &str) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE visitors SET user_id = ?2 WHERE visitor_token = ?1",
            params![token, user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn all_visitors(&self) -> Result<Vec<DbVisitor>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT visitor_token, user_id, first_visit, last_visit, visit_count
             FROM visitors ORDER BY visitor_token",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DbVisitor {
                visitor_token: row.get(0)?,
                user_id: row.get(1)?,
                first_visit: row.get(2)?,
                last_visit: row.get(3)?,
                visit_count: row.get(4)?,
            })
        })?;
        let mut visitors = Vec::new();
        for row in rows {
            visitors.push(row?);
        }
        Ok(visitors)
    }

    /// Insert or refresh a device record: bumps `session_count` and advances
    /// `last_seen` on conflict, keeping the original `first_seen`.
    pub fn upsert_device(&self, device: &DbDevice) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO client_devices (
                id, user_id, visitor_token, device_model, os_name, os_version,
                browser, browser_version, device_type, first_seen, last_seen, session_count
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                user_id = COALESCE(excluded.user_id, client_devices.user_id),
                visitor_token = COALESCE(excluded.visitor_token, client_devices.visitor_token),
                os_version = excluded.os_version,
                browser_version = excluded.browser_version,
                session_count = client_devices.session_count + 1,
                last_seen = CASE
                    WHEN excluded.last_seen > client_devices.last_seen THEN excluded.last_seen
                    ELSE client_devices.last_seen
                END",
            params![
                device.id,
                device.user_id,
                device.visitor_token,
                device.device_model,
                device.os_name,
                device.os_version,
                device.browser,
                device.browser_version,
                device.device_type,
                device.first_seen,
                device.last_seen,
                device.session_count,
            ],
        )?;
        Ok(())
    }

    pub fn all_devices(&self) -> Result<Vec<DbDevice>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, visitor_token, device_model, os_name, os_version,
                    browser, browser_version, device_type, first_seen, last_seen, session_count
             FROM client_devices ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DbDevice {
                id: row.get(0)?,
                user_id: row.get(1)?,
                visitor_token: row.get(2)?,
                device_model: row.get(3)?,
                os_name: row.get(4)?,
                os_version: row.get(5)?,
                browser: row.get(6)?,
                browser_version: row.get(7)?,
                device_type: row.get(8)?,
                first_seen: row.get(9)?,
                last_seen: row.get(10)?,
                session_count: row.get(11)?,
            })
        })?;
        let mut devices = Vec::new();
        for row in rows {
            devices.push(row?);
        }
        Ok(devices)
    }
}
