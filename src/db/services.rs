use rusqlite::params;

use super::*;

impl BookingDb {
    // =========================================================================
    // Service catalog
    // =========================================================================

    pub fn upsert_service(&self, service: &DbService) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO services (id, name, price, duration_minutes, active)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                duration_minutes = excluded.duration_minutes,
                active = excluded.active",
            params![
                service.id,
                service.name,
                service.price,
                service.duration_minutes,
                service.active as i32,
            ],
        )?;
        Ok(())
    }

    pub fn get_service(&self, id: &str) -> Result<Option<DbService>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, price, duration_minutes, active FROM services WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::map_service_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn all_services(&self) -> Result<Vec<DbService>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, price, duration_minutes, active FROM services ORDER BY id",
        )?;
        let rows = stmt.query_map([], Self::map_service_row)?;
        let mut services = Vec::new();
        for row in rows {
            services.push(row?);
        }
        Ok(services)
    }

    fn map_service_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbService> {
        Ok(DbService {
            id: row.get(0)?,
            name: row.get(1)?,
            price: row.get(2)?,
            duration_minutes: row.get(3)?,
            active: row.get::<_, i64>(4)? != 0,
        })
    }
}
