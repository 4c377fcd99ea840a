//! SQLite-backed store for bookings, profiles, and visitor correlation data.
//!
//! The engine treats the store as the single source of truth: every mutation
//! is one write, and in-memory state is never authoritative until that write
//! succeeds. Status transitions go through conditional UPDATEs (see
//! `bookings.rs`) so two operators racing on the same booking cannot both win.

use std::path::PathBuf;

use rusqlite::Connection;

pub mod types;
pub use types::*;

mod bookings;
mod feedback;
mod profiles;
mod services;
mod visitors;

pub struct BookingDb {
    conn: Connection,
}

impl BookingDb {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        Ok(Self { conn })
    }
}


// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::test_utils::test_db;

    #[test]
    fn test_open_creates_tables() {
        let db = test_db();
        for table in [
            "bookings",
            "profiles",
            "visitors",
            "client_devices",
            "services",
            "therapist_feedback",
        ] {
            let count: i32 = db
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap_or_else(|_| panic!("{table} table should exist"));
            assert_eq!(count, 0);
        }
    }
}
