pub mod friendships;
pub mod items;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod nudge;
pub mod users;

use anyhow::Result;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Single SQLite connection behind a mutex.
///
/// Every lifecycle transition runs inside `with_tx`, so the read, the state
/// check and the write happen in one transaction while the lock is held.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits on `Ok`, rolls back on `Err`.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// True when `err` is a UNIQUE or PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    use crate::Database;
    use crate::models::UserRow;

    pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    pub fn user(db: &Database, name: &str) -> UserRow {
        db.create_user(
            Uuid::new_v4(),
            &format!("{}@example.com", name),
            name,
            "not-a-real-hash",
            at(2026, 1, 1, 9, 0),
        )
        .unwrap()
        .expect("email already taken")
    }

    /// Two users with an accepted friendship between them.
    pub fn friends(db: &Database) -> (UserRow, UserRow) {
        let a = user(db, "alice");
        let b = user(db, "bob");
        let created = db
            .create_friend_request(a.id, b.id, at(2026, 1, 1, 10, 0))
            .unwrap();
        let friendship = match created {
            crate::friendships::FriendRequestOutcome::Created(f) => f,
            other => panic!("unexpected outcome {:?}", other),
        };
        db.accept_friend_request(friendship.id, b.id).unwrap().unwrap();
        (a, b)
    }
}
