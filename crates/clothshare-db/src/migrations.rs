use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                email               TEXT NOT NULL UNIQUE,
                name                TEXT NOT NULL,
                password_hash       TEXT NOT NULL,
                profile_image_url   TEXT,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE TABLE friendships (
                id          TEXT PRIMARY KEY,
                user_a      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                user_b      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status      TEXT NOT NULL DEFAULT 'pending',
                created_at  TEXT NOT NULL,
                CHECK (user_a <> user_b)
            );

            -- One row per unordered pair, whoever initiated it
            CREATE UNIQUE INDEX idx_friendships_pair
                ON friendships(min(user_a, user_b), max(user_a, user_b));

            CREATE INDEX idx_friendships_user_b
                ON friendships(user_b, status);

            CREATE TABLE cloth_items (
                id                      TEXT PRIMARY KEY,
                borrower_id             TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                lender_id               TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                image_url               TEXT NOT NULL,
                description             TEXT,
                status                  TEXT NOT NULL DEFAULT 'borrowed',
                borrowed_at             TEXT NOT NULL,
                return_requested_at     TEXT,
                returned_at             TEXT,
                CHECK (borrower_id <> lender_id)
            );

            CREATE INDEX idx_items_borrower
                ON cloth_items(borrower_id, borrowed_at);

            CREATE INDEX idx_items_lender
                ON cloth_items(lender_id, borrowed_at);

            CREATE TABLE notifications (
                id                  TEXT PRIMARY KEY,
                user_id             TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                type                TEXT NOT NULL,
                related_item_id     TEXT REFERENCES cloth_items(id) ON DELETE CASCADE,
                message             TEXT NOT NULL,
                is_read             INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user
                ON notifications(user_id, created_at);

            -- Nudge gating scans this
            CREATE INDEX idx_notifications_item
                ON notifications(related_item_id, type, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
