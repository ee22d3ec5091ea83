use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use clothshare_types::models::NotificationKind;

use crate::Database;
use crate::models::{NOTIFICATION_COLUMNS, NotificationRow};

/// Hard upper bound on one page of notifications.
pub const MAX_PAGE_SIZE: u32 = 200;

impl Database {
    /// Append an unread notification for `user`.
    pub fn notify(
        &self,
        user: Uuid,
        kind: NotificationKind,
        message: &str,
        related_item: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<NotificationRow> {
        self.with_tx(|tx| insert_notification(tx, user, kind, message, related_item, now))
    }

    /// Newest first, offset/limit paginated.
    pub fn list_notifications(&self, user: Uuid, skip: u32, limit: u32) -> Result<Vec<NotificationRow>> {
        let limit = limit.min(MAX_PAGE_SIZE);
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2 OFFSET ?3",
                NOTIFICATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![user.to_string(), limit, skip],
                    NotificationRow::from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Mark a notification read. Only its recipient may; re-marking is a
    /// no-op success. `None` if absent or owned by someone else.
    pub fn mark_read(&self, id: Uuid, user: Uuid) -> Result<Option<NotificationRow>> {
        self.with_tx(|tx| {
            let updated = tx.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                [id.to_string(), user.to_string()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_by_id(tx, id)
        })
    }
}

pub(crate) fn insert_notification(
    conn: &Connection,
    user: Uuid,
    kind: NotificationKind,
    message: &str,
    related_item: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<NotificationRow> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO notifications (id, user_id, type, related_item_id, message, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        rusqlite::params![
            id.to_string(),
            user.to_string(),
            kind.as_str(),
            related_item.map(|i| i.to_string()),
            message,
            now,
        ],
    )?;

    Ok(NotificationRow {
        id,
        user_id: user,
        kind,
        related_item_id: related_item,
        message: message.to_string(),
        is_read: false,
        created_at: now,
    })
}

fn query_by_id(conn: &Connection, id: Uuid) -> Result<Option<NotificationRow>> {
    let sql = format!("SELECT {} FROM notifications WHERE id = ?1", NOTIFICATION_COLUMNS);
    let row = conn
        .query_row(&sql, [id.to_string()], NotificationRow::from_row)
        .optional()?;
    Ok(row)
}

/// Creation times of every nudge sent for `item`, newest first.
pub(crate) fn query_nudge_history(conn: &Connection, item: Uuid) -> Result<Vec<DateTime<Utc>>> {
    let mut stmt = conn.prepare(
        "SELECT created_at FROM notifications
         WHERE related_item_id = ?1 AND type = ?2
         ORDER BY created_at DESC",
    )?;
    let rows = stmt
        .query_map(
            [item.to_string(), NotificationKind::Nudge.as_str().to_string()],
            |row| row.get::<_, DateTime<Utc>>(0),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{at, user};

    #[test]
    fn listing_is_newest_first_and_paginated() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        for hour in 9..14 {
            db.notify(
                a.id,
                NotificationKind::FriendRequest,
                &format!("at {}", hour),
                None,
                at(2026, 5, 1, hour, 0),
            )
            .unwrap();
        }

        let all = db.list_notifications(a.id, 0, 100).unwrap();
        let messages: Vec<_> = all.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, ["at 13", "at 12", "at 11", "at 10", "at 9"]);

        let page = db.list_notifications(a.id, 1, 2).unwrap();
        let messages: Vec<_> = page.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, ["at 12", "at 11"]);
    }

    #[test]
    fn mark_read_is_idempotent_and_owner_only() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let n = db
            .notify(a.id, NotificationKind::FriendRequest, "hi", None, at(2026, 5, 1, 9, 0))
            .unwrap();
        assert!(!n.is_read);

        assert!(db.mark_read(n.id, b.id).unwrap().is_none());
        assert!(db.mark_read(n.id, a.id).unwrap().unwrap().is_read);
        assert!(db.mark_read(n.id, a.id).unwrap().unwrap().is_read);
        assert!(db.mark_read(Uuid::new_v4(), a.id).unwrap().is_none());
    }

    #[test]
    fn page_size_is_capped() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        for i in 0..(MAX_PAGE_SIZE + 5) {
            db.notify(
                a.id,
                NotificationKind::FriendRequest,
                "x",
                None,
                at(2026, 5, 1, 9, 0) + chrono::Duration::seconds(i as i64),
            )
            .unwrap();
        }
        let page = db.list_notifications(a.id, 0, 10_000).unwrap();
        assert_eq!(page.len(), MAX_PAGE_SIZE as usize);
    }
}
