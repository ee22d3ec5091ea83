use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::models::{USER_COLUMNS, UserRow};
use crate::{Database, is_unique_violation};

/// Profile fields to change; `None` leaves the column as it is.
/// `profile_image_url: Some(None)` clears the image.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub profile_image_url: Option<Option<String>>,
}

impl Database {
    /// Insert a user. Returns `None` if the email is already registered.
    pub fn create_user(
        &self,
        id: Uuid,
        email: &str,
        name: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRow>> {
        self.with_tx(|tx| {
            if query_user_by_email(tx, email)?.is_some() {
                return Ok(None);
            }

            let inserted = tx.execute(
                "INSERT INTO users (id, email, name, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![id.to_string(), email, name, password_hash, now],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            }

            info!("Registered user {} <{}>", id, email);
            query_user_by_id(tx, id)
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRow>> {
        let set_image = changes.profile_image_url.is_some();
        let image = changes.profile_image_url.flatten();
        self.with_tx(|tx| {
            let updated = tx.execute(
                "UPDATE users
                 SET name = COALESCE(?2, name),
                     password_hash = COALESCE(?3, password_hash),
                     profile_image_url = CASE WHEN ?5 THEN ?4 ELSE profile_image_url END,
                     updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    changes.name,
                    changes.password_hash,
                    image,
                    set_image,
                    now,
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_user_by_id(tx, id)
        })
    }

    /// Delete a user. Friendships, items on either side and notifications go
    /// with it through `ON DELETE CASCADE`.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_tx(|tx| {
            let deleted = tx.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            if deleted > 0 {
                info!("Deleted user {}", id);
            }
            Ok(deleted > 0)
        })
    }
}

pub(crate) fn query_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    let row = conn
        .query_row(&sql, [id.to_string()], UserRow::from_row)
        .optional()?;
    Ok(row)
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
    let row = conn.query_row(&sql, [email], UserRow::from_row).optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{at, friends, user};

    #[test]
    fn duplicate_email_is_refused() {
        let db = Database::open_in_memory().unwrap();
        user(&db, "alice");

        let again = db
            .create_user(
                Uuid::new_v4(),
                "alice@example.com",
                "Other Alice",
                "hash",
                at(2026, 1, 2, 9, 0),
            )
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn lookup_by_id_and_email() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");

        let by_email = db.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, alice.id);
        let by_id = db.get_user_by_id(alice.id).unwrap().unwrap();
        assert_eq!(by_id.email, "alice@example.com");
        assert!(db.get_user_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn update_only_touches_given_fields() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");

        let later = at(2026, 3, 1, 12, 0);
        let updated = db
            .update_user(
                alice.id,
                UserChanges {
                    profile_image_url: Some(Some("/uploads/a.png".into())),
                    ..Default::default()
                },
                later,
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "alice");
        assert_eq!(updated.password_hash, alice.password_hash);
        assert_eq!(updated.profile_image_url.as_deref(), Some("/uploads/a.png"));
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.created_at, alice.created_at);
    }

    #[test]
    fn profile_image_can_be_cleared() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let set = |image: Option<Option<String>>| UserChanges {
            profile_image_url: image,
            ..Default::default()
        };

        db.update_user(alice.id, set(Some(Some("/uploads/a.png".into()))), at(2026, 3, 1, 9, 0))
            .unwrap()
            .unwrap();

        // absent keeps it
        let kept = db
            .update_user(alice.id, set(None), at(2026, 3, 1, 10, 0))
            .unwrap()
            .unwrap();
        assert_eq!(kept.profile_image_url.as_deref(), Some("/uploads/a.png"));

        let cleared = db
            .update_user(alice.id, set(Some(None)), at(2026, 3, 1, 11, 0))
            .unwrap()
            .unwrap();
        assert!(cleared.profile_image_url.is_none());
    }

    #[test]
    fn delete_cascades_to_friendships_and_items() {
        let db = Database::open_in_memory().unwrap();
        let (alice, bob) = friends(&db);
        db.create_loan(alice.id, bob.id, "/uploads/coat.png", None, at(2026, 2, 1, 9, 0))
            .unwrap();

        assert!(db.delete_user(alice.id).unwrap());
        assert!(db.find_existing_friendship(alice.id, bob.id).unwrap().is_none());
        assert!(db.list_lent(bob.id, None).unwrap().is_empty());
        // the borrow notification went with the item
        let left = db.list_notifications(bob.id, 0, 100).unwrap();
        assert!(left.iter().all(|n| n.related_item_id.is_none()));
        assert!(!db.delete_user(alice.id).unwrap());
    }
}
