use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use clothshare_types::models::{FriendshipStatus, NotificationKind};

use crate::models::{CounterpartRow, FRIENDSHIP_COLUMNS, FriendshipRow, parse_col};
use crate::notifications::insert_notification;
use crate::users::query_user_by_id;
use crate::{Database, is_unique_violation};

#[derive(Debug)]
pub enum FriendRequestOutcome {
    Created(FriendshipRow),
    SelfRequest,
    RecipientNotFound,
    AlreadyFriends,
    AlreadyPending,
}

impl Database {
    /// The row connecting two users, whichever of them initiated it.
    pub fn find_existing_friendship(&self, a: Uuid, b: Uuid) -> Result<Option<FriendshipRow>> {
        self.with_conn(|conn| query_existing(conn, a, b))
    }

    /// Send a friend request from `initiator` to `recipient` and notify the
    /// recipient. A leftover `rejected` row for the pair is replaced.
    pub fn create_friend_request(
        &self,
        initiator: Uuid,
        recipient: Uuid,
        now: DateTime<Utc>,
    ) -> Result<FriendRequestOutcome> {
        if initiator == recipient {
            return Ok(FriendRequestOutcome::SelfRequest);
        }

        self.with_tx(|tx| {
            let Some(sender) = query_user_by_id(tx, initiator)? else {
                return Err(anyhow::anyhow!("initiator {} does not exist", initiator));
            };
            if query_user_by_id(tx, recipient)?.is_none() {
                return Ok(FriendRequestOutcome::RecipientNotFound);
            }

            if let Some(existing) = query_existing(tx, initiator, recipient)? {
                match existing.status {
                    FriendshipStatus::Accepted => return Ok(FriendRequestOutcome::AlreadyFriends),
                    FriendshipStatus::Pending => return Ok(FriendRequestOutcome::AlreadyPending),
                    FriendshipStatus::Rejected => {
                        debug!("Replacing rejected friendship {}", existing.id);
                        tx.execute(
                            "DELETE FROM friendships WHERE id = ?1",
                            [existing.id.to_string()],
                        )?;
                    }
                }
            }

            let id = Uuid::new_v4();
            let inserted = tx.execute(
                "INSERT INTO friendships (id, user_a, user_b, status, created_at)
                 VALUES (?1, ?2, ?3, 'pending', ?4)",
                rusqlite::params![id.to_string(), initiator.to_string(), recipient.to_string(), now],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Ok(FriendRequestOutcome::AlreadyPending);
                }
                Err(e) => return Err(e.into()),
            }

            insert_notification(
                tx,
                recipient,
                NotificationKind::FriendRequest,
                &format!("{} sent you a friend request", sender.name),
                None,
                now,
            )?;

            let row = query_by_id(tx, id)?
                .ok_or_else(|| anyhow::anyhow!("friendship {} vanished after insert", id))?;
            info!("Friend request {} from {} to {}", id, initiator, recipient);
            Ok(FriendRequestOutcome::Created(row))
        })
    }

    /// Counterparts of every accepted friendship of `user`.
    pub fn list_friends(&self, user: Uuid) -> Result<Vec<CounterpartRow>> {
        self.with_conn(|conn| {
            query_counterparts(
                conn,
                "SELECT f.id, u.id, u.email, u.name, u.profile_image_url, f.created_at
                 FROM friendships f
                 JOIN users u
                   ON u.id = CASE WHEN f.user_a = ?1 THEN f.user_b ELSE f.user_a END
                 WHERE (f.user_a = ?1 OR f.user_b = ?1) AND f.status = 'accepted'
                 ORDER BY u.name",
                user,
            )
        })
    }

    /// Pending requests addressed to `user`, with their senders.
    pub fn list_received_requests(&self, user: Uuid) -> Result<Vec<CounterpartRow>> {
        self.with_conn(|conn| {
            query_counterparts(
                conn,
                "SELECT f.id, u.id, u.email, u.name, u.profile_image_url, f.created_at
                 FROM friendships f
                 JOIN users u ON u.id = f.user_a
                 WHERE f.user_b = ?1 AND f.status = 'pending'
                 ORDER BY f.created_at DESC",
                user,
            )
        })
    }

    /// Pending requests sent by `user`, with their recipients.
    pub fn list_sent_requests(&self, user: Uuid) -> Result<Vec<CounterpartRow>> {
        self.with_conn(|conn| {
            query_counterparts(
                conn,
                "SELECT f.id, u.id, u.email, u.name, u.profile_image_url, f.created_at
                 FROM friendships f
                 JOIN users u ON u.id = f.user_b
                 WHERE f.user_a = ?1 AND f.status = 'pending'
                 ORDER BY f.created_at DESC",
                user,
            )
        })
    }

    /// Accept a pending request. Only the recipient may accept; any other
    /// case (absent, not pending, wrong actor) yields `None`.
    pub fn accept_friend_request(&self, id: Uuid, actor: Uuid) -> Result<Option<FriendshipRow>> {
        self.with_tx(|tx| {
            let updated = tx.execute(
                "UPDATE friendships SET status = 'accepted'
                 WHERE id = ?1 AND user_b = ?2 AND status = 'pending'",
                [id.to_string(), actor.to_string()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            info!("Friendship {} accepted", id);
            query_by_id(tx, id)
        })
    }

    /// Reject a pending request by deleting it. Same guard as accept.
    pub fn reject_friend_request(&self, id: Uuid, actor: Uuid) -> Result<bool> {
        self.with_tx(|tx| {
            let deleted = tx.execute(
                "DELETE FROM friendships
                 WHERE id = ?1 AND user_b = ?2 AND status = 'pending'",
                [id.to_string(), actor.to_string()],
            )?;
            if deleted > 0 {
                info!("Friend request {} rejected", id);
            }
            Ok(deleted > 0)
        })
    }

    /// Delete a friendship in any status. Either participant may do it.
    pub fn delete_friendship(&self, id: Uuid, actor: Uuid) -> Result<bool> {
        self.with_tx(|tx| {
            let deleted = tx.execute(
                "DELETE FROM friendships
                 WHERE id = ?1 AND (user_a = ?2 OR user_b = ?2)",
                [id.to_string(), actor.to_string()],
            )?;
            if deleted > 0 {
                info!("Friendship {} deleted by {}", id, actor);
            }
            Ok(deleted > 0)
        })
    }
}

pub(crate) fn query_existing(conn: &Connection, a: Uuid, b: Uuid) -> Result<Option<FriendshipRow>> {
    let sql = format!(
        "SELECT {} FROM friendships
         WHERE (user_a = ?1 AND user_b = ?2) OR (user_a = ?2 AND user_b = ?1)",
        FRIENDSHIP_COLUMNS
    );
    let row = conn
        .query_row(&sql, [a.to_string(), b.to_string()], FriendshipRow::from_row)
        .optional()?;
    Ok(row)
}

fn query_by_id(conn: &Connection, id: Uuid) -> Result<Option<FriendshipRow>> {
    let sql = format!("SELECT {} FROM friendships WHERE id = ?1", FRIENDSHIP_COLUMNS);
    let row = conn
        .query_row(&sql, [id.to_string()], FriendshipRow::from_row)
        .optional()?;
    Ok(row)
}

fn query_counterparts(conn: &Connection, sql: &str, user: Uuid) -> Result<Vec<CounterpartRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([user.to_string()], |row| {
            Ok(CounterpartRow {
                friendship_id: parse_col(row, 0)?,
                user_id: parse_col(row, 1)?,
                email: row.get(2)?,
                name: row.get(3)?,
                profile_image_url: row.get(4)?,
                since: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{at, user};

    fn created(outcome: FriendRequestOutcome) -> FriendshipRow {
        match outcome {
            FriendRequestOutcome::Created(row) => row,
            other => panic!("expected Created, got {:?}", other),
        }
    }

    #[test]
    fn request_is_found_from_either_side() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");

        let row = created(db.create_friend_request(a.id, b.id, at(2026, 1, 1, 10, 0)).unwrap());
        assert_eq!(row.status, FriendshipStatus::Pending);
        assert_eq!(row.user_a, a.id);
        assert_eq!(row.user_b, b.id);

        let ab = db.find_existing_friendship(a.id, b.id).unwrap().unwrap();
        let ba = db.find_existing_friendship(b.id, a.id).unwrap().unwrap();
        assert_eq!(ab.id, ba.id);
        assert_eq!(ab.status, FriendshipStatus::Pending);
    }

    #[test]
    fn self_request_is_invalid() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let outcome = db.create_friend_request(a.id, a.id, at(2026, 1, 1, 10, 0)).unwrap();
        assert!(matches!(outcome, FriendRequestOutcome::SelfRequest));
    }

    #[test]
    fn unknown_recipient_is_reported() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let outcome = db
            .create_friend_request(a.id, Uuid::new_v4(), at(2026, 1, 1, 10, 0))
            .unwrap();
        assert!(matches!(outcome, FriendRequestOutcome::RecipientNotFound));
    }

    #[test]
    fn duplicate_requests_conflict_while_pending_or_accepted() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");

        let row = created(db.create_friend_request(a.id, b.id, at(2026, 1, 1, 10, 0)).unwrap());
        let again = db.create_friend_request(a.id, b.id, at(2026, 1, 1, 10, 5)).unwrap();
        assert!(matches!(again, FriendRequestOutcome::AlreadyPending));
        let reverse = db.create_friend_request(b.id, a.id, at(2026, 1, 1, 10, 6)).unwrap();
        assert!(matches!(reverse, FriendRequestOutcome::AlreadyPending));

        db.accept_friend_request(row.id, b.id).unwrap().unwrap();
        let after = db.create_friend_request(a.id, b.id, at(2026, 1, 1, 11, 0)).unwrap();
        assert!(matches!(after, FriendRequestOutcome::AlreadyFriends));
    }

    #[test]
    fn pair_index_rejects_a_reversed_duplicate() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        created(db.create_friend_request(a.id, b.id, at(2026, 1, 1, 10, 0)).unwrap());

        let raw = db.with_conn(|conn| {
            Ok(conn.execute(
                "INSERT INTO friendships (id, user_a, user_b, status, created_at)
                 VALUES (?1, ?2, ?3, 'pending', ?4)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    b.id.to_string(),
                    a.id.to_string(),
                    at(2026, 1, 1, 10, 1),
                ],
            ))
        });
        let err = raw.unwrap().unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn only_the_recipient_can_accept() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let row = created(db.create_friend_request(a.id, b.id, at(2026, 1, 1, 10, 0)).unwrap());

        assert!(db.accept_friend_request(row.id, a.id).unwrap().is_none());
        let accepted = db.accept_friend_request(row.id, b.id).unwrap().unwrap();
        assert_eq!(accepted.status, FriendshipStatus::Accepted);
        // no longer pending
        assert!(db.accept_friend_request(row.id, b.id).unwrap().is_none());
    }

    #[test]
    fn reject_deletes_and_allows_a_new_request() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let row = created(db.create_friend_request(a.id, b.id, at(2026, 1, 1, 10, 0)).unwrap());

        assert!(!db.reject_friend_request(row.id, a.id).unwrap());
        assert!(db.reject_friend_request(row.id, b.id).unwrap());
        assert!(db.find_existing_friendship(a.id, b.id).unwrap().is_none());

        created(db.create_friend_request(a.id, b.id, at(2026, 1, 1, 10, 30)).unwrap());
    }

    #[test]
    fn legacy_rejected_row_is_replaced() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let old = created(db.create_friend_request(a.id, b.id, at(2026, 1, 1, 10, 0)).unwrap());
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE friendships SET status = 'rejected' WHERE id = ?1",
                [old.id.to_string()],
            )?;
            Ok(())
        })
        .unwrap();

        let fresh = created(db.create_friend_request(b.id, a.id, at(2026, 1, 2, 10, 0)).unwrap());
        assert_ne!(fresh.id, old.id);
        assert_eq!(fresh.user_a, b.id);
    }

    #[test]
    fn either_participant_can_delete() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let c = user(&db, "carol");
        let row = created(db.create_friend_request(a.id, b.id, at(2026, 1, 1, 10, 0)).unwrap());
        db.accept_friend_request(row.id, b.id).unwrap().unwrap();

        assert!(!db.delete_friendship(row.id, c.id).unwrap());
        assert!(db.delete_friendship(row.id, a.id).unwrap());
        assert!(!db.delete_friendship(row.id, b.id).unwrap());
    }

    #[test]
    fn lists_split_by_direction_and_status() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let c = user(&db, "carol");

        let ab = created(db.create_friend_request(a.id, b.id, at(2026, 1, 1, 10, 0)).unwrap());
        created(db.create_friend_request(c.id, a.id, at(2026, 1, 1, 11, 0)).unwrap());

        let sent = db.list_sent_requests(a.id).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, b.id);
        assert_eq!(sent[0].since, at(2026, 1, 1, 10, 0));

        let received = db.list_received_requests(a.id).unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].user_id, c.id);
        assert_eq!(received[0].email, "carol@example.com");

        assert!(db.list_friends(a.id).unwrap().is_empty());
        db.accept_friend_request(ab.id, b.id).unwrap().unwrap();

        let friends_of_a = db.list_friends(a.id).unwrap();
        assert_eq!(friends_of_a.len(), 1);
        assert_eq!(friends_of_a[0].user_id, b.id);
        let friends_of_b = db.list_friends(b.id).unwrap();
        assert_eq!(friends_of_b[0].user_id, a.id);
        assert!(db.list_sent_requests(a.id).unwrap().is_empty());
    }

    #[test]
    fn request_notifies_the_recipient() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        created(db.create_friend_request(a.id, b.id, at(2026, 1, 1, 10, 0)).unwrap());

        let inbox = db.list_notifications(b.id, 0, 100).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::FriendRequest);
        assert!(inbox[0].message.contains("alice"));
    }
}
