use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{info, warn};
use uuid::Uuid;

use clothshare_types::models::{FriendshipStatus, ItemStatus, NotificationKind};

use crate::Database;
use crate::friendships::query_existing;
use crate::models::{ITEM_COLUMNS, ItemListingRow, ItemRow, NotificationRow, UserSummaryRow, parse_col};
use crate::notifications::{insert_notification, query_nudge_history};
use crate::nudge::{NudgeDenial, NudgePolicy};
use crate::users::query_user_by_id;

#[derive(Debug)]
pub enum LoanOutcome {
    Created(ItemRow),
    SelfLoan,
    /// No accepted friendship between borrower and lender.
    NotFriends,
}

#[derive(Debug)]
pub enum NudgeOutcome {
    Sent(NotificationRow),
    ItemNotFound,
    NotLender,
    NotBorrowed(ItemStatus),
    Denied(NudgeDenial),
}

const LISTING_SELECT: &str = "SELECT i.id, i.borrower_id, i.lender_id, i.image_url, i.description, i.status,
            i.borrowed_at, i.return_requested_at, i.returned_at,
            b.id, b.name, b.profile_image_url,
            l.id, l.name, l.profile_image_url
     FROM cloth_items i
     JOIN users b ON b.id = i.borrower_id
     JOIN users l ON l.id = i.lender_id";

impl Database {
    /// Record that `borrower` took an item from `lender`. The two must have
    /// an accepted friendship; the lender gets a `borrow_request` notification.
    pub fn create_loan(
        &self,
        borrower: Uuid,
        lender: Uuid,
        image_url: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<LoanOutcome> {
        if borrower == lender {
            return Ok(LoanOutcome::SelfLoan);
        }

        self.with_tx(|tx| {
            let friendship = query_existing(tx, borrower, lender)?;
            if friendship.map(|f| f.status) != Some(FriendshipStatus::Accepted) {
                return Ok(LoanOutcome::NotFriends);
            }

            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO cloth_items (id, borrower_id, lender_id, image_url, description, status, borrowed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'borrowed', ?6)",
                rusqlite::params![
                    id.to_string(),
                    borrower.to_string(),
                    lender.to_string(),
                    image_url,
                    description,
                    now,
                ],
            )?;

            let borrower_name = user_name(tx, borrower)?;
            insert_notification(
                tx,
                lender,
                NotificationKind::BorrowRequest,
                &format!(
                    "{} borrowed '{}' from you",
                    borrower_name,
                    description.unwrap_or("an item")
                ),
                Some(id),
                now,
            )?;

            let item = query_item(tx, id)?
                .ok_or_else(|| anyhow::anyhow!("item {} vanished after insert", id))?;
            info!("Loan {} recorded: {} borrowed from {}", id, borrower, lender);
            Ok(LoanOutcome::Created(item))
        })
    }

    /// Items `user` borrowed, optionally only those from `friend`. Newest first.
    pub fn list_borrowed(&self, user: Uuid, friend: Option<Uuid>) -> Result<Vec<ItemListingRow>> {
        self.with_conn(|conn| {
            query_listings(
                conn,
                "WHERE i.borrower_id = ?1 AND (?2 IS NULL OR i.lender_id = ?2)",
                user,
                friend,
            )
        })
    }

    /// Items `user` lent, optionally only those to `friend`. Newest first.
    pub fn list_lent(&self, user: Uuid, friend: Option<Uuid>) -> Result<Vec<ItemListingRow>> {
        self.with_conn(|conn| {
            query_listings(
                conn,
                "WHERE i.lender_id = ?1 AND (?2 IS NULL OR i.borrower_id = ?2)",
                user,
                friend,
            )
        })
    }

    pub fn get_item(&self, id: Uuid) -> Result<Option<ItemRow>> {
        self.with_conn(|conn| query_item(conn, id))
    }

    /// `borrowed -> return_requested`, borrower only. The lender is notified.
    pub fn request_return(&self, id: Uuid, actor: Uuid, now: DateTime<Utc>) -> Result<Option<ItemRow>> {
        self.with_tx(|tx| {
            let updated = tx.execute(
                "UPDATE cloth_items
                 SET status = 'return_requested', return_requested_at = ?3
                 WHERE id = ?1 AND borrower_id = ?2 AND status = 'borrowed'",
                rusqlite::params![id.to_string(), actor.to_string(), now],
            )?;
            if updated == 0 {
                return Ok(None);
            }

            let Some(item) = query_item(tx, id)? else {
                return Ok(None);
            };
            let borrower_name = user_name(tx, item.borrower_id)?;
            insert_notification(
                tx,
                item.lender_id,
                NotificationKind::ReturnRequest,
                &format!(
                    "{} wants to return '{}'",
                    borrower_name,
                    item.description.as_deref().unwrap_or("an item")
                ),
                Some(item.id),
                now,
            )?;

            info!("Item {} return requested", id);
            Ok(Some(item))
        })
    }

    /// `return_requested -> returned`, lender only.
    pub fn approve_return(&self, id: Uuid, actor: Uuid, now: DateTime<Utc>) -> Result<Option<ItemRow>> {
        self.with_tx(|tx| {
            let updated = tx.execute(
                "UPDATE cloth_items
                 SET status = 'returned', returned_at = ?3
                 WHERE id = ?1 AND lender_id = ?2 AND status = 'return_requested'",
                rusqlite::params![id.to_string(), actor.to_string(), now],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            info!("Item {} returned", id);
            query_item(tx, id)
        })
    }

    /// `return_requested -> borrowed`, lender only. Clears `return_requested_at`.
    pub fn reject_return(&self, id: Uuid, actor: Uuid) -> Result<Option<ItemRow>> {
        self.with_tx(|tx| {
            let updated = tx.execute(
                "UPDATE cloth_items
                 SET status = 'borrowed', return_requested_at = NULL
                 WHERE id = ?1 AND lender_id = ?2 AND status = 'return_requested'",
                [id.to_string(), actor.to_string()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            info!("Item {} return rejected", id);
            query_item(tx, id)
        })
    }

    /// Send a nudge from the lender of a borrowed item to its borrower,
    /// subject to `policy`. Reading the nudge history and inserting the new
    /// nudge happen in one transaction.
    pub fn send_nudge(
        &self,
        item_id: Uuid,
        actor: Uuid,
        policy: &NudgePolicy,
        now: DateTime<Utc>,
    ) -> Result<NudgeOutcome> {
        self.with_tx(|tx| {
            let Some(item) = query_item(tx, item_id)? else {
                return Ok(NudgeOutcome::ItemNotFound);
            };
            if item.lender_id != actor {
                return Ok(NudgeOutcome::NotLender);
            }
            if item.status != ItemStatus::Borrowed {
                return Ok(NudgeOutcome::NotBorrowed(item.status));
            }

            let history = query_nudge_history(tx, item.id)?;
            if let Err(denial) = policy.evaluate(now, &history) {
                warn!("Nudge for item {} denied: {:?}", item.id, denial);
                return Ok(NudgeOutcome::Denied(denial));
            }

            let lender_name = user_name(tx, item.lender_id)?;
            let notification = insert_notification(
                tx,
                item.borrower_id,
                NotificationKind::Nudge,
                &format!(
                    "{} asked you to return '{}'",
                    lender_name,
                    item.description.as_deref().unwrap_or("your borrowed item")
                ),
                Some(item.id),
                now,
            )?;

            info!("Nudge sent for item {} to {}", item.id, item.borrower_id);
            Ok(NudgeOutcome::Sent(notification))
        })
    }
}

fn query_item(conn: &Connection, id: Uuid) -> Result<Option<ItemRow>> {
    let sql = format!("SELECT {} FROM cloth_items WHERE id = ?1", ITEM_COLUMNS);
    let row = conn
        .query_row(&sql, [id.to_string()], ItemRow::from_row)
        .optional()?;
    Ok(row)
}

fn query_listings(
    conn: &Connection,
    filter: &str,
    user: Uuid,
    counterpart: Option<Uuid>,
) -> Result<Vec<ItemListingRow>> {
    let sql = format!("{} {} ORDER BY i.borrowed_at DESC", LISTING_SELECT, filter);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params![user.to_string(), counterpart.map(|c| c.to_string())],
            |row| {
                Ok(ItemListingRow {
                    item: ItemRow::from_row_at(row, 0)?,
                    borrower: UserSummaryRow {
                        id: parse_col(row, 9)?,
                        name: row.get(10)?,
                        profile_image_url: row.get(11)?,
                    },
                    lender: UserSummaryRow {
                        id: parse_col(row, 12)?,
                        name: row.get(13)?,
                        profile_image_url: row.get(14)?,
                    },
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn user_name(conn: &Connection, id: Uuid) -> Result<String> {
    query_user_by_id(conn, id)?
        .map(|u| u.name)
        .ok_or_else(|| anyhow::anyhow!("user {} not found", id))
}
