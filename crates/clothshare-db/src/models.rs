//! Database row types. Distinct from the clothshare-types API models so the
//! DB layer stays independent; `From` impls below do the mapping.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use clothshare_types::api::{
    ClothItemResponse, ClothItemWithUsers, FriendInfo, FriendRequestItem, FriendshipResponse,
    NotificationResponse, UserResponse, UserSummary,
};
use clothshare_types::models::{FriendshipStatus, ItemStatus, NotificationKind};

pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FriendshipRow {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
}

/// The user on the other side of a friendship row.
#[derive(Debug, Clone)]
pub struct CounterpartRow {
    pub friendship_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub profile_image_url: Option<String>,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ItemRow {
    pub id: Uuid,
    pub borrower_id: Uuid,
    pub lender_id: Uuid,
    pub image_url: String,
    pub description: Option<String>,
    pub status: ItemStatus,
    pub borrowed_at: DateTime<Utc>,
    pub return_requested_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct UserSummaryRow {
    pub id: Uuid,
    pub name: String,
    pub profile_image_url: Option<String>,
}

/// An item joined with both parties, as returned by the borrowed/lent lists.
#[derive(Debug, Clone)]
pub struct ItemListingRow {
    pub item: ItemRow,
    pub borrower: UserSummaryRow,
    pub lender: UserSummaryRow,
}

#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub related_item_id: Option<Uuid>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// -- Column decoding --

/// Parse a TEXT column through `FromStr`, surfacing failures as rusqlite
/// conversion errors so they flow through `query_map` like any other.
pub(crate) fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub(crate) const USER_COLUMNS: &str =
    "id, email, name, password_hash, profile_image_url, created_at, updated_at";

impl UserRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_col(row, 0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            password_hash: row.get(3)?,
            profile_image_url: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

pub(crate) const FRIENDSHIP_COLUMNS: &str = "id, user_a, user_b, status, created_at";

impl FriendshipRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_col(row, 0)?,
            user_a: parse_col(row, 1)?,
            user_b: parse_col(row, 2)?,
            status: parse_col(row, 3)?,
            created_at: row.get(4)?,
        })
    }
}

pub(crate) const ITEM_COLUMNS: &str = "id, borrower_id, lender_id, image_url, description, status, \
     borrowed_at, return_requested_at, returned_at";

impl ItemRow {
    /// Decode the nine item columns starting at `offset`.
    pub(crate) fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_col(row, offset)?,
            borrower_id: parse_col(row, offset + 1)?,
            lender_id: parse_col(row, offset + 2)?,
            image_url: row.get(offset + 3)?,
            description: row.get(offset + 4)?,
            status: parse_col(row, offset + 5)?,
            borrowed_at: row.get(offset + 6)?,
            return_requested_at: row.get(offset + 7)?,
            returned_at: row.get(offset + 8)?,
        })
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Self::from_row_at(row, 0)
    }

    pub fn involves(&self, user: Uuid) -> bool {
        self.borrower_id == user || self.lender_id == user
    }
}

pub(crate) const NOTIFICATION_COLUMNS: &str =
    "id, user_id, type, related_item_id, message, is_read, created_at";

impl NotificationRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_col(row, 0)?,
            user_id: parse_col(row, 1)?,
            kind: parse_col(row, 2)?,
            related_item_id: parse_opt_col(row, 3)?,
            message: row.get(4)?,
            is_read: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

// -- API mapping --

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            profile_image_url: row.profile_image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<FriendshipRow> for FriendshipResponse {
    fn from(row: FriendshipRow) -> Self {
        Self {
            id: row.id,
            user_a: row.user_a,
            user_b: row.user_b,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

impl From<CounterpartRow> for FriendInfo {
    fn from(row: CounterpartRow) -> Self {
        Self {
            id: row.user_id,
            name: row.name,
            email: row.email,
            profile_image_url: row.profile_image_url,
        }
    }
}

impl From<CounterpartRow> for FriendRequestItem {
    fn from(row: CounterpartRow) -> Self {
        Self {
            friendship_id: row.friendship_id,
            user_id: row.user_id,
            user_email: row.email,
            user_name: row.name,
            user_profile_image: row.profile_image_url,
            requested_at: row.since,
        }
    }
}

impl From<ItemRow> for ClothItemResponse {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            borrower_id: row.borrower_id,
            lender_id: row.lender_id,
            image_url: row.image_url,
            description: row.description,
            status: row.status,
            borrowed_at: row.borrowed_at,
            return_requested_at: row.return_requested_at,
            returned_at: row.returned_at,
        }
    }
}

impl From<UserSummaryRow> for UserSummary {
    fn from(row: UserSummaryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            profile_image_url: row.profile_image_url,
        }
    }
}

impl From<ItemListingRow> for ClothItemWithUsers {
    fn from(row: ItemListingRow) -> Self {
        Self {
            item: row.item.into(),
            borrower: row.borrower.into(),
            lender: row.lender.into(),
        }
    }
}

impl From<NotificationRow> for NotificationResponse {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            message: row.message,
            related_item_id: row.related_item_id,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}
