use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{FriendshipStatus, ItemStatus, NotificationKind};

// -- JWT Claims --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims for both access and refresh tokens. `kind` keeps a refresh
/// token from being accepted where an access token is expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub kind: TokenKind,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub password: Option<String>,
    /// Absent leaves the image alone, `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub profile_image_url: Option<Option<String>>,
}

/// Wraps whatever was sent, `null` included, in `Some`. With
/// `#[serde(default)]` a missing field stays `None`.
fn present<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub profile_image_url: Option<String>,
}

// -- Friends --

/// Either `friend_email` or `friend_id` identifies the recipient.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FriendRequestCreate {
    pub friend_email: Option<String>,
    pub friend_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendshipResponse {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub profile_image_url: Option<String>,
}

/// A pending request together with the user on the other side of it:
/// the sender for received requests, the recipient for sent ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequestItem {
    pub friendship_id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub user_name: String,
    pub user_profile_image: Option<String>,
    pub requested_at: DateTime<Utc>,
}

// -- Items --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateItemRequest {
    pub lender_id: Uuid,
    pub image_url: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    pub friend_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClothItemResponse {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClothItemWithUsers {
    #[serde(flatten)]
    pub item: ClothItemResponse,
    pub borrower: UserSummary,
    pub lender: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NudgeResponse {
    pub message: String,
}

// -- Notifications --

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_notification_limit")]
    pub limit: u32,
}

fn default_notification_limit() -> u32 {
    100
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_notification_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub related_item_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// -- Uploads --

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageUploadResponse {
    pub image_url: String,
    pub filename: String,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_image_update_distinguishes_absent_from_null() {
        let absent: UpdateUserRequest = serde_json::from_str(r#"{"name": "Alice"}"#).unwrap();
        assert_eq!(absent.profile_image_url, None);

        let cleared: UpdateUserRequest =
            serde_json::from_str(r#"{"profile_image_url": null}"#).unwrap();
        assert_eq!(cleared.profile_image_url, Some(None));

        let set: UpdateUserRequest =
            serde_json::from_str(r#"{"profile_image_url": "/uploads/a.png"}"#).unwrap();
        assert_eq!(set.profile_image_url, Some(Some("/uploads/a.png".to_string())));
    }
}
