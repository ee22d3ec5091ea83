use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use clothshare_db::friendships::FriendRequestOutcome;
use clothshare_types::api::{FriendInfo, FriendRequestCreate, FriendRequestItem, FriendshipResponse};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, with_db};

/// POST /friends/request. The recipient is named by id or by email.
pub async fn send_request(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<FriendRequestCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let recipient = match (req.friend_id, req.friend_email) {
        (Some(id), _) => id,
        (None, Some(email)) => {
            let email = email.trim().to_string();
            with_db(&state, move |db| db.get_user_by_email(&email))
                .await?
                .map(|u| u.id)
                .ok_or_else(|| ApiError::not_found("User not found"))?
        }
        (None, None) => {
            return Err(ApiError::validation("Either friend_email or friend_id is required"));
        }
    };

    let sender = me.id;
    let outcome = with_db(&state, move |db| {
        db.create_friend_request(sender, recipient, Utc::now())
    })
    .await?;

    match outcome {
        FriendRequestOutcome::Created(row) => {
            Ok((StatusCode::CREATED, Json(FriendshipResponse::from(row))))
        }
        FriendRequestOutcome::SelfRequest => Err(ApiError::validation(
            "Cannot send a friend request to yourself",
        )),
        FriendRequestOutcome::RecipientNotFound => Err(ApiError::not_found("User not found")),
        FriendRequestOutcome::AlreadyFriends => {
            warn!("Friend request {} -> {} refused: already friends", sender, recipient);
            Err(ApiError::Conflict("Already friends".into()))
        }
        FriendRequestOutcome::AlreadyPending => {
            warn!("Friend request {} -> {} refused: already pending", sender, recipient);
            Err(ApiError::Conflict("Friend request already pending".into()))
        }
    }
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<Json<Vec<FriendInfo>>, ApiError> {
    let rows = with_db(&state, move |db| db.list_friends(me.id)).await?;
    Ok(Json(rows.into_iter().map(FriendInfo::from).collect()))
}

pub async fn received_requests(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<Json<Vec<FriendRequestItem>>, ApiError> {
    let rows = with_db(&state, move |db| db.list_received_requests(me.id)).await?;
    Ok(Json(rows.into_iter().map(FriendRequestItem::from).collect()))
}

pub async fn sent_requests(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<Json<Vec<FriendRequestItem>>, ApiError> {
    let rows = with_db(&state, move |db| db.list_sent_requests(me.id)).await?;
    Ok(Json(rows.into_iter().map(FriendRequestItem::from).collect()))
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(friendship_id): Path<Uuid>,
) -> Result<Json<FriendshipResponse>, ApiError> {
    let row = with_db(&state, move |db| db.accept_friend_request(friendship_id, me.id))
        .await?
        .ok_or_else(|| ApiError::not_found("Friend request not found"))?;
    Ok(Json(row.into()))
}

pub async fn reject(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(friendship_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !with_db(&state, move |db| db.reject_friend_request(friendship_id, me.id)).await? {
        return Err(ApiError::not_found("Friend request not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(friendship_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !with_db(&state, move |db| db.delete_friendship(friendship_id, me.id)).await? {
        return Err(ApiError::not_found("Friendship not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
