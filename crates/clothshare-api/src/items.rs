use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use clothshare_db::items::{LoanOutcome, NudgeOutcome};
use clothshare_db::nudge::{NudgeDenial, NudgePolicy};
use clothshare_types::api::{
    ClothItemResponse, ClothItemWithUsers, CreateItemRequest, ItemListQuery, NudgeResponse,
};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, with_db};

/// POST /items. The caller records an item they borrowed from `lender_id`.
pub async fn create(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<CreateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.lender_id == me.id {
        return Err(ApiError::validation("Cannot borrow from yourself"));
    }
    if req.image_url.trim().is_empty() {
        return Err(ApiError::validation("image_url is required"));
    }

    let outcome = with_db(&state, move |db| {
        db.create_loan(
            me.id,
            req.lender_id,
            &req.image_url,
            req.description.as_deref(),
            Utc::now(),
        )
    })
    .await?;

    match outcome {
        LoanOutcome::Created(item) => Ok((StatusCode::CREATED, Json(ClothItemResponse::from(item)))),
        LoanOutcome::SelfLoan => Err(ApiError::validation("Cannot borrow from yourself")),
        LoanOutcome::NotFriends => Err(ApiError::validation("You can only borrow from friends")),
    }
}

pub async fn list_borrowed(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Query(query): Query<ItemListQuery>,
) -> Result<Json<Vec<ClothItemWithUsers>>, ApiError> {
    let rows = with_db(&state, move |db| db.list_borrowed(me.id, query.friend_id)).await?;
    Ok(Json(rows.into_iter().map(ClothItemWithUsers::from).collect()))
}

pub async fn list_lent(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Query(query): Query<ItemListQuery>,
) -> Result<Json<Vec<ClothItemWithUsers>>, ApiError> {
    let rows = with_db(&state, move |db| db.list_lent(me.id, query.friend_id)).await?;
    Ok(Json(rows.into_iter().map(ClothItemWithUsers::from).collect()))
}

/// GET /items/{id}. Only the borrower and the lender may look.
pub async fn get(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ClothItemResponse>, ApiError> {
    let item = with_db(&state, move |db| db.get_item(item_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;
    if !item.involves(me.id) {
        return Err(ApiError::forbidden("Not authorized to view this item"));
    }
    Ok(Json(item.into()))
}

pub async fn request_return(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ClothItemResponse>, ApiError> {
    let item = with_db(&state, move |db| db.request_return(item_id, me.id, Utc::now()))
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found or cannot request return"))?;
    Ok(Json(item.into()))
}

pub async fn approve_return(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ClothItemResponse>, ApiError> {
    let item = with_db(&state, move |db| db.approve_return(item_id, me.id, Utc::now()))
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found or cannot approve return"))?;
    Ok(Json(item.into()))
}

pub async fn reject_return(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ClothItemResponse>, ApiError> {
    let item = with_db(&state, move |db| db.reject_return(item_id, me.id))
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found or cannot reject return"))?;
    Ok(Json(item.into()))
}

/// POST /items/{id}/nudge. The lender reminds the borrower, rate limited
/// per item.
pub async fn nudge(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<NudgeResponse>, ApiError> {
    let actor = me.id;
    let outcome = with_db(&state, move |db| {
        db.send_nudge(item_id, actor, &NudgePolicy::default(), Utc::now())
    })
    .await?;

    match outcome {
        NudgeOutcome::Sent(_) => Ok(Json(NudgeResponse {
            message: "Nudge sent".into(),
        })),
        NudgeOutcome::ItemNotFound => Err(ApiError::not_found("Item not found")),
        NudgeOutcome::NotLender => Err(ApiError::forbidden("Only the lender can send a nudge")),
        NudgeOutcome::NotBorrowed(status) => Err(ApiError::validation(format!(
            "Cannot nudge an item that is {}",
            status
        ))),
        NudgeOutcome::Denied(denial) => {
            warn!("Nudge by {} for item {} rate limited", actor, item_id);
            Err(ApiError::RateLimited(denial_message(denial)))
        }
    }
}

fn denial_message(denial: NudgeDenial) -> String {
    match denial {
        NudgeDenial::CoolingDown { remaining_minutes } => format!(
            "Please wait {} more minute(s) before nudging again",
            remaining_minutes
        ),
        NudgeDenial::DailyCapReached => "Daily nudge limit reached for this item".into(),
    }
}
