use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use clothshare_db::users::UserChanges;
use clothshare_types::api::{UpdateUserRequest, UserResponse};

use crate::auth::{hash_password, validate_name, validate_password};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, blocking, with_db};

pub async fn get_me(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = with_db(&state, move |db| db.get_user_by_id(me.id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user.into()))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let name = req.name.as_deref().map(validate_name).transpose()?;
    let password_hash = match req.password {
        Some(password) => {
            validate_password(&password)?;
            Some(blocking(move || hash_password(&password)).await?)
        }
        None => None,
    };

    let changes = UserChanges {
        name,
        password_hash,
        profile_image_url: req.profile_image_url,
    };
    let user = with_db(&state, move |db| db.update_user(me.id, changes, Utc::now()))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user.into()))
}

pub async fn delete_me(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    if !with_db(&state, move |db| db.delete_user(me.id)).await? {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = with_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user.into()))
}
