use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use clothshare_types::api::{NotificationQuery, NotificationResponse};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, with_db};

pub async fn list(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    let rows = with_db(&state, move |db| {
        db.list_notifications(me.id, query.skip, query.limit)
    })
    .await?;
    Ok(Json(rows.into_iter().map(NotificationResponse::from).collect()))
}

/// Someone else's notification answers 404, same as a missing one.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let row = with_db(&state, move |db| db.mark_read(notification_id, me.id))
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;
    Ok(Json(row.into()))
}
