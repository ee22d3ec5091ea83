use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use uuid::Uuid;

use clothshare_types::api::TokenKind;

use crate::error::ApiError;
use crate::{AppState, with_db};

/// The authenticated caller, placed in request extensions by `require_auth`.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: Uuid,
}

/// Validate the bearer access token and load the user it names.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|_| ApiError::Unauthorized)?;
    let claims = state.jwt.verify(bearer.token(), TokenKind::Access)?;

    let user_id = claims.sub;
    // a token can outlive its account
    let user = with_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(CurrentUser { id: user.id });
    Ok(next.run(req).await)
}
