pub mod auth;
pub mod error;
pub mod friends;
pub mod items;
pub mod middleware;
pub mod notifications;
pub mod storage;
pub mod upload;
pub mod users;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tower_http::services::ServeDir;
use tracing::error;

use clothshare_db::Database;

use crate::auth::JwtKeys;
use crate::error::ApiError;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt: JwtKeys,
    pub storage: Storage,
}

/// The whole HTTP surface. CORS and request tracing are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh));

    let protected_routes = Router::new()
        .route(
            "/users/me",
            get(users::get_me).put(users::update_me).delete(users::delete_me),
        )
        .route("/users/{user_id}", get(users::get_user))
        .route("/friends", get(friends::list_friends))
        .route("/friends/request", post(friends::send_request))
        .route("/friends/requests/received", get(friends::received_requests))
        .route("/friends/requests/sent", get(friends::sent_requests))
        .route("/friends/{friendship_id}", delete(friends::remove))
        .route("/friends/{friendship_id}/accept", post(friends::accept))
        .route("/friends/{friendship_id}/reject", post(friends::reject))
        .route("/items", post(items::create))
        .route("/items/borrowed", get(items::list_borrowed))
        .route("/items/lent", get(items::list_lent))
        .route("/items/{item_id}", get(items::get))
        .route("/items/{item_id}/request-return", post(items::request_return))
        .route("/items/{item_id}/approve-return", post(items::approve_return))
        .route("/items/{item_id}/reject-return", post(items::reject_return))
        .route("/items/{item_id}/nudge", post(items::nudge))
        .route("/notifications", get(notifications::list))
        .route("/notifications/{notification_id}/read", post(notifications::mark_read))
        .route(
            "/upload/image",
            // headroom over the image limit for the multipart framing
            post(upload::upload_image).layer(DefaultBodyLimit::max(upload::MAX_IMAGE_SIZE + 64 * 1024)),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", public_routes.merge(protected_routes))
        .nest_service("/uploads", ServeDir::new(state.storage.dir()))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "ClothShare API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Run blocking work (DB calls, password hashing) off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::Internal)
}

pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    blocking(move || f(&state.db)).await
}
