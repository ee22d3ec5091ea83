mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use clothshare_api::auth::JwtKeys;
use clothshare_api::storage::Storage;
use clothshare_api::{AppState, AppStateInner};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clothshare=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = clothshare_db::Database::open(&config.db_path)?;
    let storage = Storage::new(config.upload_dir.clone()).await?;
    let jwt = JwtKeys::new(
        &config.jwt_secret,
        Duration::minutes(config.access_token_minutes),
        Duration::days(config.refresh_token_days),
    );

    let state: AppState = Arc::new(AppStateInner { db, jwt, storage });

    let app = clothshare_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("ClothShare server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
