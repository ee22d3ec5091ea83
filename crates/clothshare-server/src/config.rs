use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Server settings, read from `CLOTHSHARE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub upload_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = match get("CLOTHSHARE_JWT_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("CLOTHSHARE_JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        Ok(Self {
            host: var("CLOTHSHARE_HOST", "0.0.0.0"),
            port: var("CLOTHSHARE_PORT", "8000")
                .parse()
                .context("CLOTHSHARE_PORT must be a port number")?,
            db_path: PathBuf::from(var("CLOTHSHARE_DB_PATH", "clothshare.db")),
            jwt_secret,
            access_token_minutes: var("CLOTHSHARE_ACCESS_TOKEN_MINUTES", "60")
                .parse()
                .context("CLOTHSHARE_ACCESS_TOKEN_MINUTES must be an integer")?,
            refresh_token_days: var("CLOTHSHARE_REFRESH_TOKEN_DAYS", "7")
                .parse()
                .context("CLOTHSHARE_REFRESH_TOKEN_DAYS must be an integer")?,
            upload_dir: PathBuf::from(var("CLOTHSHARE_UPLOAD_DIR", "./uploads")),
        })
    }
}
