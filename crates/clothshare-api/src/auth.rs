use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use clothshare_types::api::{
    Claims, LoginRequest, RefreshRequest, RegisterRequest, TokenKind, TokenResponse, UserResponse,
};

use crate::error::ApiError;
use crate::{AppState, blocking, with_db};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Signing material and lifetimes for access and refresh tokens.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue(&self, user: Uuid, kind: TokenKind, now: DateTime<Utc>) -> anyhow::Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user,
            kind,
            exp: (now + ttl).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn issue_pair(&self, user: Uuid, now: DateTime<Utc>) -> anyhow::Result<TokenResponse> {
        Ok(TokenResponse {
            access_token: self.issue(user, TokenKind::Access, now)?,
            refresh_token: self.issue(user, TokenKind::Refresh, now)?,
            token_type: "bearer".into(),
        })
    }

    /// Decode a token and check that it is of the expected kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| ApiError::Unauthorized)?;
        if data.claims.kind != expected {
            return Err(ApiError::Unauthorized);
        }
        Ok(data.claims)
    }
}

/// Hash with Argon2id and a random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Name must not be empty"));
    }
    Ok(name.to_string())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Invalid email address"));
    }
    validate_password(&req.password)?;
    let name = validate_name(&req.name)?;

    let password = req.password;
    let password_hash = blocking(move || hash_password(&password)).await?;

    let user = with_db(&state, move |db| {
        db.create_user(Uuid::new_v4(), &email, &name, &password_hash, Utc::now())
    })
    .await?
    .ok_or_else(|| ApiError::validation("Email already registered"))?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = req.email.trim().to_string();
    let user = with_db(&state, move |db| db.get_user_by_email(&email)).await?;

    // Unknown email and wrong password look the same to the caller
    let Some(user) = user else {
        warn!("Login failed: unknown email");
        return Err(ApiError::Unauthorized);
    };
    let hash = user.password_hash.clone();
    let password = req.password;
    if !blocking(move || Ok(verify_password(&password, &hash))).await? {
        warn!("Login failed for user {}", user.id);
        return Err(ApiError::Unauthorized);
    }

    info!("User {} logged in", user.id);
    Ok(Json(state.jwt.issue_pair(user.id, Utc::now())?))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let claims = state.jwt.verify(&req.refresh_token, TokenKind::Refresh)?;

    let user_id = claims.sub;
    with_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(state.jwt.issue_pair(user_id, Utc::now())?))
}
