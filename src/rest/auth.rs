//! Bearer-token authentication.
//!
//! Tokens are 32 random bytes, hex-encoded, handed out by `POST
//! /api/auth/login` and stored in the auth_tokens table. Handlers resolve the
//! principal explicitly via [`current_user`] / [`require_user`] — there is no
//! ambient request identity.

use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use rand_core::{OsRng, RngCore};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::rest::error::ApiError;
use crate::storage::UserRow;
use crate::AppContext;

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!("salt encoding failed: {e}"))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn generate_token() -> String {
    let mut buf = [0u8; 32];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the request to a principal, or `None` for anonymous callers.
pub async fn current_user(
    ctx: &AppContext,
    headers: &HeaderMap,
) -> Result<Option<UserRow>, ApiError> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };
    Ok(ctx.storage.find_user_by_token(token).await?)
}

pub async fn require_user(ctx: &AppContext, headers: &HeaderMap) -> Result<UserRow, ApiError> {
    current_user(ctx, headers)
        .await?
        .ok_or(ApiError::Unauthenticated)
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<LoginRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = ctx.storage.get_user_by_username(&body.username).await?;
    let user = match user {
        Some(user) if verify_password(&body.password, &user.password_hash) => user,
        // Same response for unknown user and wrong password.
        _ => {
            return Ok((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "Invalid username or password." })),
            ))
        }
    };

    let token = generate_token();
    ctx.storage.insert_token(&token, &user.id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "token": token,
            "user": { "id": user.id, "username": user.username, "email": user.email },
        })),
    ))
}

pub async fn logout(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Some(token) = bearer_token(&headers) else {
        return Err(ApiError::Unauthenticated);
    };
    if ctx.storage.delete_token(token).await? {
        Ok((StatusCode::OK, Json(json!({ "detail": "Logged out." }))))
    } else {
        Err(ApiError::Unauthenticated)
    }
}
