//! User management: open signup, self-or-admin everything else.
//!
//! `is_staff` is read-only surface: it appears in responses for staff viewers
//! but is never accepted as input. Staff users are minted out-of-band via
//! `taskd create-admin`.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::model;
use crate::policy::{self, Principal};
use crate::rest::{auth, error::ApiError, pagination};
use crate::storage::{self, UserRow};
use crate::AppContext;

const USER_NOT_FOUND: &str = "Not found.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";

fn user_json(user: &UserRow, viewer_is_staff: bool) -> Value {
    let mut body = json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
    });
    if viewer_is_staff {
        body["is_staff"] = json!(user.is_staff);
    }
    body
}

#[derive(Debug, Default, Deserialize)]
pub struct UserWriteRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn list_users(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let viewer = auth::require_user(&ctx, &headers).await?;
    let page = pagination::page_params(&params, &ctx.config.pagination)?;
    let count = ctx.storage.count_users().await?;
    let rows = ctx.storage.list_users(page.limit(), page.offset()).await?;
    let results = rows
        .iter()
        .map(|user| user_json(user, viewer.is_staff))
        .collect();
    let body = pagination::envelope("/api/users", &params, &page, count, results)?;
    Ok((StatusCode::OK, Json(body)))
}

/// Signup — the one endpoint open to anonymous callers.
pub async fn create_user(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<UserWriteRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let username = body
        .username
        .as_deref()
        .ok_or_else(|| ApiError::validation("username", "This field is required."))?;
    model::validate_username(username)?;
    let email = body.email.as_deref().unwrap_or("");
    if !email.is_empty() {
        model::validate_email(email)?;
    }
    let password = body
        .password
        .as_deref()
        .ok_or_else(|| ApiError::validation("password", "This field is required."))?;
    model::validate_password(password)?;

    let hash = auth::hash_password(password)?;
    match ctx.storage.create_user(username, email, &hash, false).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(user_json(&user, false)))),
        Err(err) if storage::is_unique_violation(&err) => {
            Err(ApiError::validation("username", USERNAME_TAKEN))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn get_user(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let viewer = auth::require_user(&ctx, &headers).await?;
    let user = ctx
        .storage
        .get_user(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;
    if !policy::can_access_user(&Principal::from_user(&viewer), &user.id) {
        return Err(ApiError::Forbidden);
    }
    Ok((StatusCode::OK, Json(user_json(&user, viewer.is_staff))))
}

pub async fn update_user(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UserWriteRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    apply_user_update(&ctx, &id, &headers, body, true).await
}

pub async fn patch_user(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UserWriteRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    apply_user_update(&ctx, &id, &headers, body, false).await
}

async fn apply_user_update(
    ctx: &AppContext,
    id: &str,
    headers: &HeaderMap,
    body: UserWriteRequest,
    require_username: bool,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let viewer = auth::require_user(ctx, headers).await?;
    let user = ctx
        .storage
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;
    if !policy::can_access_user(&Principal::from_user(&viewer), &user.id) {
        return Err(ApiError::Forbidden);
    }

    if require_username && body.username.is_none() {
        return Err(ApiError::validation("username", "This field is required."));
    }
    if let Some(username) = body.username.as_deref() {
        model::validate_username(username)?;
    }
    if let Some(email) = body.email.as_deref() {
        if !email.is_empty() {
            model::validate_email(email)?;
        }
    }
    let password_hash = match body.password.as_deref() {
        Some(password) => {
            model::validate_password(password)?;
            Some(auth::hash_password(password)?)
        }
        None => None,
    };

    let result = ctx
        .storage
        .update_user(
            id,
            body.username.as_deref(),
            body.email.as_deref(),
            password_hash.as_deref(),
        )
        .await;
    match result {
        Ok(()) => {}
        Err(err) if storage::is_unique_violation(&err) => {
            return Err(ApiError::validation("username", USERNAME_TAKEN))
        }
        Err(err) => return Err(err.into()),
    }

    let user = ctx
        .storage
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;
    Ok((StatusCode::OK, Json(user_json(&user, viewer.is_staff))))
}

pub async fn delete_user(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let viewer = auth::require_user(&ctx, &headers).await?;
    let user = ctx
        .storage
        .get_user(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;
    if !policy::can_access_user(&Principal::from_user(&viewer), &user.id) {
        return Err(ApiError::Forbidden);
    }
    ctx.storage.delete_user(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
