//! Read-only task-assignment listing.
//!
//! Non-staff callers only ever see rows where they are the assignee; detail
//! access additionally admits the referenced task's creator. Rows outside a
//! caller's scope answer 404, not 403 — their existence is not disclosed.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::policy::{self, Principal};
use crate::rest::{auth, error::ApiError, pagination};
use crate::storage::AssignmentRow;
use crate::AppContext;

pub fn assignment_json(assignment: &AssignmentRow) -> Value {
    json!({
        "id": assignment.id,
        "user": assignment.user_id,
        "task": assignment.task_id,
        "task_title": assignment.task_title,
        "task_due_date": assignment.task_due_date,
        "status": assignment.status,
        "created_at": assignment.created_at,
    })
}

pub async fn list_assignments(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = auth::require_user(&ctx, &headers).await?;
    let scope = (!user.is_staff).then_some(user.id.as_str());

    let page = pagination::page_params(&params, &ctx.config.pagination)?;
    let count = ctx.storage.count_assignments(scope).await?;
    let rows = ctx
        .storage
        .list_assignments(scope, page.limit(), page.offset())
        .await?;
    let results = rows.iter().map(assignment_json).collect();
    let body = pagination::envelope("/api/task-assignments", &params, &page, count, results)?;
    Ok((StatusCode::OK, Json(body)))
}

pub async fn get_assignment(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = auth::require_user(&ctx, &headers).await?;
    let assignment = ctx
        .storage
        .get_assignment(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;
    if !policy::can_access_assignment(&Principal::from_user(&user), &assignment) {
        return Err(ApiError::not_found("Not found."));
    }
    Ok((StatusCode::OK, Json(assignment_json(&assignment))))
}
