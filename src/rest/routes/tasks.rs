//! Task CRUD plus the assign/unassign workflow actions.
//!
//! Reads are open to anonymous callers; create requires a principal; update
//! and delete are gated by the task write-gate. Assign/unassign always act on
//! the requesting principal's own (user, task) pair — there is no way to
//! assign somebody else.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::model;
use crate::policy::{self, Principal};
use crate::rest::routes::assignments::assignment_json;
use crate::rest::{auth, error::ApiError, pagination};
use crate::storage::{AssignOutcome, TaskFilter, TaskOrdering, TaskRow};
use crate::AppContext;

const TASK_NOT_FOUND: &str = "Not found.";

pub fn task_json(task: &TaskRow) -> Value {
    json!({
        "id": task.id,
        "title": task.title,
        "description": task.description,
        "due_date": task.due_date,
        "creator": task.creator_id,
        "priority": task.priority,
        "status": task.status,
        "created_at": task.created_at,
        "assigned_count": task.assigned_count,
    })
}

/// Shared body for create/PUT/PATCH. `due_date` distinguishes "absent" from
/// an explicit null (which clears the date on update).
#[derive(Debug, Default, Deserialize)]
pub struct TaskWriteRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn task_filter(params: &HashMap<String, String>) -> Result<TaskFilter, ApiError> {
    let mut filter = TaskFilter::default();
    if let Some(title) = params.get("title") {
        filter.title = Some(title.clone());
    }
    if let Some(raw) = params.get("due_date_after") {
        filter.due_after = Some(model::normalize_datetime(raw, "due_date_after")?);
    }
    if let Some(raw) = params.get("due_date_before") {
        filter.due_before = Some(model::normalize_datetime(raw, "due_date_before")?);
    }
    if let Some(status) = params.get("status") {
        filter.status = Some(status.clone());
    }
    if let Some(search) = params.get("search") {
        filter.search = Some(search.clone());
    }
    if let Some(raw) = params.get("upcoming") {
        if model::is_truthy(raw) {
            filter.upcoming_after = Some(Utc::now().to_rfc3339());
        }
    }
    if let Some(raw) = params.get("ordering") {
        // Unknown ordering values fall back to the default rather than erroring.
        if let Some(ordering) = TaskOrdering::parse(raw) {
            filter.ordering = ordering;
        }
    }
    Ok(filter)
}

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let filter = task_filter(&params)?;
    let page = pagination::page_params(&params, &ctx.config.pagination)?;
    let count = ctx.storage.count_tasks(&filter).await?;
    let rows = ctx
        .storage
        .list_tasks(&filter, page.limit(), page.offset())
        .await?;
    let results = rows.iter().map(task_json).collect();
    let body = pagination::envelope("/api/tasks", &params, &page, count, results)?;
    Ok((StatusCode::OK, Json(body)))
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<TaskWriteRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = auth::require_user(&ctx, &headers).await?;

    let title = body
        .title
        .as_deref()
        .ok_or_else(|| ApiError::validation("title", "This field is required."))?;
    model::validate_title(title)?;
    let description = body.description.as_deref().unwrap_or("");
    let due_date = match body.due_date.flatten() {
        Some(raw) => Some(model::validate_due_date(&raw, Utc::now())?),
        None => None,
    };
    let priority = match body.priority.as_deref() {
        Some(raw) => model::validate_priority(raw)?,
        None => Default::default(),
    };
    let status = match body.status.as_deref() {
        Some(raw) => model::validate_status(raw)?,
        None => Default::default(),
    };

    let task = ctx
        .storage
        .create_task(
            title,
            description,
            due_date.as_deref(),
            priority.as_str(),
            status.as_str(),
            &user.id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(task_json(&task))))
}

pub async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let task = ctx
        .storage
        .get_task(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(TASK_NOT_FOUND))?;
    Ok((StatusCode::OK, Json(task_json(&task))))
}

pub async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<TaskWriteRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    apply_task_update(&ctx, &id, &headers, body, true).await
}

pub async fn patch_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<TaskWriteRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    apply_task_update(&ctx, &id, &headers, body, false).await
}

async fn apply_task_update(
    ctx: &AppContext,
    id: &str,
    headers: &HeaderMap,
    body: TaskWriteRequest,
    require_title: bool,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = auth::require_user(ctx, headers).await?;
    let task = ctx
        .storage
        .get_task(id)
        .await?
        .ok_or_else(|| ApiError::not_found(TASK_NOT_FOUND))?;
    if !policy::can_write_task(&Principal::from_user(&user), &task) {
        return Err(ApiError::Forbidden);
    }

    if require_title && body.title.is_none() {
        return Err(ApiError::validation("title", "This field is required."));
    }
    if let Some(title) = body.title.as_deref() {
        model::validate_title(title)?;
    }
    let due_update = match &body.due_date {
        None => None,
        Some(None) => Some(None),
        Some(Some(raw)) => Some(Some(model::validate_due_date(raw, Utc::now())?)),
    };
    if let Some(raw) = body.priority.as_deref() {
        model::validate_priority(raw)?;
    }
    if let Some(raw) = body.status.as_deref() {
        model::validate_status(raw)?;
    }

    ctx.storage
        .update_task(
            id,
            body.title.as_deref(),
            body.description.as_deref(),
            due_update.as_ref().map(|due| due.as_deref()),
            body.priority.as_deref(),
            body.status.as_deref(),
        )
        .await?;
    let task = ctx
        .storage
        .get_task(id)
        .await?
        .ok_or_else(|| ApiError::not_found(TASK_NOT_FOUND))?;
    Ok((StatusCode::OK, Json(task_json(&task))))
}

pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user = auth::require_user(&ctx, &headers).await?;
    let task = ctx
        .storage
        .get_task(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(TASK_NOT_FOUND))?;
    if !policy::can_write_task(&Principal::from_user(&user), &task) {
        return Err(ApiError::Forbidden);
    }
    ctx.storage.delete_task(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Assignment actions ──────────────────────────────────────────────────────

pub async fn assign(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = auth::require_user(&ctx, &headers).await?;
    let task = ctx
        .storage
        .get_task(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(TASK_NOT_FOUND))?;

    match ctx.storage.assign_user(&user.id, &task.id).await? {
        AssignOutcome::AlreadyAssigned(status) => Ok((
            StatusCode::OK,
            Json(json!({
                "detail": "You are already assigned to this task.",
                "status": status,
            })),
        )),
        AssignOutcome::Created(row) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "detail": "Task assigned successfully.",
                "assignment": assignment_json(&row),
            })),
        )),
    }
}

pub async fn unassign(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = auth::require_user(&ctx, &headers).await?;
    let task = ctx
        .storage
        .get_task(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(TASK_NOT_FOUND))?;

    if ctx.storage.unassign_user(&user.id, &task.id).await? {
        Ok((
            StatusCode::OK,
            Json(json!({ "detail": "Unassigned successfully." })),
        ))
    } else {
        Err(ApiError::not_found("You are not assigned to this task."))
    }
}
