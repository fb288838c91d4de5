use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use serde_json::json;
use uuid::Uuid;

use crate::api::{is_valid_url, ApiError};
use crate::pipeline;
use crate::AppState;

pub async fn index() -> impl IntoResponse {
    Json(json!({
        "service": "Web Scraping Server",
        "version": "1.0.0",
        "endpoints": {
            "/scrape?url=<URL>": "Start scraping a URL (returns a task_id)",
            "/status/<task_id>": "Check a task's progress",
            "/result/<task_id>": "Fetch a completed task's result",
            "/tasks": "List task counts by status",
        },
    }))
}

pub async fn scrape(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let url = params.get("url").ok_or(ApiError::MissingUrlParameter)?;
    if !is_valid_url(url) {
        return Err(ApiError::InvalidUrl);
    }

    let task_id = state.registry.create(url.clone());

    let registry = state.registry.clone();
    let backend = state.backend.clone();
    let timesource = state.timesource.clone();
    let url = url.clone();
    tokio::spawn(async move {
        pipeline::run(task_id, url, registry, backend, timesource).await;
    });

    Ok(Json(json!({
        "task_id": task_id,
        "status": "pending",
        "url": params.get("url"),
        "message": "Task created. Use /status/{task_id} to check progress.",
    })))
}

pub async fn status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = parse_task_id(&task_id)?;
    state
        .registry
        .status(task_id)
        .map(Json)
        .ok_or(ApiError::TaskNotFound)
}

pub async fn result(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    use axum::http::StatusCode;
    use task_registry::TaskResultView;

    let task_id = parse_task_id(&task_id)?;
    let view = state.registry.result(task_id).ok_or(ApiError::TaskNotFound)?;
    let response = match view {
        TaskResultView::Done(value) => (StatusCode::OK, Json(value)),
        TaskResultView::Failed { error, status } => {
            (StatusCode::OK, Json(json!({"error": error, "status": status})))
        }
        TaskResultView::Pending { status, message } => (
            StatusCode::ACCEPTED,
            Json(json!({"message": message, "status": status})),
        ),
    };
    Ok(response)
}

/// Task ids are looked up as opaque strings, matching the original's
/// untyped lookup: a malformed id is just an unknown one, not a 400.
fn parse_task_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse().map_err(|_| ApiError::TaskNotFound)
}

pub async fn tasks(State(state): State<AppState>) -> impl IntoResponse {
    let counts = state.registry.counts();
    let total = counts.pending + counts.scraping + counts.processing + counts.completed + counts.failed;
    Json(json!({
        "total_tasks": total,
        "by_status": {
            "pending": counts.pending,
            "scraping": counts.scraping,
            "processing": counts.processing,
            "completed": counts.completed,
            "failed": counts.failed,
        },
    }))
}
