//! Route table and request handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use helmsman_core::ReconciliationRecord;
use helmsman_engine::AppRegistration;
use helmsman_source::DirSource;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/apps", get(list_apps).post(register_app))
        .route("/apps/{name}", delete(deregister_app))
        .route("/apps/{name}/status", get(app_status))
        .route("/apps/{name}/sync", post(sync_app))
        .route("/apps/{name}/pause", post(pause_app))
        .route("/apps/{name}/resume", post(resume_app))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_apps(State(state): State<AppState>) -> Json<Vec<ReconciliationRecord>> {
    Json(state.controller.status_all())
}

async fn app_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ReconciliationRecord>, ApiError> {
    let record = state.controller.status(&name)?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RegisterRequest {
    name: String,
    /// Root directory of the revision tree to reconcile from.
    root: String,
    /// Optional revision pin; the head revision is followed otherwise.
    #[serde(default)]
    revision: Option<String>,
}

async fn register_app(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }
    if body.root.trim().is_empty() {
        return Err(ApiError::BadRequest("root must not be empty".into()));
    }
    let source = Arc::new(DirSource::new(&body.root));
    state.controller.register(AppRegistration {
        name: body.name.clone(),
        source,
        revision: body.revision,
    })?;
    info!(app = %body.name, root = %body.root, "Application registered via API");
    Ok((StatusCode::CREATED, Json(json!({ "name": body.name }))))
}

async fn deregister_app(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.controller.deregister(&name)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_app(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.controller.force_sync(&name).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn pause_app(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.controller.pause(&name).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn resume_app(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.controller.resume(&name).await?;
    Ok(StatusCode::ACCEPTED)
}
