//! Playbook API routes

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::domain::{Finding, FindingSource, ResourceEvent, ResourceTarget};
use crate::playbooks::registry::PlaybookInfo;

use super::{ApiResponse, AppError, AppState};

/// Create playbook routes
pub fn playbook_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_playbooks))
        .route("/:name/trigger", post(trigger_playbook))
        .route("/:name/event", post(push_event))
}

/// Result of one playbook invocation
#[derive(Debug, Serialize)]
pub struct InvocationResult {
    pub finding: Option<Finding>,
}

async fn list_playbooks(State(state): State<AppState>) -> Json<ApiResponse<Vec<PlaybookInfo>>> {
    Json(ApiResponse::new(state.registry.list()))
}

async fn trigger_playbook(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(target): Json<ResourceTarget>,
) -> Result<Json<ApiResponse<InvocationResult>>, AppError> {
    if target.name.is_empty() {
        return Err(AppError::BadRequest("Resource name is required".to_string()));
    }

    tracing::info!("Trigger of {} for {} {}", name, target.kind, target.name);

    let finding = state
        .registry
        .trigger(&name, &target, &state.ctx, FindingSource::KubernetesApiServer)
        .await?;

    Ok(Json(ApiResponse::new(InvocationResult { finding })))
}

async fn push_event(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(event): Json<ResourceEvent>,
) -> Result<Json<ApiResponse<InvocationResult>>, AppError> {
    let finding = state
        .registry
        .dispatch(&name, &event, &state.ctx, FindingSource::Webhook)
        .await?;

    Ok(Json(ApiResponse::new(InvocationResult { finding })))
}
