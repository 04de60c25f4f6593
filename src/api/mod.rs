//! REST API for holmes-playbooks

mod playbooks;

pub use playbooks::*;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::playbooks::{PlaybookContext, PlaybookError, PlaybookRegistry};

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta {
                timestamp: Utc::now(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: DateTime<Utc>,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
                details: None,
            },
        }
    }

    pub fn with_details(code: &str, message: &str, details: serde_json::Value) -> Self {
        Self {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
                details: Some(details),
            },
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    TriggerMismatch {
        message: String,
        expected: String,
        actual: String,
    },
    ClusterError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", &msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", &msg))
            }
            AppError::TriggerMismatch {
                message,
                expected,
                actual,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError::with_details(
                    "TRIGGER_MISMATCH",
                    &message,
                    serde_json::json!({ "expected": expected, "actual": actual }),
                ),
            ),
            AppError::ClusterError(msg) => {
                (StatusCode::BAD_GATEWAY, ApiError::new("CLUSTER_ERROR", &msg))
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<PlaybookError> for AppError {
    fn from(err: PlaybookError) -> Self {
        match &err {
            PlaybookError::NotFound(_) => AppError::NotFound(err.to_string()),
            PlaybookError::TriggerMismatch {
                expected, actual, ..
            } => AppError::TriggerMismatch {
                message: err.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            },
            PlaybookError::MissingResource(_) => AppError::BadRequest(err.to_string()),
            PlaybookError::Cluster(_) => AppError::ClusterError(err.to_string()),
        }
    }
}

/// Application state shared between handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<PlaybookRegistry>,
    pub ctx: PlaybookContext,
}

impl AppState {
    pub fn new(registry: PlaybookRegistry, ctx: PlaybookContext) -> Self {
        Self {
            registry: Arc::new(registry),
            ctx,
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}

/// Build the HTTP router
pub fn build_router(state: AppState, cors_enabled: bool) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api/playbooks", playbook_routes())
        .layer(TraceLayer::new_for_http());

    let router = if cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
