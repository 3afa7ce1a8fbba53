use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Failures inside the retrieval-and-grounding pipeline.
///
/// Malformed model output is deliberately NOT represented here: it is a
/// recognized condition handled by the reconciler's plain-text fallback,
/// never an error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("embedding service returned no usable vector: {0}")]
    Embedding(String),
    #[error("search request failed: {0}")]
    Retrieval(String),
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),
    #[error("history store error: {0}")]
    History(String),
}

impl PipelineError {
    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::Embedding(err.to_string())
    }

    pub fn retrieval<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::Retrieval(err.to_string())
    }

    pub fn model<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::ModelInvocation(err.to_string())
    }

    pub fn history<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::History(err.to_string())
    }
}

/// Errors surfaced on the HTTP boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
