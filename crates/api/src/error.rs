//! API error type and its HTTP response conversion.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    #[error("engine error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("queue error: {0}")]
    Queue(#[from] queue::QueueError),
}

impl ApiError {
    fn status_and_label(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Database(db::DbError::NotFound) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            ApiError::Engine(engine::EngineError::Validation(_))
            | ApiError::Engine(engine::EngineError::DuplicateNodeId(_))
            | ApiError::Engine(engine::EngineError::UnknownNodeReference { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_workflow")
            }
            ApiError::Engine(_) => (StatusCode::INTERNAL_SERVER_ERROR, "engine_error"),
            ApiError::Queue(_) => (StatusCode::INTERNAL_SERVER_ERROR, "queue_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, label) = self.status_and_label();
        let body = ApiErrorBody { error: label.to_string(), message: self.to_string() };
        tracing::warn!(error = %self, "request failed");
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
