use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure of a single renderer launch attempt.
///
/// Cloneable so every request awaiting the same attempt receives the error.
#[derive(Debug, Clone, Error)]
pub enum LaunchError {
    #[error("Browser binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Browser launch timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Renderer unavailable: {0}")]
    Launch(#[from] LaunchError),

    #[error("Failed to open render surface: {0}")]
    Surface(String),

    #[error("Failed to write document: {0}")]
    Document(#[from] std::io::Error),

    #[error("Document load failed: {0}")]
    Load(String),

    #[error("Document load timed out after {0}ms")]
    LoadTimeout(u64),

    #[error("Capture failed: {0}")]
    Capture(String),
}

/// A render that did not produce an image, with the time spent on it.
#[derive(Debug, Error)]
#[error("{cause}")]
pub struct RenderFailure {
    pub cause: RenderError,
    pub elapsed_ms: u64,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("generate failed: {0}")]
    Render(#[from] RenderFailure),

    /// Body that could not be read as a render request
    #[error("invalid request: {details}")]
    InvalidRequest { status: StatusCode, details: String },
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest {
            status: rejection.status(),
            details: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Render(failure) => {
                let body = Json(json!({
                    "error": "generate failed",
                    "details": failure.cause.to_string(),
                    "elapsed_ms": failure.elapsed_ms,
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
            ApiError::InvalidRequest { status, details } => {
                tracing::warn!(%status, %details, "Rejected render request");
                let body = Json(json!({
                    "error": "generate failed",
                    "details": details,
                }));
                (status, body).into_response()
            }
        }
    }
}
