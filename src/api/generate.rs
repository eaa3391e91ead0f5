use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::RenderRequest;
use crate::services::RenderPipeline;

/// Render a layout to PNG
///
/// The image is returned as an attachment. Render failures are reported as
/// 500 with `{error, details, elapsed_ms}`; unreadable bodies get the
/// rejection's 4xx status with `{error, details}`.
pub async fn handle_generate(
    State(pipeline): State<Arc<RenderPipeline>>,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let output = pipeline.render(&request).await?;

    let headers = [
        (header::CONTENT_TYPE, "image/png".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", output.filename),
        ),
    ];
    Ok((headers, output.png).into_response())
}
