use axum::{
    Json,
    extract::{Multipart, Query, State, multipart::MultipartError},
    http::StatusCode,
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, UploadQuery};
use crate::services::{StoredUpload, UploadKind};

const FILE_FIELD: &str = "file";

fn multipart_error(err: &MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Upload exceeds the request size limit".to_string())
    } else {
        ApiError::validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// POST /upload?kind=image|cv
///
/// Expects one multipart part named `file`.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<StoredUpload>>, ApiError> {
    let kind: UploadKind = query.kind.parse()?;
    let service = state.upload_service();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let declared = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;

        let stored = service.store(kind, &bytes, &declared).await?;
        return Ok(Json(ApiResponse::success(stored)));
    }

    Err(ApiError::validation(format!(
        "Missing multipart field '{FILE_FIELD}'"
    )))
}
