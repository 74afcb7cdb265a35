use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::validation::{validate_id, validate_section_name};
use super::{
    ApiError, ApiJson, ApiResponse, AppState, BackupListQuery, ContentUpdateRequest, RestoreRequest,
};
use crate::domain::{Content, ContentBackup};
use crate::services::{AuthenticatedUser, BackupPage, ContentError, SectionInfo};

/// GET /content
pub async fn get_content(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Content>>, ApiError> {
    let content = state
        .content_service()
        .get_active()
        .await?
        .ok_or(ContentError::NotFound)?;

    Ok(Json(ApiResponse::success(content)))
}

/// GET /content/sections
pub async fn list_sections(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<SectionInfo>>> {
    Json(ApiResponse::success(state.content_service().sections()))
}

/// PUT /content
pub async fn update_content(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(payload): ApiJson<ContentUpdateRequest>,
) -> Result<Json<ApiResponse<Content>>, ApiError> {
    let content = state
        .content_service()
        .update(payload.patch, user.id, payload.expected_version)
        .await?;

    Ok(Json(ApiResponse::success(content)))
}

/// PATCH /content/section/{name}
///
/// Fields outside the section are ignored.
pub async fn update_section(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(name): Path<String>,
    ApiJson(payload): ApiJson<ContentUpdateRequest>,
) -> Result<Json<ApiResponse<Content>>, ApiError> {
    let name = validate_section_name(&name)?;

    let content = state
        .content_service()
        .update_section(name, payload.patch, user.id, payload.expected_version)
        .await?;

    Ok(Json(ApiResponse::success(content)))
}

/// GET /content/backups?limit=&offset=
pub async fn list_backups(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BackupListQuery>,
) -> Result<Json<ApiResponse<BackupPage>>, ApiError> {
    let page = state
        .content_service()
        .list_backups(query.limit, query.offset)
        .await?;

    Ok(Json(ApiResponse::success(page)))
}

/// GET /content/backups/{id}
pub async fn get_backup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ContentBackup>>, ApiError> {
    let id = validate_id(id)?;
    let backup = state.content_service().get_backup(id).await?;
    Ok(Json(ApiResponse::success(backup)))
}

/// POST /content/restore/{backup_id}
///
/// The body is optional and may carry `expectedVersion`.
pub async fn restore_backup(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(backup_id): Path<i32>,
    body: Bytes,
) -> Result<Json<ApiResponse<Content>>, ApiError> {
    let backup_id = validate_id(backup_id)?;

    let request: RestoreRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RestoreRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation(format!("Invalid restore body: {e}")))?
    };

    let content = state
        .content_service()
        .restore(backup_id, user.id, request.expected_version)
        .await?;

    Ok(Json(ApiResponse::success(content)))
}
