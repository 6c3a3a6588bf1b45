//! Upload handler.
//!
//! The `file` part is streamed chunk by chunk into staging. The target folder
//! comes from a `folder` part (in any position) or the `?folder=` query, so the
//! staged file is only committed once the whole body has been read.

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, Query, State,
    },
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::storage::StagedUpload;
use crate::web::dto::{FolderQuery, UploadResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AnyAccess;

fn multipart_error(state: &AppState, e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::payload_too_large(format!(
            "File too large. Maximum size: {}MB",
            state.storage.max_upload_bytes() / 1024 / 1024
        ));
    }
    tracing::warn!("Failed to read multipart body: {}", e);
    ApiError::bad_request("Invalid multipart data")
}

async fn receive_file(
    state: &AppState,
    field: &mut Field<'_>,
    upload: &mut StagedUpload,
) -> Result<(), ApiError> {
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(state, e))?
    {
        upload.write_chunk(&chunk).await?;
    }
    Ok(())
}

/// POST /api/upload - Upload one file.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    AnyAccess(role): AnyAccess,
    Query(query): Query<FolderQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut folder_field: Option<String> = None;
    let mut staged: Option<StagedUpload> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&state, e))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                if staged.is_some() {
                    return Err(ApiError::bad_request("Unexpected file field"));
                }
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

                let mut upload = state.storage.begin_upload(&file_name).await?;
                if let Err(e) = receive_file(&state, &mut field, &mut upload).await {
                    tracing::warn!(file = %file_name, received = upload.size(), "Upload aborted");
                    upload.discard().await;
                    return Err(e);
                }
                staged = Some(upload);
            }
            "folder" => {
                folder_field = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| multipart_error(&state, e))?,
                );
            }
            _ => {}
        }
    }

    let staged = staged.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let folder = folder_field
        .filter(|f| !f.is_empty())
        .unwrap_or(query.folder);

    tracing::debug!(
        role = ?role,
        file = %staged.original_name(),
        size = staged.size(),
        "Upload received"
    );
    let receipt = state.storage.commit_upload(&folder, staged).await?;
    Ok(Json(receipt.into()))
}
