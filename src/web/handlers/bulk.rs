//! Bulk operation handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::web::dto::{
    ArchiveResponse, BulkArchiveRequest, BulkFilesRequest, BulkResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::MainAccess;

/// POST /api/bulk-delete - Delete several files; failures are reported per item.
pub async fn bulk_delete(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
    ValidatedJson(req): ValidatedJson<BulkFilesRequest>,
) -> Result<Json<BulkResponse>, ApiError> {
    let results = state.storage.bulk_delete(&req.folder, &req.files).await?;
    Ok(Json(BulkResponse::new("Bulk delete completed", results)))
}

/// POST /api/bulk-archive - Zip files and folders into a new archive.
pub async fn bulk_archive(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
    ValidatedJson(req): ValidatedJson<BulkArchiveRequest>,
) -> Result<Json<ArchiveResponse>, ApiError> {
    let summary = state
        .storage
        .bulk_archive(
            &req.folder,
            &req.files,
            &req.folders,
            req.archive_name.as_deref(),
        )
        .await?;
    if !summary.skipped.is_empty() {
        tracing::info!(
            archive = %summary.archive_name,
            skipped = ?summary.skipped,
            "Archive created without missing sources"
        );
    }
    Ok(Json(summary.into()))
}

/// POST /api/bulk-unarchive - Extract zip archives into their folder.
pub async fn bulk_unarchive(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
    ValidatedJson(req): ValidatedJson<BulkFilesRequest>,
) -> Result<Json<BulkResponse>, ApiError> {
    let results = state.storage.bulk_unarchive(&req.folder, &req.files).await?;
    Ok(Json(BulkResponse::new("Bulk unarchive completed", results)))
}
