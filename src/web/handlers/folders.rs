//! Folder handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::web::dto::{
    CreateFolderRequest, CreateFolderResponse, MessageResponse, ParentFolderQuery, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::MainAccess;

/// POST /api/folders - Create a folder.
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
    ValidatedJson(req): ValidatedJson<CreateFolderRequest>,
) -> Result<Json<CreateFolderResponse>, ApiError> {
    let created = state
        .storage
        .create_folder(&req.parent_folder, &req.name)
        .await?;
    Ok(Json(created.into()))
}

/// DELETE /api/folders/:name - Recursively delete a folder.
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
    Path(name): Path<String>,
    Query(query): Query<ParentFolderQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.storage.delete_folder(&query.parent_folder, &name).await?;
    Ok(Json(MessageResponse::new("Folder deleted successfully")))
}
