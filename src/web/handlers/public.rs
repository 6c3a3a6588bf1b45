//! Public link handlers and the unauthenticated permanent download routes.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::web::dto::{FolderQuery, MessageResponse, PublicLinkResponse, PublicStatusResponse};
use crate::web::error::ApiError;
use crate::web::handlers::{attachment_response, AppState};
use crate::web::middleware::MainAccess;

/// POST /api/files/:filename/make-public - Publish a file under a permanent link.
pub async fn make_public(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
    Path(filename): Path<String>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<PublicLinkResponse>, ApiError> {
    let link = state.storage.make_public(&query.folder, &filename).await?;
    Ok(Json(PublicLinkResponse::new(link)))
}

/// POST /api/files/:filename/make-private - Withdraw a permanent link.
pub async fn make_private(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
    Path(filename): Path<String>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = if state.storage.make_private(&query.folder, &filename).await? {
        "File made private"
    } else {
        "File was already private"
    };
    Ok(Json(MessageResponse::new(message)))
}

/// GET /api/files/:filename/public-status
pub async fn public_status(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
    Path(filename): Path<String>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<PublicStatusResponse>, ApiError> {
    let status = state.storage.public_status(&query.folder, &filename).await?;
    Ok(Json(status.into()))
}

/// GET /:filename - Permanent link to a public file at the root.
pub async fn permanent_download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let download = state.storage.permanent_download(None, &filename).await?;
    attachment_response(download)
}

/// GET /:folder/:filename - Permanent link to a public file in a folder.
///
/// `folder` arrives percent-decoded, so nested folders (`Docs%2FWork`) work.
pub async fn permanent_download_in_folder(
    State(state): State<Arc<AppState>>,
    Path((folder, filename)): Path<(String, String)>,
) -> Result<Response<Body>, ApiError> {
    let download = state
        .storage
        .permanent_download(Some(&folder), &filename)
        .await?;
    attachment_response(download)
}
