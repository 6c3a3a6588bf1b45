//! File listing, search, download and delete handlers.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::Response,
    Json,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::datetime::parse_search_date;
use crate::storage::Download;
use crate::web::dto::{FolderQuery, ListingResponse, MessageResponse, SearchQuery};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::MainAccess;

/// Generate a safe Content-Disposition header value for file downloads.
///
/// Control characters (CR, LF) are dropped and quotes/backslashes replaced
/// in the plain `filename` parameter; non-ASCII or special names also get an
/// RFC 5987 `filename*` parameter.
pub(crate) fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && !filename.chars().any(|c| c.is_control() || c == '"' || c == '\\') {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let encoded = urlencoding::encode(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

/// Stream an opened file as an attachment.
pub(crate) fn attachment_response(download: Download) -> Result<Response<Body>, ApiError> {
    let content_type = mime_guess::from_path(&download.file_name)
        .first_or_octet_stream()
        .to_string();

    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&download.file_name),
        )
        .header(header::CONTENT_LENGTH, download.size_bytes)
        .body(Body::from_stream(ReaderStream::new(download.file)))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// GET /api/files - List a folder.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
    Query(query): Query<FolderQuery>,
) -> Result<Json<ListingResponse>, ApiError> {
    let listing = state.storage.list(&query.folder).await?;
    Ok(Json(ListingResponse::new(listing, query.folder)))
}

/// GET /api/files/search - List files created on a given day.
pub async fn search_files(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ListingResponse>, ApiError> {
    let raw = query
        .date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Date parameter is required"))?;
    let date = parse_search_date(raw).ok_or_else(|| ApiError::bad_request("Invalid date format"))?;

    let listing = state.storage.search_by_date(&query.folder, date).await?;
    Ok(Json(
        ListingResponse::new(listing, query.folder).with_search_date(date.to_string()),
    ))
}

/// GET /api/download/:filename - Download a file.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
    Path(filename): Path<String>,
    Query(query): Query<FolderQuery>,
) -> Result<Response<Body>, ApiError> {
    let download = state.storage.open_download(&query.folder, &filename).await?;
    tracing::debug!(folder = %query.folder, file = %filename, "Download started");
    attachment_response(download)
}

/// DELETE /api/files/:filename - Delete a file.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
    Path(filename): Path<String>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.storage.delete_file(&query.folder, &filename).await?;
    Ok(Json(MessageResponse::new("File deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_header_simple_ascii() {
        let result = content_disposition_header("document.txt");
        assert_eq!(result, "attachment; filename=\"document.txt\"");
    }

    #[test]
    fn test_content_disposition_header_with_spaces() {
        let result = content_disposition_header("report (1).pdf");
        assert_eq!(result, "attachment; filename=\"report (1).pdf\"");
    }

    #[test]
    fn test_content_disposition_header_non_ascii() {
        let result = content_disposition_header("résumé.pdf");
        assert!(result.starts_with("attachment; filename=\""));
        assert!(result.contains("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));
    }

    #[test]
    fn test_content_disposition_header_double_quote() {
        let result = content_disposition_header("test\"file.txt");
        assert!(result.contains("filename=\"test_file.txt\""));
        assert!(result.contains("%22"));
    }

    #[test]
    fn test_content_disposition_header_backslash() {
        let result = content_disposition_header("test\\file.txt");
        assert!(result.contains("filename=\"test_file.txt\""));
        assert!(result.contains("filename*=UTF-8''"));
    }

    #[test]
    fn test_content_disposition_header_strips_control_characters() {
        let result = content_disposition_header("file\"\r\nX-Evil: header\r\n\r\n.txt");
        assert!(!result.contains('\r'));
        assert!(!result.contains('\n'));
        assert!(result.starts_with("attachment; filename="));
    }
}
