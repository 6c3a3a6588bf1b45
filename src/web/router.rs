//! Router configuration for the xCloud API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::Redirect,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use super::handlers::{
    bulk_archive, bulk_delete, bulk_unarchive, create_folder, delete_file, delete_folder,
    download_file, health_check, list_files, make_private, make_public, permanent_download,
    permanent_download_in_folder, public_status, search_files, storage_stats, upload_file,
    AppState,
};
use super::middleware::{
    api_key_auth, create_cors_layer, rate_limit, security_headers, ApiKeyState, RateLimitState,
};
use crate::config::WebConfig;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Create the main router.
pub fn create_router(
    app_state: Arc<AppState>,
    keys: Arc<ApiKeyState>,
    rate_limits: Arc<RateLimitState>,
    web_config: &WebConfig,
) -> Router {
    let body_limit = usize::try_from(app_state.storage.max_upload_bytes() + MULTIPART_OVERHEAD)
        .unwrap_or(usize::MAX);

    // Everything but the health check needs an API key.
    let protected_routes = Router::new()
        .route("/stats", get(storage_stats))
        .route("/files", get(list_files))
        .route("/files/search", get(search_files))
        .route("/files/:filename", delete(delete_file))
        .route("/files/:filename/make-public", post(make_public))
        .route("/files/:filename/make-private", post(make_private))
        .route("/files/:filename/public-status", get(public_status))
        .route("/folders", post(create_folder))
        .route("/folders/:name", delete(delete_folder))
        .route("/upload", post(upload_file))
        .route("/download/:filename", get(download_file))
        .route("/bulk-delete", post(bulk_delete))
        .route("/bulk-archive", post(bulk_archive))
        .route("/bulk-unarchive", post(bulk_unarchive))
        .route_layer(middleware::from_fn(move |req, next| {
            let keys = keys.clone();
            api_key_auth(keys, req, next)
        }));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(body_limit));

    let mut router = Router::new()
        .nest("/api", api_routes)
        .route("/:filename", get(permanent_download))
        .route("/:folder/:filename", get(permanent_download_in_folder));

    if web_config.serve_static {
        tracing::info!(path = %web_config.static_path, "Serving console at /console");
        router = router
            .nest_service("/console", ServeDir::new(&web_config.static_path))
            .route("/", get(|| async { Redirect::temporary("/console/") }));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&web_config.cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(middleware::from_fn(move |req, next| {
                    let state = rate_limits.clone();
                    rate_limit(state, req, next)
                })),
        )
        .with_state(app_state)
}
