//! API key authentication middleware.
//!
//! Two keys are configured: the main key grants full access, the upload key
//! may only upload. The key is read from the `X-API-Key` header or the
//! `api_key` query parameter.

use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::web::error::ApiError;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter carrying the API key.
pub const API_KEY_QUERY: &str = "api_key";

/// Role granted by an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRole {
    /// Full access.
    Main,
    /// Upload only.
    Upload,
}

/// Configured API keys.
#[derive(Clone)]
pub struct ApiKeyState {
    main_key: String,
    upload_key: String,
}

impl ApiKeyState {
    pub fn new(main_key: impl Into<String>, upload_key: impl Into<String>) -> Self {
        Self {
            main_key: main_key.into(),
            upload_key: upload_key.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.main_api_key, &config.upload_api_key)
    }

    /// Role for a presented key, if it is one of ours.
    pub fn role_for(&self, key: &str) -> Option<AccessRole> {
        if key.is_empty() {
            None
        } else if key == self.main_key {
            Some(AccessRole::Main)
        } else if key == self.upload_key {
            Some(AccessRole::Upload)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for ApiKeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyState").finish_non_exhaustive()
    }
}

/// Read the API key from the header, falling back to the query string.
fn presented_key(req: &Request<Body>) -> Option<String> {
    if let Some(key) = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        return Some(key.to_string());
    }

    req.uri().query()?.split('&').find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next()?;
        let value = parts.next()?;
        if key == API_KEY_QUERY {
            urlencoding::decode(value).ok().map(|s| s.into_owned())
        } else {
            None
        }
    })
}

/// Middleware that authenticates the request and records its [`AccessRole`].
pub async fn api_key_auth(
    state: Arc<ApiKeyState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(key) = presented_key(&request) else {
        tracing::debug!(path = %request.uri().path(), "Request without API key");
        return ApiError::unauthorized("API key required").into_response();
    };

    match state.role_for(&key) {
        Some(role) => {
            request.extensions_mut().insert(role);
            next.run(request).await
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "Invalid API key");
            ApiError::unauthorized("Invalid API key").into_response()
        }
    }
}

fn role_from_parts(parts: &Parts) -> Result<AccessRole, ApiError> {
    parts
        .extensions
        .get::<AccessRole>()
        .copied()
        .ok_or_else(|| ApiError::unauthorized("API key required"))
}

/// Extractor requiring the main key.
#[derive(Debug, Clone, Copy)]
pub struct MainAccess;

#[async_trait]
impl<S> FromRequestParts<S> for MainAccess
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match role_from_parts(parts)? {
            AccessRole::Main => Ok(MainAccess),
            AccessRole::Upload => Err(ApiError::forbidden("Insufficient permissions")),
        }
    }
}

/// Extractor accepting either key.
#[derive(Debug, Clone, Copy)]
pub struct AnyAccess(pub AccessRole);

#[async_trait]
impl<S> FromRequestParts<S> for AnyAccess
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        role_from_parts(parts).map(AnyAccess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::util::ServiceExt;

    fn app() -> Router {
        let state = Arc::new(ApiKeyState::new("main-key", "upload-key"));
        Router::new()
            .route("/main", get(|_: MainAccess| async { "main" }))
            .route("/any", get(|AnyAccess(role): AnyAccess| async move { format!("{role:?}") }))
            .layer(middleware::from_fn(move |req, next| {
                let state = state.clone();
                api_key_auth(state, req, next)
            }))
    }

    async fn status(uri: &str, key: Option<&str>) -> StatusCode {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn test_role_for() {
        let state = ApiKeyState::new("m", "u");
        assert_eq!(state.role_for("m"), Some(AccessRole::Main));
        assert_eq!(state.role_for("u"), Some(AccessRole::Upload));
        assert_eq!(state.role_for("x"), None);
        assert_eq!(state.role_for(""), None);
    }

    #[tokio::test]
    async fn test_missing_and_invalid_keys() {
        assert_eq!(status("/main", None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status("/main", Some("wrong")).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_roles() {
        assert_eq!(status("/main", Some("main-key")).await, StatusCode::OK);
        assert_eq!(status("/main", Some("upload-key")).await, StatusCode::FORBIDDEN);
        assert_eq!(status("/any", Some("upload-key")).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_parameter_key() {
        assert_eq!(status("/main?api_key=main-key", None).await, StatusCode::OK);
        assert_eq!(status("/main?folder=a&api_key=nope", None).await, StatusCode::UNAUTHORIZED);
    }
}
