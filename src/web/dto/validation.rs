//! Validation utilities for Web API DTOs.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::web::error::ApiError;

/// A JSON extractor that validates the request body.
///
/// Deserializes the body and runs the `validator` rules on it. Field-level
/// failures come back as a 422 with `details`.
///
/// ```ignore
/// use xcloud::web::dto::ValidatedJson;
///
/// async fn bulk_delete(
///     ValidatedJson(payload): ValidatedJson<BulkFilesRequest>,
/// ) -> Result<Json<BulkResponse>, ApiError> {
///     // payload.files is non-empty here
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?;

        value.validate().map_err(ApiError::from_validation_errors)?;

        Ok(ValidatedJson(value))
    }
}

/// Validate that a string does not contain control characters or NULL bytes.
pub fn no_control_chars(value: &str) -> Result<(), validator::ValidationError> {
    if value.chars().any(char::is_control) {
        return Err(validator::ValidationError::new("no_control_chars")
            .with_message("Must not contain control characters".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, response::IntoResponse, routing::post, Router};
    use serde::Deserialize;
    use tower::util::ServiceExt;

    #[derive(Debug, Deserialize, Validate)]
    struct Payload {
        #[validate(length(min = 1, message = "Files array is required"))]
        files: Vec<String>,
    }

    async fn handler(ValidatedJson(payload): ValidatedJson<Payload>) -> impl IntoResponse {
        payload.files.len().to_string()
    }

    async fn post_json(body: &'static str) -> StatusCode {
        let app = Router::new().route("/", post(handler));
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        app.oneshot(req).await.unwrap().status()
    }

    #[test]
    fn test_no_control_chars() {
        assert!(no_control_chars("Quarterly reports").is_ok());
        assert!(no_control_chars("日本語").is_ok());
        assert!(no_control_chars("a\x00b").is_err());
        assert!(no_control_chars("a\nb").is_err());
        assert!(no_control_chars("a\x1bb").is_err());
    }

    #[tokio::test]
    async fn test_validated_json_statuses() {
        assert_eq!(post_json(r#"{"files":["a"]}"#).await, StatusCode::OK);
        assert_eq!(
            post_json(r#"{"files":[]}"#).await,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(post_json("not json").await, StatusCode::BAD_REQUEST);
    }
}
