//! Middleware for the HTTP API.

pub mod auth;
pub mod cors;
pub mod rate_limit;
pub mod security;

pub use auth::{api_key_auth, AccessRole, AnyAccess, ApiKeyState, MainAccess, API_KEY_HEADER};
pub use cors::create_cors_layer;
pub use rate_limit::{rate_limit, LimitClass, RateLimitState};
pub use security::security_headers;
