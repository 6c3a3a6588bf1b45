//! HTTP API for xCloud.
//!
//! Thin glue over [`crate::storage::StorageService`]: routing, API key
//! authentication, rate limiting and JSON mapping.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
