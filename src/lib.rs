//! xCloud - a self-hosted file cloud.
//!
//! Stores files in a virtual folder tree on local disk and serves them over
//! an API-key protected HTTP API, with optional permanent public links.

pub mod config;
pub mod datetime;
pub mod error;
pub mod logging;
pub mod storage;
pub mod web;

pub use config::Config;
pub use error::{Result, XcloudError};
pub use storage::StorageService;
