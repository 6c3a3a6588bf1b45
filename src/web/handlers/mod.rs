//! API handlers.

pub mod bulk;
pub mod files;
pub mod folders;
pub mod public;
pub mod system;
pub mod upload;

pub use bulk::*;
pub use files::*;
pub use folders::*;
pub use public::*;
pub use system::*;
pub use upload::*;

use std::sync::Arc;

use crate::storage::StorageService;

/// Application state shared across handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Storage facade.
    pub storage: Arc<StorageService>,
}

impl AppState {
    pub fn new(storage: Arc<StorageService>) -> Self {
        Self { storage }
    }
}
