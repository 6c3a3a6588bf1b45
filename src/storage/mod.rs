//! Storage namespace manager.
//!
//! Maps the virtual folder tree onto a directory on disk and provides the
//! operations the HTTP layer needs:
//!
//! - [`path`]: virtual path validation and resolution
//! - [`naming`]: collision-free file names
//! - [`catalog`]: listing, date search and statistics
//! - [`public_links`]: the public link registry
//! - [`bulk`]: bulk delete, archive and extract
//! - [`upload`]: staged uploads
//! - [`service`]: the facade composing all of the above

pub mod bulk;
pub mod catalog;
pub mod locks;
pub mod naming;
pub mod path;
pub mod public_links;
pub mod service;
pub mod upload;

pub use bulk::{archive_file_name, ArchiveSummary, BulkItem, BulkOperator, BulkOutcome};
pub use catalog::{display_name, Catalog, FileEntry, FolderEntry, Listing, StorageStats};
pub use locks::DirLocks;
pub use naming::{allocate, MAX_COLLISION_PROBES};
pub use path::{PathResolver, VirtualPath, STAGING_DIR};
pub use public_links::{
    link_key, permanent_url, JsonFileStore, LinkStore, MemoryStore, PublicLink,
    PublicLinkRegistry,
};
pub use service::{CreatedFolder, Download, PublicStatus, StorageService, UploadReceipt};
pub use upload::StagedUpload;

/// Default upload ceiling (500 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;
