//! Directory listing, date search and aggregate statistics.

use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use tokio::fs;
use walkdir::WalkDir;

use super::path::{PathResolver, VirtualPath, STAGING_DIR};
use crate::datetime::{from_system_time, in_window, SearchZone};
use crate::Result;

/// A regular file inside a virtual folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Name on disk.
    pub stored_name: String,
    /// Name shown to users (legacy UUID prefix removed).
    pub display_name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Creation time (falls back to modification time where unsupported).
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

/// A directory inside a virtual folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    /// Directory name.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

/// Contents of one virtual folder, in directory order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub files: Vec<FileEntry>,
    pub folders: Vec<FolderEntry>,
}

/// Totals over the whole storage root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub total_files: u64,
    pub total_size: u64,
    pub total_folders: u64,
}

fn legacy_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}-")
            .expect("legacy prefix pattern is valid")
    })
}

/// Presentation name for a stored file.
///
/// Files stored under the old `{uuid}-{original}` scheme are shown as
/// `{original}`; every other name is returned unchanged.
pub fn display_name(stored_name: &str) -> &str {
    if stored_name.len() <= 36 {
        return stored_name;
    }
    match legacy_prefix().find(stored_name) {
        Some(m) => &stored_name[m.end()..],
        None => stored_name,
    }
}

fn created_at(meta: &Metadata) -> DateTime<Utc> {
    meta.created()
        .or_else(|_| meta.modified())
        .map(from_system_time)
        .unwrap_or_else(|_| Utc::now())
}

fn modified_at(meta: &Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(from_system_time)
        .unwrap_or_else(|_| Utc::now())
}

/// Read-only view of the namespace.
#[derive(Debug, Clone)]
pub struct Catalog {
    resolver: PathResolver,
}

impl Catalog {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// List the files and folders of a virtual folder.
    ///
    /// A folder that does not exist (or is not a directory) lists as empty.
    pub async fn list(&self, folder: &VirtualPath) -> Result<Listing> {
        self.scan(folder, |_| true).await
    }

    /// Like [`Catalog::list`], keeping only files created on `date` in `zone`.
    ///
    /// Folders are never filtered.
    pub async fn search_by_date(
        &self,
        folder: &VirtualPath,
        date: NaiveDate,
        zone: SearchZone,
    ) -> Result<Listing> {
        let window = zone.day_window(date);
        self.scan(folder, |file| in_window(&file.created_at, &window))
            .await
    }

    async fn scan<F>(&self, folder: &VirtualPath, keep_file: F) -> Result<Listing>
    where
        F: Fn(&FileEntry) -> bool,
    {
        let dir = self.resolver.folder(folder)?;
        let mut listing = Listing::default();

        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(listing),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(listing),
            Err(e) => return Err(e.into()),
        }

        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(folder = %folder, "Skipping entry with non UTF-8 name");
                continue;
            };
            if folder.is_root() && name == STAGING_DIR {
                continue;
            }
            // Follows symlinks; an entry removed mid-scan is skipped.
            let meta = match fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::debug!(folder = %folder, name = %name, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if meta.is_dir() {
                listing.folders.push(FolderEntry {
                    created_at: created_at(&meta),
                    modified_at: modified_at(&meta),
                    name,
                });
            } else {
                let file = FileEntry {
                    display_name: display_name(&name).to_string(),
                    size_bytes: meta.len(),
                    created_at: created_at(&meta),
                    modified_at: modified_at(&meta),
                    stored_name: name,
                };
                if keep_file(&file) {
                    listing.files.push(file);
                }
            }
        }

        Ok(listing)
    }

    /// Count every file, byte and folder under the root, skipping `tmp` at any depth.
    pub async fn global_stats(&self) -> Result<StorageStats> {
        let root = self.resolver.root().to_path_buf();
        tokio::task::spawn_blocking(move || walk_stats(&root)).await?
    }
}

fn walk_stats(root: &Path) -> Result<StorageStats> {
    let mut stats = StorageStats::default();
    if !root.is_dir() {
        return Ok(stats);
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.file_name() != STAGING_DIR);

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            stats.total_folders += 1;
        } else {
            stats.total_files += 1;
            stats.total_size += entry.metadata().map_err(io::Error::from)?.len();
        }
    }

    Ok(stats)
}
