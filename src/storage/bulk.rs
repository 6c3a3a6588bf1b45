//! Multi-item operations: delete, zip archive and zip extract.
//!
//! Delete and extract report one outcome per item and never fail the batch.
//! Archive creation is all-or-nothing: the zip is written to staging and only
//! moved into the folder once complete.

use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::locks::DirLocks;
use super::naming::allocate;
use super::path::{is_valid_segment, PathResolver, VirtualPath};
use super::upload::StagedUpload;
use crate::{Result, XcloudError};

/// Per-item result of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    Deleted,
    Extracted,
    NotFound,
    NotFoundOrNotZip,
    Error(String),
}

impl BulkOutcome {
    /// Wire status string.
    pub fn status(&self) -> &'static str {
        match self {
            BulkOutcome::Deleted => "deleted",
            BulkOutcome::Extracted => "extracted",
            BulkOutcome::NotFound => "not_found",
            BulkOutcome::NotFoundOrNotZip => "not_found_or_not_zip",
            BulkOutcome::Error(_) => "error",
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            BulkOutcome::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

/// One item of a bulk result, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItem {
    pub filename: String,
    pub outcome: BulkOutcome,
}

impl BulkItem {
    fn new(filename: &str, outcome: BulkOutcome) -> Self {
        Self {
            filename: filename.to_string(),
            outcome,
        }
    }
}

/// Result of a successful archive operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Final name of the archive inside the folder.
    pub archive_name: String,
    /// Size of the archive file.
    pub size_bytes: u64,
    /// Requested sources that did not exist and were left out.
    pub skipped: Vec<String>,
}

/// Normalize a requested archive name to `{stem}.zip`.
///
/// A blank request yields `archive_{unix millis}.zip`. The stem must pass the
/// folder segment rule.
pub fn archive_file_name(requested: Option<&str>, now: DateTime<Utc>) -> Result<String> {
    let trimmed = requested.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Ok(format!("archive_{}.zip", now.timestamp_millis()));
    }

    let stem = match trimmed.len().checked_sub(4).and_then(|i| trimmed.get(i..)) {
        Some(suffix) if suffix.eq_ignore_ascii_case(".zip") => &trimmed[..trimmed.len() - 4],
        _ => trimmed,
    };
    if !is_valid_segment(stem) {
        return Err(XcloudError::InvalidName(format!(
            "archive name '{trimmed}' contains illegal characters"
        )));
    }
    Ok(format!("{stem}.zip"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    File,
    Folder,
}

#[derive(Debug, Clone)]
struct ArchiveSource {
    name: String,
    path: PathBuf,
    kind: SourceKind,
}

/// Bulk operations over one virtual folder.
#[derive(Debug, Clone)]
pub struct BulkOperator {
    resolver: PathResolver,
    locks: Arc<DirLocks>,
}

impl BulkOperator {
    pub fn new(resolver: PathResolver, locks: Arc<DirLocks>) -> Self {
        Self { resolver, locks }
    }

    /// Delete each named file independently.
    pub async fn delete(&self, folder: &VirtualPath, names: &[String]) -> Vec<BulkItem> {
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let outcome = self.delete_one(folder, name).await;
            tracing::debug!(folder = %folder, file = %name, status = outcome.status(), "Bulk delete item");
            results.push(BulkItem::new(name, outcome));
        }
        results
    }

    async fn delete_one(&self, folder: &VirtualPath, name: &str) -> BulkOutcome {
        let path = match self.resolver.file(folder, name) {
            Ok(path) => path,
            Err(e) => return BulkOutcome::Error(e.to_string()),
        };
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {
                return BulkOutcome::Error("is a folder, not a file".to_string())
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return BulkOutcome::NotFound,
            Err(e) => return BulkOutcome::Error(e.to_string()),
        }
        match fs::remove_file(&path).await {
            Ok(()) => BulkOutcome::Deleted,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BulkOutcome::NotFound,
            Err(e) => BulkOutcome::Error(e.to_string()),
        }
    }

    /// Zip the named files and folders of `folder` into a new archive there.
    ///
    /// Sources that do not exist are skipped and listed in the summary.
    pub async fn archive(
        &self,
        folder: &VirtualPath,
        files: &[String],
        folders: &[String],
        archive_name: Option<&str>,
    ) -> Result<ArchiveSummary> {
        if files.is_empty() && folders.is_empty() {
            return Err(XcloudError::Validation(
                "Files or folders array is required".to_string(),
            ));
        }
        let desired = archive_file_name(archive_name, Utc::now())?;

        let dir = self.resolver.folder(folder)?;
        if !fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(XcloudError::NotFound("Folder".to_string()));
        }

        let mut sources = Vec::with_capacity(files.len() + folders.len());
        for name in files {
            sources.push(ArchiveSource {
                name: name.clone(),
                path: self.resolver.file(folder, name)?,
                kind: SourceKind::File,
            });
        }
        for name in folders {
            sources.push(ArchiveSource {
                name: name.clone(),
                path: self.resolver.file(folder, name)?,
                kind: SourceKind::Folder,
            });
        }

        let mut staged = StagedUpload::create(&self.resolver.staging_dir(), &desired).await?;
        let skipped = staged
            .fill_blocking(move |file| write_archive(file, &sources))
            .await?;

        let _guard = self.locks.lock(&dir).await;
        let archive_name = allocate(&dir, &desired).await?;
        let size_bytes = staged.commit(&dir.join(&archive_name)).await?;

        if !skipped.is_empty() {
            tracing::debug!(folder = %folder, skipped = ?skipped, "Archive sources not found, skipped");
        }
        tracing::info!(folder = %folder, archive = %archive_name, size = size_bytes, "Archive created");

        Ok(ArchiveSummary {
            archive_name,
            size_bytes,
            skipped,
        })
    }

    /// Extract each named `.zip` into `folder`, overwriting existing files.
    pub async fn unarchive(&self, folder: &VirtualPath, names: &[String]) -> Vec<BulkItem> {
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let outcome = self.unarchive_one(folder, name).await;
            match &outcome {
                BulkOutcome::Error(e) => {
                    tracing::warn!(folder = %folder, file = %name, error = %e, "Archive extraction failed")
                }
                other => {
                    tracing::debug!(folder = %folder, file = %name, status = other.status(), "Bulk unarchive item")
                }
            }
            results.push(BulkItem::new(name, outcome));
        }
        results
    }

    async fn unarchive_one(&self, folder: &VirtualPath, name: &str) -> BulkOutcome {
        let path = match self.resolver.file(folder, name) {
            Ok(path) => path,
            Err(e) => return BulkOutcome::Error(e.to_string()),
        };
        let is_file = fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false);
        if !is_file || !name.to_lowercase().ends_with(".zip") {
            return BulkOutcome::NotFoundOrNotZip;
        }

        let resolver = self.resolver.clone();
        let folder = folder.clone();
        let extracted = tokio::task::spawn_blocking(move || extract_archive(&path, &resolver, &folder)).await;
        match extracted {
            Ok(Ok(_)) => BulkOutcome::Extracted,
            Ok(Err(e)) => BulkOutcome::Error(e.to_string()),
            Err(e) => BulkOutcome::Error(e.to_string()),
        }
    }
}

fn archive_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .unix_permissions(0o644)
}

/// Write all existing sources into `out`, returning the names that were skipped.
fn write_archive(out: &mut File, sources: &[ArchiveSource]) -> Result<Vec<String>> {
    let mut zip = ZipWriter::new(out);
    let options = archive_options();
    let mut skipped = Vec::new();

    for source in sources {
        let meta = match std::fs::metadata(&source.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                skipped.push(source.name.clone());
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        match source.kind {
            SourceKind::File if meta.is_file() => {
                zip.start_file(source.name.clone(), options)?;
                io::copy(&mut File::open(&source.path)?, &mut zip)?;
            }
            SourceKind::Folder if meta.is_dir() => {
                add_folder(&mut zip, &source.path, &source.name, options)?;
            }
            _ => skipped.push(source.name.clone()),
        }
    }

    zip.finish()?;
    Ok(skipped)
}

/// Add a directory tree under `root_name/`.
fn add_folder<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    dir: &Path,
    root_name: &str,
    options: SimpleFileOptions,
) -> Result<()> {
    zip.add_directory(format!("{root_name}/"), options)?;

    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|_| XcloudError::InvalidPath("entry escapes its folder".to_string()))?;
        let mut name = root_name.to_string();
        for component in relative.components() {
            name.push('/');
            name.push_str(&component.as_os_str().to_string_lossy());
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
        } else if file_type.is_file() {
            zip.start_file(name, options)?;
            io::copy(&mut File::open(entry.path())?, zip)?;
        }
    }
    Ok(())
}

/// Extract every entry of `archive` below `folder`. Returns the number of files written.
fn extract_archive(archive: &Path, resolver: &PathResolver, folder: &VirtualPath) -> Result<usize> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let mut written = 0;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = %entry.name(), "Skipping archive entry with unsafe name");
            continue;
        };
        let target = match resolver.entry(folder, &relative) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(entry = %entry.name(), error = %e, "Skipping archive entry");
                continue;
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }

    Ok(written)
}
