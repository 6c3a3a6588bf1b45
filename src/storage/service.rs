//! The storage facade consumed by the HTTP layer.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::fs::{self, File};

use super::bulk::{ArchiveSummary, BulkItem, BulkOperator};
use super::catalog::{Catalog, Listing, StorageStats};
use super::locks::DirLocks;
use super::naming::allocate;
use super::path::{is_valid_segment, PathResolver, VirtualPath, STAGING_DIR};
use super::public_links::{permanent_url, JsonFileStore, PublicLinkRegistry};
use super::upload::StagedUpload;
use super::DEFAULT_MAX_UPLOAD_BYTES;
use crate::config::StorageConfig;
use crate::datetime::SearchZone;
use crate::{Result, XcloudError};

/// Result of a committed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Name the file was stored under.
    pub final_name: String,
    /// Name the client sent.
    pub original_name: String,
    pub size_bytes: u64,
    /// Virtual folder the file landed in.
    pub folder: String,
}

/// A newly created folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedFolder {
    pub folder_name: String,
    /// Full virtual path of the folder.
    pub path: String,
}

/// Public state of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicStatus {
    pub is_public: bool,
    pub public_link: Option<String>,
}

/// An open file ready to be streamed to a client.
#[derive(Debug)]
pub struct Download {
    pub file: File,
    pub file_name: String,
    pub size_bytes: u64,
}

/// Storage namespace manager.
#[derive(Debug)]
pub struct StorageService {
    resolver: PathResolver,
    catalog: Catalog,
    links: PublicLinkRegistry,
    bulk: BulkOperator,
    locks: Arc<DirLocks>,
    zone: SearchZone,
    max_upload_bytes: u64,
}

impl StorageService {
    /// Open the service described by the storage configuration.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let zone = SearchZone::from_name(&config.timezone)?;
        let links_path = config.public_links_path();
        let links = PublicLinkRegistry::load(Box::new(JsonFileStore::new(&links_path)))?;
        tracing::info!(
            links = links.len(),
            path = %links_path.display(),
            "Public link registry loaded"
        );
        Ok(Self::new(&config.root, links, zone)?.with_max_upload_bytes(config.max_upload_bytes()))
    }

    /// Create a service over `root`, creating the root and staging directories.
    pub fn new(root: impl AsRef<Path>, links: PublicLinkRegistry, zone: SearchZone) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(STAGING_DIR))?;

        let resolver = PathResolver::new(root);
        let locks = Arc::new(DirLocks::new());
        let service = Self {
            catalog: Catalog::new(resolver.clone()),
            bulk: BulkOperator::new(resolver.clone(), locks.clone()),
            resolver,
            links,
            locks,
            zone,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        };
        service.sweep_staging();
        Ok(service)
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn links(&self) -> &PublicLinkRegistry {
        &self.links
    }

    /// Remove staged files left behind by an earlier run.
    fn sweep_staging(&self) {
        let Ok(entries) = std::fs::read_dir(self.resolver.staging_dir()) else {
            return;
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let stale = path
                .extension()
                .is_some_and(|ext| ext == "part");
            if stale && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Removed stale staged uploads");
        }
    }

    /// Drop idle directory locks.
    pub fn cleanup_locks(&self) {
        self.locks.cleanup();
    }

    // ----- listing -----

    pub async fn list(&self, folder: &str) -> Result<Listing> {
        let folder = VirtualPath::parse(folder)?;
        self.catalog.list(&folder).await
    }

    pub async fn search_by_date(&self, folder: &str, date: NaiveDate) -> Result<Listing> {
        let folder = VirtualPath::parse(folder)?;
        self.catalog.search_by_date(&folder, date, self.zone).await
    }

    pub async fn global_stats(&self) -> Result<StorageStats> {
        self.catalog.global_stats().await
    }

    // ----- folders -----

    /// Create `name` inside `parent`, creating missing parents.
    pub async fn create_folder(&self, parent: &str, name: &str) -> Result<CreatedFolder> {
        if name.trim().is_empty() {
            return Err(XcloudError::InvalidName("Folder name is required".to_string()));
        }
        if !is_valid_segment(name) {
            return Err(XcloudError::InvalidName("Invalid folder name".to_string()));
        }
        let parent = VirtualPath::parse(parent)?;
        let folder = parent.join(name)?;

        let parent_dir = self.resolver.folder(&parent)?;
        let dir = self.resolver.folder(&folder)?;
        fs::create_dir_all(&parent_dir).await?;
        match fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(XcloudError::Conflict("Folder".to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(folder = %folder, "Folder created");
        Ok(CreatedFolder {
            folder_name: name.to_string(),
            path: folder.to_string(),
        })
    }

    /// Recursively delete a folder.
    pub async fn delete_folder(&self, parent: &str, name: &str) -> Result<()> {
        let parent = VirtualPath::parse(parent)?;
        let dir = self.resolver.file(&parent, name)?;
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(XcloudError::InvalidName("Not a folder".to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(XcloudError::NotFound("Folder".to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        fs::remove_dir_all(&dir).await?;
        tracing::info!(parent = %parent, folder = %name, "Folder deleted");
        Ok(())
    }

    // ----- upload -----

    /// Start receiving an upload into staging.
    pub async fn begin_upload(&self, original_name: &str) -> Result<StagedUpload> {
        Ok(StagedUpload::create(&self.resolver.staging_dir(), original_name)
            .await?
            .with_limit(self.max_upload_bytes))
    }

    /// Allocate a free name in `folder` and move the staged upload there.
    pub async fn commit_upload(&self, folder: &str, staged: StagedUpload) -> Result<UploadReceipt> {
        let folder = VirtualPath::parse(folder)?;
        let dir = self.resolver.folder(&folder)?;

        let _guard = self.locks.lock(&dir).await;
        fs::create_dir_all(&dir).await?;
        let original_name = staged.original_name().to_string();
        let final_name = allocate(&dir, &original_name).await?;
        let target = self.resolver.file(&folder, &final_name)?;
        let size_bytes = staged.commit(&target).await?;

        tracing::info!(
            folder = %folder,
            file = %final_name,
            original = %original_name,
            size = size_bytes,
            "File uploaded"
        );
        Ok(UploadReceipt {
            final_name,
            original_name,
            size_bytes,
            folder: folder.to_string(),
        })
    }

    /// Stage and commit an in-memory upload.
    pub async fn upload_bytes(&self, folder: &str, name: &str, data: &[u8]) -> Result<UploadReceipt> {
        VirtualPath::parse(folder)?;
        let mut staged = self.begin_upload(name).await?;
        staged.write_chunk(data).await?;
        self.commit_upload(folder, staged).await
    }

    // ----- files -----

    fn file_path(&self, folder: &VirtualPath, name: &str) -> Result<PathBuf> {
        self.resolver.file(folder, name)
    }

    async fn require_file(path: &Path) -> Result<u64> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Err(XcloudError::NotFound("File".to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(XcloudError::NotFound("File".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Open a file for download.
    pub async fn open_download(&self, folder: &str, name: &str) -> Result<Download> {
        let folder = VirtualPath::parse(folder)?;
        let path = self.file_path(&folder, name)?;
        let size_bytes = Self::require_file(&path).await?;
        Ok(Download {
            file: File::open(&path).await?,
            file_name: name.to_string(),
            size_bytes,
        })
    }

    /// Open a file through its permanent link.
    ///
    /// Refused unless the file is registered as public; existence is checked
    /// only after that.
    pub async fn permanent_download(&self, folder: Option<&str>, name: &str) -> Result<Download> {
        let private = || XcloudError::PermissionDenied("File is private".to_string());
        let folder = match folder {
            Some(raw) => VirtualPath::parse(raw).map_err(|_| private())?,
            None => VirtualPath::root(),
        };
        if !self.links.is_public(&folder, name) {
            return Err(private());
        }
        let path = self.file_path(&folder, name)?;
        let size_bytes = Self::require_file(&path).await?;
        tracing::debug!(folder = %folder, file = %name, "Serving public file");
        Ok(Download {
            file: File::open(&path).await?,
            file_name: name.to_string(),
            size_bytes,
        })
    }

    /// Delete one file. Its public link, if any, is left in place.
    pub async fn delete_file(&self, folder: &str, name: &str) -> Result<()> {
        let folder = VirtualPath::parse(folder)?;
        let path = self.file_path(&folder, name)?;
        Self::require_file(&path).await?;
        fs::remove_file(&path).await?;
        tracing::info!(folder = %folder, file = %name, "File deleted");
        Ok(())
    }

    // ----- public links -----

    /// Register a file as public and return its permanent URL path.
    pub async fn make_public(&self, folder: &str, name: &str) -> Result<String> {
        let folder = VirtualPath::parse(folder)?;
        let path = self.file_path(&folder, name)?;
        Self::require_file(&path).await?;
        self.links.insert(&folder, name).await?;
        tracing::info!(folder = %folder, file = %name, "File made public");
        Ok(permanent_url(&folder, name))
    }

    /// Remove a file from the public set. Returns whether it was public.
    pub async fn make_private(&self, folder: &str, name: &str) -> Result<bool> {
        let folder = VirtualPath::parse(folder)?;
        self.file_path(&folder, name)?;
        let was_public = self.links.remove(&folder, name).await?;
        if was_public {
            tracing::info!(folder = %folder, file = %name, "File made private");
        }
        Ok(was_public)
    }

    pub async fn public_status(&self, folder: &str, name: &str) -> Result<PublicStatus> {
        let folder = VirtualPath::parse(folder)?;
        self.file_path(&folder, name)?;
        let is_public = self.links.is_public(&folder, name);
        Ok(PublicStatus {
            is_public,
            public_link: is_public.then(|| permanent_url(&folder, name)),
        })
    }

    // ----- bulk -----

    pub async fn bulk_delete(&self, folder: &str, names: &[String]) -> Result<Vec<BulkItem>> {
        let folder = VirtualPath::parse(folder)?;
        Ok(self.bulk.delete(&folder, names).await)
    }

    pub async fn bulk_archive(
        &self,
        folder: &str,
        files: &[String],
        folders: &[String],
        archive_name: Option<&str>,
    ) -> Result<ArchiveSummary> {
        let folder = VirtualPath::parse(folder)?;
        self.bulk.archive(&folder, files, folders, archive_name).await
    }

    pub async fn bulk_unarchive(&self, folder: &str, names: &[String]) -> Result<Vec<BulkItem>> {
        let folder = VirtualPath::parse(folder)?;
        Ok(self.bulk.unarchive(&folder, names).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn setup_storage() -> (TempDir, StorageService) {
        let temp_dir = TempDir::new().unwrap();
        let service = StorageService::new(
            temp_dir.path(),
            PublicLinkRegistry::in_memory(),
            SearchZone::Local,
        )
        .unwrap();
        (temp_dir, service)
    }

    async fn read_all(mut download: Download) -> Vec<u8> {
        let mut buf = Vec::new();
        download.file.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_new_creates_root_and_staging() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("storage");
        StorageService::new(&root, PublicLinkRegistry::in_memory(), SearchZone::Local).unwrap();
        assert!(root.join("tmp").is_dir());
    }

    #[tokio::test]
    async fn test_new_sweeps_stale_staging_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("tmp")).unwrap();
        std::fs::write(dir.path().join("tmp/old.part"), b"stale").unwrap();
        StorageService::new(dir.path(), PublicLinkRegistry::in_memory(), SearchZone::Local).unwrap();
        assert!(!dir.path().join("tmp/old.part").exists());
    }

    #[tokio::test]
    async fn test_upload_and_download_round_trip() {
        let (_dir, service) = setup_storage();
        let receipt = service.upload_bytes("Docs", "a.txt", b"hello").await.unwrap();
        assert_eq!(receipt.final_name, "a.txt");
        assert_eq!(receipt.original_name, "a.txt");
        assert_eq!(receipt.size_bytes, 5);
        assert_eq!(receipt.folder, "Docs");

        let download = service.open_download("Docs", &receipt.final_name).await.unwrap();
        assert_eq!(download.size_bytes, 5);
        assert_eq!(read_all(download).await, b"hello");
    }

    #[tokio::test]
    async fn test_upload_allocates_in_target_folder() {
        let (_dir, service) = setup_storage();
        service.upload_bytes("", "a.txt", b"root").await.unwrap();

        // Free in Docs even though the root already has one.
        let first = service.upload_bytes("Docs", "a.txt", b"1").await.unwrap();
        let second = service.upload_bytes("Docs", "a.txt", b"2").await.unwrap();
        assert_eq!(first.final_name, "a.txt");
        assert_eq!(second.final_name, "a (1).txt");
    }

    #[tokio::test]
    async fn test_concurrent_uploads_never_share_a_name() {
        let (_dir, service) = setup_storage();
        let service = Arc::new(service);

        let mut handles = Vec::new();
        for i in 0..8u8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.upload_bytes("Docs", "same.txt", &[i]).await.unwrap().final_name
            }));
        }
        let mut names = Vec::new();
        for handle in handles {
            names.push(handle.await.unwrap());
        }
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 8);
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_input() {
        let (dir, service) = setup_storage();
        assert!(matches!(
            service.upload_bytes("../etc", "a.txt", b"x").await,
            Err(XcloudError::InvalidPath(_))
        ));
        assert!(matches!(
            service.upload_bytes("", "../a.txt", b"x").await,
            Err(XcloudError::InvalidPath(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_upload_over_limit() {
        let (dir, service) = setup_storage();
        let service = service.with_max_upload_bytes(4);
        assert!(matches!(
            service.upload_bytes("", "big.bin", b"12345").await,
            Err(XcloudError::TooLarge(4))
        ));
        assert!(!dir.path().join("big.bin").exists());
        assert_eq!(std::fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_create_folder() {
        let (dir, service) = setup_storage();
        let created = service.create_folder("", "Docs").await.unwrap();
        assert_eq!(created.folder_name, "Docs");
        assert_eq!(created.path, "Docs");

        let nested = service.create_folder("Docs", "Work").await.unwrap();
        assert_eq!(nested.path, "Docs/Work");
        assert!(dir.path().join("Docs/Work").is_dir());

        assert!(matches!(
            service.create_folder("", "Docs").await,
            Err(XcloudError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_create_folder_rejects_bad_names() {
        let (_dir, service) = setup_storage();
        for name in ["", "   ", "a.b", "../x", " Docs", "a/b"] {
            assert!(
                matches!(service.create_folder("", name).await, Err(XcloudError::InvalidName(_))),
                "{name:?}"
            );
        }
        assert!(matches!(
            service.create_folder("", "tmp").await,
            Err(XcloudError::InvalidPath(_))
        ));
        assert!(service.create_folder("Docs", "tmp").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_folder() {
        let (dir, service) = setup_storage();
        service.create_folder("", "Docs").await.unwrap();
        service.upload_bytes("Docs", "a.txt", b"x").await.unwrap();
        service.upload_bytes("", "plain.txt", b"x").await.unwrap();

        assert!(matches!(
            service.delete_folder("", "plain.txt").await,
            Err(XcloudError::InvalidName(_))
        ));
        assert!(matches!(
            service.delete_folder("", "Missing").await,
            Err(XcloudError::NotFound(_))
        ));

        service.delete_folder("", "Docs").await.unwrap();
        assert!(!dir.path().join("Docs").exists());
    }

    #[tokio::test]
    async fn test_list_after_upload() {
        let (_dir, service) = setup_storage();
        service.create_folder("", "Docs").await.unwrap();
        service.upload_bytes("Docs", "a.txt", b"abc").await.unwrap();

        let listing = service.list("Docs").await.unwrap();
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].display_name, "a.txt");

        let root = service.list("").await.unwrap();
        assert_eq!(root.folders.len(), 1);
        assert!(root.files.is_empty());
    }

    #[tokio::test]
    async fn test_public_link_lifecycle() {
        let (_dir, service) = setup_storage();
        service.upload_bytes("Docs", "a.txt", b"abc").await.unwrap();

        let link = service.make_public("Docs", "a.txt").await.unwrap();
        assert_eq!(link, "/Docs/a.txt");
        assert_eq!(service.make_public("Docs", "a.txt").await.unwrap(), link);

        let status = service.public_status("Docs", "a.txt").await.unwrap();
        assert!(status.is_public);
        assert_eq!(status.public_link.as_deref(), Some("/Docs/a.txt"));

        let download = service.permanent_download(Some("Docs"), "a.txt").await.unwrap();
        assert_eq!(read_all(download).await, b"abc");

        assert!(service.make_private("Docs", "a.txt").await.unwrap());
        assert!(!service.make_private("Docs", "a.txt").await.unwrap());

        let status = service.public_status("Docs", "a.txt").await.unwrap();
        assert!(!status.is_public);
        assert!(status.public_link.is_none());

        assert!(matches!(
            service.permanent_download(Some("Docs"), "a.txt").await,
            Err(XcloudError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_make_public_requires_file() {
        let (_dir, service) = setup_storage();
        assert!(matches!(
            service.make_public("", "ghost.txt").await,
            Err(XcloudError::NotFound(_))
        ));
        assert!(service.links().is_empty());
    }

    #[tokio::test]
    async fn test_permanent_download_denies_before_existence_check() {
        let (_dir, service) = setup_storage();
        assert!(matches!(
            service.permanent_download(None, "ghost.txt").await,
            Err(XcloudError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_deleting_public_file_leaves_dangling_link() {
        let (_dir, service) = setup_storage();
        service.upload_bytes("", "shared.txt", b"x").await.unwrap();
        service.make_public("", "shared.txt").await.unwrap();

        service.delete_file("", "shared.txt").await.unwrap();

        // The registry keeps the entry; the download reports the file as missing.
        assert!(service.public_status("", "shared.txt").await.unwrap().is_public);
        assert!(matches!(
            service.permanent_download(None, "shared.txt").await,
            Err(XcloudError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_file_missing() {
        let (_dir, service) = setup_storage();
        assert!(matches!(
            service.delete_file("", "nope.txt").await,
            Err(XcloudError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_global_stats_ignores_staging() {
        let (_dir, service) = setup_storage();
        service.upload_bytes("", "a.txt", b"12").await.unwrap();
        service.upload_bytes("Docs", "b.txt", b"345").await.unwrap();
        let _pending = service.begin_upload("pending.bin").await.unwrap();

        let stats = service.global_stats().await.unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_size, 5);
        assert_eq!(stats.total_folders, 1);
    }
}
