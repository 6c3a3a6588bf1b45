//! Response DTOs for Web API.

use serde::Serialize;

use crate::datetime::to_rfc3339;
use crate::storage::{
    ArchiveSummary, BulkItem, CreatedFolder, FileEntry, FolderEntry, Listing, PublicStatus,
    StorageStats, UploadReceipt,
};

/// Plain message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `OK` while the process serves requests.
    pub status: &'static str,
    /// Current server time (RFC 3339).
    pub timestamp: String,
}

// ============================================================================
// Listing
// ============================================================================

/// A file in a listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileItem {
    /// Stored name; the key for every per-file operation.
    pub name: String,
    /// Name to show to users.
    pub display_name: String,
    /// Size in bytes.
    pub size: u64,
    pub created: String,
    pub modified: String,
    /// Same as `created`; kept for clients that sort by upload time.
    pub upload_time: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl From<FileEntry> for FileItem {
    fn from(entry: FileEntry) -> Self {
        let created = to_rfc3339(&entry.created_at);
        Self {
            name: entry.stored_name,
            display_name: entry.display_name,
            size: entry.size_bytes,
            upload_time: created.clone(),
            created,
            modified: to_rfc3339(&entry.modified_at),
            kind: "file",
        }
    }
}

/// A folder in a listing.
#[derive(Debug, Serialize)]
pub struct FolderItem {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub created: String,
    pub modified: String,
}

impl From<FolderEntry> for FolderItem {
    fn from(entry: FolderEntry) -> Self {
        Self {
            name: entry.name,
            kind: "folder",
            created: to_rfc3339(&entry.created_at),
            modified: to_rfc3339(&entry.modified_at),
        }
    }
}

/// Folder listing, optionally filtered by date.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    pub files: Vec<FileItem>,
    pub folders: Vec<FolderItem>,
    pub current_folder: String,
    /// The searched date (`YYYY-MM-DD`), only on search results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_date: Option<String>,
}

impl ListingResponse {
    /// Build a listing sorted by name, case-insensitively.
    pub fn new(listing: Listing, current_folder: impl Into<String>) -> Self {
        let mut files: Vec<FileItem> = listing.files.into_iter().map(FileItem::from).collect();
        files.sort_by_cached_key(|f| (f.display_name.to_lowercase(), f.name.clone()));

        let mut folders: Vec<FolderItem> =
            listing.folders.into_iter().map(FolderItem::from).collect();
        folders.sort_by_cached_key(|f| (f.name.to_lowercase(), f.name.clone()));

        Self {
            files,
            folders,
            current_folder: current_folder.into(),
            search_date: None,
        }
    }

    pub fn with_search_date(mut self, date: impl Into<String>) -> Self {
        self.search_date = Some(date.into());
        self
    }
}

/// Storage-wide totals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_files: u64,
    pub total_size: u64,
    pub total_folders: u64,
}

impl From<StorageStats> for StatsResponse {
    fn from(stats: StorageStats) -> Self {
        Self {
            total_files: stats.total_files,
            total_size: stats.total_size,
            total_folders: stats.total_folders,
        }
    }
}

// ============================================================================
// Files and folders
// ============================================================================

/// Upload response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: &'static str,
    /// Name the file was stored under (may carry a ` (n)` suffix).
    pub final_name: String,
    /// Same as `final_name`, for older clients.
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub folder: String,
}

impl From<UploadReceipt> for UploadResponse {
    fn from(receipt: UploadReceipt) -> Self {
        Self {
            message: "File uploaded successfully",
            filename: receipt.final_name.clone(),
            final_name: receipt.final_name,
            original_name: receipt.original_name,
            size: receipt.size_bytes,
            folder: receipt.folder,
        }
    }
}

/// Create folder response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderResponse {
    pub message: &'static str,
    pub folder_name: String,
    pub path: String,
}

impl From<CreatedFolder> for CreateFolderResponse {
    fn from(created: CreatedFolder) -> Self {
        Self {
            message: "Folder created successfully",
            folder_name: created.folder_name,
            path: created.path,
        }
    }
}

/// Make-public response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicLinkResponse {
    pub message: &'static str,
    pub public_link: String,
}

impl PublicLinkResponse {
    pub fn new(public_link: String) -> Self {
        Self {
            message: "File made public",
            public_link,
        }
    }
}

/// Public status of a file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStatusResponse {
    pub is_public: bool,
    pub public_link: Option<String>,
}

impl From<PublicStatus> for PublicStatusResponse {
    fn from(status: PublicStatus) -> Self {
        Self {
            is_public: status.is_public,
            public_link: status.public_link,
        }
    }
}

// ============================================================================
// Bulk operations
// ============================================================================

/// Outcome for one item of a bulk request.
#[derive(Debug, Serialize)]
pub struct BulkResultItem {
    pub filename: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<BulkItem> for BulkResultItem {
    fn from(item: BulkItem) -> Self {
        Self {
            status: item.outcome.status(),
            error: item.outcome.error().map(str::to_string),
            filename: item.filename,
        }
    }
}

/// Bulk delete / unarchive response.
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub message: &'static str,
    pub results: Vec<BulkResultItem>,
}

impl BulkResponse {
    pub fn new(message: &'static str, items: Vec<BulkItem>) -> Self {
        Self {
            message,
            results: items.into_iter().map(BulkResultItem::from).collect(),
        }
    }
}

/// Bulk archive response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResponse {
    pub message: &'static str,
    pub archive_name: String,
    pub size: u64,
}

impl From<ArchiveSummary> for ArchiveResponse {
    fn from(summary: ArchiveSummary) -> Self {
        Self {
            message: "Archive created successfully",
            archive_name: summary.archive_name,
            size: summary.size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BulkOutcome;
    use chrono::{TimeZone, Utc};

    fn file(stored: &str, display: &str) -> FileEntry {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        FileEntry {
            stored_name: stored.to_string(),
            display_name: display.to_string(),
            size_bytes: 3,
            created_at: ts,
            modified_at: ts,
        }
    }

    fn folder(name: &str) -> FolderEntry {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        FolderEntry {
            name: name.to_string(),
            created_at: ts,
            modified_at: ts,
        }
    }

    #[test]
    fn test_listing_is_sorted_case_insensitively() {
        let listing = Listing {
            files: vec![file("b.txt", "b.txt"), file("A.txt", "A.txt"), file("c.txt", "c.txt")],
            folders: vec![folder("zeta"), folder("Alpha")],
        };
        let response = ListingResponse::new(listing, "Docs");
        let names: Vec<_> = response.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["A.txt", "b.txt", "c.txt"]);
        assert_eq!(response.folders[0].name, "Alpha");
    }

    #[test]
    fn test_listing_json_shape() {
        let listing = Listing {
            files: vec![file(
                "a1b2c3d4-e5f6-7890-abcd-ef1234567890-report.pdf",
                "report.pdf",
            )],
            folders: vec![folder("Docs")],
        };
        let json = serde_json::to_value(ListingResponse::new(listing, "")).unwrap();

        let f = &json["files"][0];
        assert_eq!(f["displayName"], "report.pdf");
        assert_eq!(f["type"], "file");
        assert_eq!(f["size"], 3);
        assert_eq!(f["created"], f["uploadTime"]);
        assert_eq!(json["folders"][0]["type"], "folder");
        assert_eq!(json["currentFolder"], "");
        assert!(json.get("searchDate").is_none());
    }

    #[test]
    fn test_search_date_is_serialized() {
        let listing = Listing {
            files: vec![],
            folders: vec![],
        };
        let json =
            serde_json::to_value(ListingResponse::new(listing, "").with_search_date("2024-06-01"))
                .unwrap();
        assert_eq!(json["searchDate"], "2024-06-01");
    }

    #[test]
    fn test_bulk_result_items() {
        let items = vec![
            BulkItem {
                filename: "x.txt".to_string(),
                outcome: BulkOutcome::Deleted,
            },
            BulkItem {
                filename: "dir".to_string(),
                outcome: BulkOutcome::Error("Not a file".to_string()),
            },
        ];
        let json = serde_json::to_value(BulkResponse::new("Bulk delete completed", items)).unwrap();
        assert_eq!(json["results"][0]["status"], "deleted");
        assert!(json["results"][0].get("error").is_none());
        assert_eq!(json["results"][1]["status"], "error");
        assert_eq!(json["results"][1]["error"], "Not a file");
    }

    #[test]
    fn test_public_status_camel_case() {
        let json = serde_json::to_value(PublicStatusResponse {
            is_public: false,
            public_link: None,
        })
        .unwrap();
        assert_eq!(json["isPublic"], false);
        assert!(json["publicLink"].is_null());
    }
}
