//! Request DTOs for Web API.

use serde::Deserialize;
use validator::Validate;

use super::validation::no_control_chars;

/// Create folder request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    /// Name of the new folder.
    #[validate(
        length(max = 255, message = "Folder name is too long"),
        custom(function = "no_control_chars")
    )]
    #[serde(default)]
    pub name: String,
    /// Virtual folder to create it in (root when empty).
    #[serde(default)]
    pub parent_folder: String,
}

/// Bulk delete / unarchive request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkFilesRequest {
    #[validate(length(min = 1, message = "Files array is required"))]
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub folder: String,
}

/// Bulk archive request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkArchiveRequest {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub folders: Vec<String>,
    #[serde(default)]
    pub folder: String,
    /// Requested archive name; a timestamped name is used when blank.
    #[validate(length(max = 255, message = "Archive name is too long"))]
    pub archive_name: Option<String>,
}

/// `?folder=` query.
#[derive(Debug, Default, Deserialize)]
pub struct FolderQuery {
    #[serde(default)]
    pub folder: String,
}

/// `?parentFolder=` query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentFolderQuery {
    #[serde(default)]
    pub parent_folder: String,
}

/// Date search query.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub date: Option<String>,
    #[serde(default)]
    pub folder: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_folder_request_camel_case() {
        let req: CreateFolderRequest =
            serde_json::from_str(r#"{"name":"Docs","parentFolder":"Work"}"#).unwrap();
        assert_eq!(req.name, "Docs");
        assert_eq!(req.parent_folder, "Work");
        assert!(req.validate().is_ok());

        let req: CreateFolderRequest = serde_json::from_str(r#"{"name":"Docs"}"#).unwrap();
        assert_eq!(req.parent_folder, "");
    }

    #[test]
    fn test_create_folder_rejects_control_chars() {
        let req: CreateFolderRequest =
            serde_json::from_str(r#"{"name":"bad\u0007name"}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_bulk_files_request_requires_files() {
        let req: BulkFilesRequest = serde_json::from_str(r#"{"folder":"x"}"#).unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("files"));

        let req: BulkFilesRequest =
            serde_json::from_str(r#"{"files":["a.txt"],"folder":"x"}"#).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_bulk_archive_request() {
        let req: BulkArchiveRequest = serde_json::from_str(
            r#"{"files":["a.txt"],"folders":[],"archiveName":"bundle.zip"}"#,
        )
        .unwrap();
        assert_eq!(req.files, ["a.txt"]);
        assert_eq!(req.archive_name.as_deref(), Some("bundle.zip"));
        assert!(req.validate().is_ok());

        let req: BulkArchiveRequest = serde_json::from_str("{}").unwrap();
        assert!(req.files.is_empty() && req.folders.is_empty());
        assert!(req.archive_name.is_none());
    }

    #[test]
    fn test_overlong_archive_name_is_invalid() {
        let body = format!(r#"{{"files":["a"],"archiveName":"{}"}}"#, "x".repeat(300));
        let req: BulkArchiveRequest = serde_json::from_str(&body).unwrap();
        assert!(req.validate().is_err());
    }
}
