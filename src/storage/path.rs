//! Virtual path parsing and safe resolution onto the storage root.
//!
//! A virtual folder is a `/`-separated list of segments. Each segment must
//! consist of ASCII letters, digits, Cyrillic letters (`А-Я`, `а-я`), spaces,
//! `_` or `-`. File names are looser (they may contain dots, parentheses and
//! any Unicode) but must still be a single path component.
//!
//! Resolution never touches the filesystem.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::{Result, XcloudError};

/// Name of the staging directory at the storage root.
pub const STAGING_DIR: &str = "tmp";

/// Maximum length of a single file name, in bytes.
pub const MAX_NAME_BYTES: usize = 255;

/// Whether `c` may appear in a folder segment.
fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, 'А'..='Я' | 'а'..='я' | ' ' | '_' | '-')
}

/// Check a folder (or archive stem) name against the segment rule.
///
/// Leading or trailing whitespace counts as a mismatch.
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.trim() == segment
        && segment.len() <= MAX_NAME_BYTES
        && segment.chars().all(is_segment_char)
}

/// Check that a file name is a single, non-special path component.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(XcloudError::InvalidPath("file name is empty".to_string()));
    }
    if name == "." || name == ".." {
        return Err(XcloudError::InvalidPath(format!("'{name}' is not a file name")));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(XcloudError::InvalidPath(
            "file name contains a separator or null byte".to_string(),
        ));
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(XcloudError::InvalidPath("file name is too long".to_string()));
    }
    Ok(())
}

/// A validated virtual folder path. The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VirtualPath {
    segments: Vec<String>,
}

impl VirtualPath {
    /// The storage root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a client-supplied folder string. Surrounding slashes are ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_matches('/');
        let mut path = Self::root();
        if trimmed.is_empty() {
            return Ok(path);
        }
        for segment in trimmed.split('/') {
            path = path.join(segment)?;
        }
        Ok(path)
    }

    /// Append one segment, validating it.
    pub fn join(&self, segment: &str) -> Result<Self> {
        if segment.contains('\0') {
            return Err(XcloudError::InvalidPath("folder contains a null byte".to_string()));
        }
        if !is_valid_segment(segment) {
            return Err(XcloudError::InvalidPath(format!(
                "folder segment '{segment}' contains illegal characters"
            )));
        }
        if self.is_root() && segment == STAGING_DIR {
            return Err(XcloudError::InvalidPath(format!(
                "'{STAGING_DIR}' is reserved at the root"
            )));
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// The individual segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this is the storage root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Maps virtual paths onto the physical storage root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for the given storage root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The staging directory used for in-flight uploads and archives.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Resolve a raw `(folder, name?)` pair to an absolute path.
    pub fn resolve(&self, folder: &str, name: Option<&str>) -> Result<PathBuf> {
        let folder = VirtualPath::parse(folder)?;
        match name {
            Some(name) => self.file(&folder, name),
            None => self.folder(&folder),
        }
    }

    /// Physical directory of a virtual folder.
    pub fn folder(&self, folder: &VirtualPath) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in folder.segments() {
            path.push(segment);
        }
        self.ensure_inside(&path)?;
        Ok(path)
    }

    /// Physical path of a file (or child folder) inside a virtual folder.
    pub fn file(&self, folder: &VirtualPath, name: &str) -> Result<PathBuf> {
        validate_file_name(name)?;
        if folder.is_root() && name == STAGING_DIR {
            return Err(XcloudError::InvalidPath(format!(
                "'{STAGING_DIR}' is reserved at the root"
            )));
        }
        let path = self.folder(folder)?.join(name);
        self.ensure_inside(&path)?;
        Ok(path)
    }

    /// Physical path of an archive-relative entry (e.g. `docs/a.txt`) under a folder.
    pub fn entry(&self, folder: &VirtualPath, relative: &Path) -> Result<PathBuf> {
        let mut path = self.folder(folder)?;
        let mut first = true;
        for component in relative.components() {
            let Component::Normal(part) = component else {
                return Err(XcloudError::InvalidPath(format!(
                    "entry '{}' escapes its folder",
                    relative.display()
                )));
            };
            let part = part.to_str().ok_or_else(|| {
                XcloudError::InvalidPath("entry name is not valid UTF-8".to_string())
            })?;
            validate_file_name(part)?;
            if first && folder.is_root() && part == STAGING_DIR {
                return Err(XcloudError::InvalidPath(format!(
                    "'{STAGING_DIR}' is reserved at the root"
                )));
            }
            first = false;
            path.push(part);
        }
        if first {
            return Err(XcloudError::InvalidPath("entry name is empty".to_string()));
        }
        self.ensure_inside(&path)?;
        Ok(path)
    }

    /// Lexical containment check, independent of segment validation.
    fn ensure_inside(&self, path: &Path) -> Result<()> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| XcloudError::InvalidPath("path escapes the storage root".to_string()))?;
        if relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            Ok(())
        } else {
            Err(XcloudError::InvalidPath(
                "path escapes the storage root".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new("/srv/storage")
    }

    #[test]
    fn test_segment_rule() {
        assert!(is_valid_segment("Docs"));
        assert!(is_valid_segment("My Files_2024-01"));
        assert!(is_valid_segment("Документы"));
        assert!(!is_valid_segment(""));
        assert!(!is_valid_segment("."));
        assert!(!is_valid_segment(".."));
        assert!(!is_valid_segment("a.b"));
        assert!(!is_valid_segment(" padded"));
        assert!(!is_valid_segment("a/b"));
        assert!(!is_valid_segment("a\0b"));
        assert!(!is_valid_segment("emoji📁"));
    }

    #[test]
    fn test_parse_root() {
        assert!(VirtualPath::parse("").unwrap().is_root());
        assert!(VirtualPath::parse("/").unwrap().is_root());
    }

    #[test]
    fn test_parse_nested() {
        let path = VirtualPath::parse("/Docs/Work/").unwrap();
        assert_eq!(path.segments(), &["Docs".to_string(), "Work".to_string()]);
        assert_eq!(path.to_string(), "Docs/Work");
    }

    #[test]
    fn test_parse_rejects_traversal() {
        for raw in ["..", "Docs/..", "../etc", "Docs//Work", "Docs/./Work", "a\0b", "a\\b"] {
            assert!(
                matches!(VirtualPath::parse(raw), Err(XcloudError::InvalidPath(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_staging_at_root() {
        assert!(VirtualPath::parse("tmp").is_err());
        assert!(VirtualPath::parse("Docs/tmp").is_ok());
    }

    #[test]
    fn test_resolve_stays_inside_root() {
        let r = resolver();
        let path = r.resolve("Docs/Work", Some("report (1).pdf")).unwrap();
        assert_eq!(path, PathBuf::from("/srv/storage/Docs/Work/report (1).pdf"));
        assert!(path.starts_with(r.root()));
        assert_ne!(path, r.root());

        let dir = r.resolve("Docs", None).unwrap();
        assert_eq!(dir, PathBuf::from("/srv/storage/Docs"));
    }

    #[test]
    fn test_resolve_rejects_bad_file_names() {
        let r = resolver();
        for name in ["", ".", "..", "../secret", "a/b", "a\\b", "nul\0byte"] {
            assert!(
                matches!(r.resolve("Docs", Some(name)), Err(XcloudError::InvalidPath(_))),
                "{name:?} should be rejected"
            );
        }
        assert!(r.resolve("", Some("tmp")).is_err());
        assert!(r.resolve("Docs", Some("tmp")).is_ok());
    }

    #[test]
    fn test_resolve_rejects_absolute_injection() {
        let r = resolver();
        // A leading slash is treated as relative to the root, never absolute.
        let path = r.resolve("/etc/passwd", None).unwrap();
        assert_eq!(path, PathBuf::from("/srv/storage/etc/passwd"));
        assert!(r.resolve("", Some("/etc/passwd")).is_err());
    }

    #[test]
    fn test_entry_paths() {
        let r = resolver();
        let folder = VirtualPath::parse("Docs").unwrap();
        assert_eq!(
            r.entry(&folder, Path::new("inner/a.txt")).unwrap(),
            PathBuf::from("/srv/storage/Docs/inner/a.txt")
        );
        assert!(r.entry(&folder, Path::new("../escape.txt")).is_err());
        assert!(r.entry(&folder, Path::new("/abs.txt")).is_err());
        assert!(r.entry(&folder, Path::new("")).is_err());
        assert!(r.entry(&VirtualPath::root(), Path::new("tmp/x.txt")).is_err());
        assert!(r.entry(&folder, Path::new("tmp/x.txt")).is_ok());
    }

    #[test]
    fn test_ensure_inside_is_independent() {
        let r = resolver();
        assert!(r.ensure_inside(Path::new("/srv/storage/a/../../etc")).is_err());
        assert!(r.ensure_inside(Path::new("/elsewhere/a")).is_err());
        assert!(r.ensure_inside(Path::new("/srv/storage/a/b")).is_ok());
    }
}
