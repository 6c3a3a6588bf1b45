//! Collision-free name allocation.
//!
//! `a.txt` is returned unchanged when free; otherwise `a (1).txt`,
//! `a (2).txt`, ... are probed in order against the target directory and the
//! first free candidate wins.

use std::path::Path;

use tokio::fs;

use crate::{Result, XcloudError};

/// Upper bound on the number of suffixes probed before giving up.
pub const MAX_COLLISION_PROBES: u32 = 50_000;

/// Split a file name into `(base, extension)`, the extension keeping its dot.
///
/// Follows the usual "last dot, not leading" rule: `archive.tar.gz` gives
/// `("archive.tar", ".gz")`, `.env` and `README` have no extension.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// The `n`-th collision candidate for `name`.
pub fn suffixed(name: &str, n: u32) -> String {
    let (base, ext) = split_name(name);
    format!("{base} ({n}){ext}")
}

/// Return the first free name for `desired` inside `dir`.
///
/// Must be called against the directory the file will finally live in.
pub async fn allocate(dir: &Path, desired: &str) -> Result<String> {
    if !fs::try_exists(dir.join(desired)).await? {
        return Ok(desired.to_string());
    }
    for n in 1..=MAX_COLLISION_PROBES {
        let candidate = suffixed(desired, n);
        if !fs::try_exists(dir.join(&candidate)).await? {
            return Ok(candidate);
        }
    }
    Err(XcloudError::ResourceExhausted(format!(
        "no free name for '{desired}' after {MAX_COLLISION_PROBES} attempts"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("a.txt"), ("a", ".txt"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_name("README"), ("README", ""));
        assert_eq!(split_name(".env"), (".env", ""));
        assert_eq!(split_name("trailing."), ("trailing", "."));
    }

    #[test]
    fn test_suffixed() {
        assert_eq!(suffixed("a.txt", 1), "a (1).txt");
        assert_eq!(suffixed("README", 3), "README (3)");
        assert_eq!(suffixed("report (1).pdf", 1), "report (1) (1).pdf");
    }

    #[tokio::test]
    async fn test_allocate_free_name() {
        let dir = TempDir::new().unwrap();
        assert_eq!(allocate(dir.path(), "a.txt").await.unwrap(), "a.txt");
    }

    #[tokio::test]
    async fn test_allocate_probes_in_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"1").unwrap();
        assert_eq!(allocate(dir.path(), "a.txt").await.unwrap(), "a (1).txt");

        std::fs::write(dir.path().join("a (1).txt"), b"2").unwrap();
        assert_eq!(allocate(dir.path(), "a.txt").await.unwrap(), "a (2).txt");
    }

    #[tokio::test]
    async fn test_allocate_returns_lowest_free_slot() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"").unwrap();
        std::fs::write(dir.path().join("a (2).txt"), b"").unwrap();
        assert_eq!(allocate(dir.path(), "a.txt").await.unwrap(), "a (1).txt");
    }

    #[tokio::test]
    async fn test_allocate_counts_directories_as_taken() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("notes")).unwrap();
        assert_eq!(allocate(dir.path(), "notes").await.unwrap(), "notes (1)");
    }

    #[tokio::test]
    async fn test_allocate_is_deterministic() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.bin"), b"").unwrap();
        let first = allocate(dir.path(), "b.bin").await.unwrap();
        let second = allocate(dir.path(), "b.bin").await.unwrap();
        assert_eq!(first, second);
    }
}
