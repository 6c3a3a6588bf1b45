//! Staged uploads.
//!
//! Incoming bytes are written to `tmp/{uuid}.part` and only moved into the
//! namespace once complete. A staged file that is never committed is removed
//! when the [`StagedUpload`] is dropped.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::path::validate_file_name;
use crate::{Result, XcloudError};

/// An upload in progress, owned by the staging directory until committed.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    original_name: String,
    file: Option<File>,
    size: u64,
    limit: Option<u64>,
    committed: bool,
}

impl StagedUpload {
    /// Open a new staging file for an upload called `original_name`.
    pub async fn create(staging_dir: &Path, original_name: &str) -> Result<Self> {
        validate_file_name(original_name)?;
        fs::create_dir_all(staging_dir).await?;
        let path = staging_dir.join(format!("{}.part", Uuid::new_v4()));
        let file = File::create(&path).await?;
        Ok(Self {
            path,
            original_name: original_name.to_string(),
            file: Some(file),
            size: 0,
            limit: None,
            committed: false,
        })
    }

    /// Refuse chunks that would take the upload past `max_bytes`.
    pub fn with_limit(mut self, max_bytes: u64) -> Self {
        self.limit = Some(max_bytes);
        self
    }

    /// Append a chunk.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if let Some(limit) = self.limit {
            if self.size + chunk.len() as u64 > limit {
                return Err(XcloudError::TooLarge(limit));
            }
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| XcloudError::Io(io::Error::other("staged upload already closed")))?;
        file.write_all(chunk).await?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    /// Hand the staging file to blocking code (e.g. a zip writer).
    ///
    /// The recorded size is taken from the file afterwards.
    pub async fn fill_blocking<T, F>(&mut self, fill: F) -> Result<T>
    where
        F: FnOnce(&mut std::fs::File) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let file = self
            .file
            .take()
            .ok_or_else(|| XcloudError::Io(io::Error::other("staged upload already closed")))?;
        let mut std_file = file.into_std().await;
        let (std_file, value) = tokio::task::spawn_blocking(move || {
            let value = fill(&mut std_file)?;
            Ok::<_, XcloudError>((std_file, value))
        })
        .await??;
        self.size = std_file.metadata()?.len();
        self.file = Some(File::from_std(std_file));
        Ok(value)
    }

    /// Bytes written so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Name the client sent.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Path of the staging file.
    pub fn staged_path(&self) -> &Path {
        &self.path
    }

    /// Move the staged bytes to `target`.
    ///
    /// Falls back to copy-then-rename when a plain rename is not possible
    /// (e.g. staging and target on different filesystems). The target never
    /// holds a partial file.
    pub async fn commit(mut self, target: &Path) -> Result<u64> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }

        match fs::rename(&self.path, target).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(e.into()),
            Err(e) => {
                tracing::debug!(error = %e, "Rename failed, copying staged upload instead");
                self.copy_into_place(target).await?;
            }
        }

        self.committed = true;
        Ok(self.size)
    }

    async fn copy_into_place(&self, target: &Path) -> Result<()> {
        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| XcloudError::InvalidPath("commit target has no file name".to_string()))?;
        let partial = target.with_file_name(format!(".{file_name}.partial"));

        let copied = fs::copy(&self.path, &partial).await;
        let copied = match copied {
            Ok(n) if n == self.size => n,
            Ok(n) => {
                let _ = fs::remove_file(&partial).await;
                return Err(XcloudError::Io(io::Error::other(format!(
                    "copied {n} of {} bytes",
                    self.size
                ))));
            }
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e.into());
            }
        };

        if let Err(e) = fs::rename(&partial, target).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }
        tracing::trace!(bytes = copied, "Copied staged upload into place");

        if let Err(e) = fs::remove_file(&self.path).await {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staged upload");
        }
        Ok(())
    }

    /// Remove the staged bytes now.
    pub async fn discard(mut self) {
        self.file.take();
        if let Err(e) = fs::remove_file(&self.path).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to discard staged upload");
            }
        }
        self.committed = true;
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove abandoned upload");
            }
        }
    }
}
