//! Registry of files that may be downloaded without an API key.
//!
//! The registry is a key lookup only. It never owns file lifetime, so an
//! entry can outlive the file it names; such a dangling entry resolves to
//! "not found" at download time.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::path::VirtualPath;
use crate::Result;

/// One public link record, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicLink {
    pub filename: String,
    pub folder: String,
    #[serde(rename = "createdAt", alias = "created")]
    pub created_at: DateTime<Utc>,
}

/// Registry key: `"{folder}/{name}"`, or the bare name at the root.
pub fn link_key(folder: &VirtualPath, name: &str) -> String {
    if folder.is_root() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

/// Permanent URL path for a file.
///
/// The folder is encoded as a single component, so `Docs/Work` becomes
/// `Docs%2FWork` and the link always has at most two segments.
pub fn permanent_url(folder: &VirtualPath, name: &str) -> String {
    if folder.is_root() {
        format!("/{}", urlencoding::encode(name))
    } else {
        format!(
            "/{}/{}",
            urlencoding::encode(&folder.to_string()),
            urlencoding::encode(name)
        )
    }
}

/// Persistence backend for the link table.
pub trait LinkStore: Send + Sync {
    /// Read the whole table.
    fn load(&self) -> Result<BTreeMap<String, PublicLink>>;
    /// Replace the whole table.
    fn save(&self, links: &BTreeMap<String, PublicLink>) -> Result<()>;
}

/// JSON document on disk, rewritten in full on every save.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LinkStore for JsonFileStore {
    fn load(&self) -> Result<BTreeMap<String, PublicLink>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(links) => Ok(links),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Public link document is unreadable, starting with no public links"
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn save(&self, links: &BTreeMap<String, PublicLink>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(links).map_err(io::Error::other)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    links: Mutex<BTreeMap<String, PublicLink>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what was last saved.
    pub fn saved(&self) -> BTreeMap<String, PublicLink> {
        self.links.lock().clone()
    }
}

impl LinkStore for MemoryStore {
    fn load(&self) -> Result<BTreeMap<String, PublicLink>> {
        Ok(self.links.lock().clone())
    }

    fn save(&self, links: &BTreeMap<String, PublicLink>) -> Result<()> {
        *self.links.lock() = links.clone();
        Ok(())
    }
}

/// The process-wide public link table.
///
/// Mutations are written through to the store before they become visible:
/// a failed save leaves the table exactly as it was.
pub struct PublicLinkRegistry {
    links: RwLock<BTreeMap<String, PublicLink>>,
    /// Serializes mutations so each save sees the previous one.
    writer: tokio::sync::Mutex<()>,
    store: Arc<dyn LinkStore>,
}

impl PublicLinkRegistry {
    /// Load the table from `store`.
    pub fn load(store: Box<dyn LinkStore>) -> Result<Self> {
        let links = store.load()?;
        tracing::debug!(count = links.len(), "Loaded public links");
        Ok(Self {
            links: RwLock::new(links),
            writer: tokio::sync::Mutex::new(()),
            store: Arc::from(store),
        })
    }

    /// A registry backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self {
            links: RwLock::new(BTreeMap::new()),
            writer: tokio::sync::Mutex::new(()),
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Insert or overwrite the entry for `(folder, name)` and persist.
    pub async fn insert(&self, folder: &VirtualPath, name: &str) -> Result<PublicLink> {
        let link = PublicLink {
            filename: name.to_string(),
            folder: folder.to_string(),
            created_at: Utc::now(),
        };

        let _writer = self.writer.lock().await;
        let mut next = self.links.read().clone();
        next.insert(link_key(folder, name), link.clone());
        self.publish(next).await?;
        Ok(link)
    }

    /// Remove the entry and persist. Returns whether it existed.
    pub async fn remove(&self, folder: &VirtualPath, name: &str) -> Result<bool> {
        let key = link_key(folder, name);

        let _writer = self.writer.lock().await;
        let mut next = self.links.read().clone();
        if next.remove(&key).is_none() {
            return Ok(false);
        }
        self.publish(next).await?;
        Ok(true)
    }

    /// Save `next` off the runtime threads, then make it the live table.
    async fn publish(&self, next: BTreeMap<String, PublicLink>) -> Result<()> {
        let store = self.store.clone();
        let next = tokio::task::spawn_blocking(move || store.save(&next).map(|()| next)).await??;
        *self.links.write() = next;
        Ok(())
    }

    pub fn is_public(&self, folder: &VirtualPath, name: &str) -> bool {
        self.links.read().contains_key(&link_key(folder, name))
    }

    pub fn get(&self, folder: &VirtualPath, name: &str) -> Option<PublicLink> {
        self.links.read().get(&link_key(folder, name)).cloned()
    }

    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.read().is_empty()
    }
}

impl std::fmt::Debug for PublicLinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicLinkRegistry")
            .field("links", &self.len())
            .finish()
    }
}
