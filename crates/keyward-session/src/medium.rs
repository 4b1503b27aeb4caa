//! Session media.
//!
//! A medium is a small keyed store of strings. The [`SessionStore`](crate::SessionStore)
//! hands it batches of [`Change`]s; a medium must apply a batch as a unit so
//! that a reader never observes half of a clear.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// One mutation in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Put(&'static str, String),
    Remove(&'static str),
}

/// Backing storage for the session.
pub trait SessionMedium: Send + Sync + std::fmt::Debug {
    /// Load every persisted key.
    fn load(&self) -> Result<BTreeMap<String, String>>;

    /// Apply a batch of changes atomically.
    fn apply(&self, changes: &[Change]) -> Result<()>;
}

fn apply_to(map: &mut BTreeMap<String, String>, changes: &[Change]) {
    for change in changes {
        match change {
            Change::Put(key, value) => {
                map.insert((*key).to_string(), value.clone());
            }
            Change::Remove(key) => {
                map.remove(*key);
            }
        }
    }
}

// ============================================================================
// FileMedium
// ============================================================================

/// JSON document on disk.
///
/// Every batch rewrites the whole document to a sibling temp file and renames
/// it over the original.
#[derive(Debug)]
pub struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the session document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, source: std::io::Error) -> Error {
        Error::StorageUnavailable {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionMedium for FileMedium {
    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| self.unavailable(e))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content)
            .map_err(|e| Error::Corrupt(format!("{}: {}", self.path.display(), e)))
    }

    fn apply(&self, changes: &[Change]) -> Result<()> {
        let mut map = match self.load() {
            Ok(map) => map,
            // A corrupt document is replaced rather than blocking every write.
            Err(Error::Corrupt(msg)) => {
                tracing::warn!(error = %msg, "Discarding corrupt session document");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        apply_to(&mut map, changes);

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.unavailable(e))?;
        }

        let json = serde_json::to_string_pretty(&map)
            .map_err(|e| Error::Corrupt(format!("failed to encode session: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.unavailable(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.unavailable(e))?;

        tracing::debug!(path = %self.path.display(), changes = changes.len(), "Session persisted");
        Ok(())
    }
}

// ============================================================================
// MemoryMedium (for testing and ephemeral sessions)
// ============================================================================

/// In-process medium.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: Mutex<BTreeMap<String, String>>,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from pre-populated entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            fail_writes: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail with `StorageUnavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Raw value of a key, bypassing the store.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

impl SessionMedium for MemoryMedium {
    fn load(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.entries.lock().clone())
    }

    fn apply(&self, changes: &[Change]) -> Result<()> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::StorageUnavailable {
                path: PathBuf::from(":memory:"),
                source: std::io::Error::other("medium is read-only"),
            });
        }
        apply_to(&mut self.entries.lock(), changes);
        Ok(())
    }
}
