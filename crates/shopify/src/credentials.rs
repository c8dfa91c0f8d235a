//! Credential persistence.
//!
//! Credentials live in a string key-value store under a single key. The store
//! is pluggable ([`KeyValueStore`]): [`MemoryStore`] for tests and ephemeral
//! sessions, [`FileStore`] for persistence across restarts.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use pic_finder_core::Credentials;
use tracing::{debug, warn};

use crate::ShopifyError;

/// Key under which the credential record is stored.
pub const CREDENTIALS_KEY: &str = "shopify_credentials";

/// Minimal string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, ShopifyError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), ShopifyError>;

    /// Remove a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), ShopifyError>;
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-process store; contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> ShopifyError {
    ShopifyError::Storage("memory store lock poisoned".to_string())
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ShopifyError> {
        Ok(self.values.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ShopifyError> {
        self.values
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ShopifyError> {
        self.values.write().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

// =============================================================================
// FileStore
// =============================================================================

/// Directory-backed store: one `<key>.json` file per key.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so a crash never leaves a half-written value behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ShopifyError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            ShopifyError::Storage(format!("cannot create {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the store's files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ShopifyError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ShopifyError::Storage(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ShopifyError> {
        let path = self.path_for(key);
        let storage_err =
            |e: std::io::Error| ShopifyError::Storage(format!("cannot write {}: {e}", path.display()));

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(storage_err)?;
        tmp.write_all(value.as_bytes()).map_err(storage_err)?;
        tmp.as_file().sync_all().map_err(storage_err)?;
        tmp.persist(&path).map_err(|e| storage_err(e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ShopifyError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ShopifyError::Storage(format!(
                "cannot remove {}: {e}",
                path.display()
            ))),
        }
    }
}

// =============================================================================
// CredentialStore
// =============================================================================

/// Saves, loads and clears the single active credential pair.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Wrap a key-value store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist credentials, replacing any previous pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials cannot be serialized or written.
    pub fn save(&self, credentials: &Credentials) -> Result<(), ShopifyError> {
        let json = serde_json::to_string(credentials)?;
        self.store.set(CREDENTIALS_KEY, &json)?;
        debug!(shop = %credentials.clean_domain(), "Saved Shopify credentials");
        Ok(())
    }

    /// Load credentials.
    ///
    /// Absent, unreadable, malformed or incomplete records all read as `None`.
    #[must_use]
    pub fn get(&self) -> Option<Credentials> {
        let raw = match self.store.get(CREDENTIALS_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credentials");
                return None;
            }
        };
        match serde_json::from_str::<Credentials>(&raw) {
            Ok(credentials) if credentials.is_complete() => Some(credentials),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Stored credentials are malformed");
                None
            }
        }
    }

    /// Load credentials or fail with [`ShopifyError::CredentialsMissing`].
    ///
    /// # Errors
    ///
    /// Returns `CredentialsMissing` if no usable pair is stored.
    pub fn require(&self) -> Result<Credentials, ShopifyError> {
        self.get().ok_or(ShopifyError::CredentialsMissing)
    }

    /// Whether a usable pair is stored.
    #[must_use]
    pub fn has(&self) -> bool {
        self.get().is_some()
    }

    /// Remove stored credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    pub fn clear(&self) -> Result<(), ShopifyError> {
        self.store.remove(CREDENTIALS_KEY)
    }
}
