//! # Credential Store
//!
//! The bearer token lives in durable key-value storage under [`TOKEN_KEY`].
//! [`CredentialStore`] is the only component allowed to write that key, and it reads
//! the backend on every call so a `set` or `clear` from one controller is visible to
//! the next read from any other.
//!
//! Session transitions are published on a `watch` channel. A hosting shell subscribes
//! with [`CredentialStore::subscribe`] and routes to its sign-in view when the status
//! turns [`SessionStatus::SignedOut`].

use crate::error::SyncError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Storage key holding the current bearer token.
pub const TOKEN_KEY: &str = "authToken";

/// An opaque bearer token. Expiry is decided by the server.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credential storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential storage is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Durable string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Returns whether the key was present.
    fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

/// Process-local storage, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key).is_some())
    }
}

/// A JSON object on disk. Writes go to a sibling temp file and are renamed into place.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        let mut file = open_private(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(entries)?)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Truncates or creates `path`, readable by the owner only on unix.
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);
    let file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // `mode` only applies on creation; a leftover temp file keeps its old bits.
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    Ok(file)
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        let removed = entries.remove(key).is_some();
        if removed {
            self.persist(&entries)?;
        }
        Ok(removed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    SignedIn,
    SignedOut,
}

/// Shared handle over the durable token. Cheap to clone.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Box<dyn KeyValueStore>,
    status: watch::Sender<SessionStatus>,
}

impl CredentialStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        let initial = match backend.get(TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => SessionStatus::SignedIn,
            _ => SessionStatus::SignedOut,
        };
        let (status, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner {
                backend: Box::new(backend),
                status,
            }),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Reads the current token. Unreadable storage counts as signed out.
    pub fn get(&self) -> Option<Credential> {
        match self.inner.backend.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()).map(Credential::new),
            Err(e) => {
                warn!(error = %e, "Credential read failed");
                None
            }
        }
    }

    /// Session gate for protected calls: absent credential is an auth failure.
    pub fn require(&self) -> Result<Credential, SyncError> {
        self.get().ok_or_else(SyncError::missing_credential)
    }

    pub fn set(&self, credential: Credential) -> Result<(), StoreError> {
        self.inner.backend.set(TOKEN_KEY, credential.token())?;
        info!("Credential stored");
        self.publish(SessionStatus::SignedIn);
        Ok(())
    }

    /// Removes the token. Returns whether one was present.
    pub fn clear(&self) -> Result<bool, StoreError> {
        let removed = self.inner.backend.remove(TOKEN_KEY)?;
        if removed {
            info!("Credential cleared");
        } else {
            debug!("Credential already absent");
        }
        self.publish(SessionStatus::SignedOut);
        Ok(removed)
    }

    pub fn status(&self) -> SessionStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    fn publish(&self, next: SessionStatus) {
        self.inner.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("status", &self.status())
            .finish()
    }
}
