//! Identity persistence.
//!
//! The identity (`gameId`, `playerId`, `username`) is what lets the server
//! put us back into the same match after a reconnect or a restart. It is
//! written whenever a `configuration` frame changes it and read once at
//! startup to build the first handshake.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use broadside_protocol::Identity;

use crate::SessionError;

/// Where the identity lives between runs.
///
/// Implementations must be cheap enough to call from the session driver
/// directly; they run once per identity change.
///
/// # Example
///
/// ```rust
/// use broadside_session::{IdentityStore, MemoryIdentityStore};
///
/// let store = MemoryIdentityStore::new();
/// assert!(store.load().unwrap().is_none());
/// ```
pub trait IdentityStore: Send + Sync + 'static {
    /// Returns the persisted identity, or `None` if nothing was saved.
    fn load(&self) -> Result<Option<Identity>, SessionError>;

    /// Replaces the persisted identity.
    fn save(&self, identity: &Identity) -> Result<(), SessionError>;

    /// Forgets the persisted identity.
    fn clear(&self) -> Result<(), SessionError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Keeps the identity in process memory. Useful for tests and for clients
/// that should start fresh every run.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    slot: Mutex<Option<Identity>>,
}

impl MemoryIdentityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `identity`.
    pub fn with_identity(identity: Identity) -> Self {
        Self {
            slot: Mutex::new(Some(identity)),
        }
    }

    fn with_slot<R>(&self, f: impl FnOnce(&mut Option<Identity>) -> R) -> R {
        // A poisoned slot still holds a complete value.
        let mut guard = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<Option<Identity>, SessionError> {
        Ok(self.with_slot(|slot| slot.clone()))
    }

    fn save(&self, identity: &Identity) -> Result<(), SessionError> {
        self.with_slot(|slot| *slot = Some(identity.clone()));
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        self.with_slot(|slot| *slot = None);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

/// Stores the identity as a small JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    /// Uses `path` as the backing file. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist_err(&self, source: std::io::Error) -> SessionError {
        SessionError::Persist {
            path: self.path.clone(),
            source,
        }
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<Identity>, SessionError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.persist_err(e)),
        };
        let identity = serde_json::from_slice(&bytes).map_err(SessionError::CorruptIdentity)?;
        Ok(Some(identity))
    }

    fn save(&self, identity: &Identity) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec_pretty(identity).map_err(SessionError::CorruptIdentity)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.persist_err(e))?;
        }
        std::fs::write(&self.path, bytes).map_err(|e| self.persist_err(e))?;
        tracing::debug!(path = %self.path.display(), "identity saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.persist_err(e)),
        }
    }
}
