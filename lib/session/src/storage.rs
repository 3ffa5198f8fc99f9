//! Persistent slot for the raw credential string.
//!
//! The raw credential is the only session state that survives a restart.
//! Only the session store touches the slot.

use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// A single opaque string slot.
pub trait CredentialStorage: Send + Sync {
    /// Returns the stored credential, if any.
    fn get(&self) -> Result<Option<String>, StorageError>;

    /// Replaces the stored credential.
    fn set(&self, credential: &str) -> Result<(), StorageError>;

    /// Removes the stored credential. Clearing an empty slot succeeds.
    fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory slot that does not survive restarts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryStorage {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot already holding `credential`.
    #[must_use]
    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(credential.into())),
        }
    }
}

impl CredentialStorage for MemoryStorage {
    fn get(&self) -> Result<Option<String>, StorageError> {
        Ok(self.slot.lock().clone())
    }

    fn set(&self, credential: &str) -> Result<(), StorageError> {
        *self.slot.lock() = Some(credential.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// Slot backed by a single file named after the storage key.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Stores the credential at `dir/key`.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(key),
        }
    }

    /// Returns the file path of the slot.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStorage for FileStorage {
    fn get(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let trimmed = contents.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed {
                reason: format!("{}: {e}", self.path.display()),
            }),
        }
    }

    fn set(&self, credential: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::WriteFailed {
                reason: format!("{}: {e}", parent.display()),
            })?;
        }
        fs::write(&self.path, credential).map_err(|e| StorageError::WriteFailed {
            reason: format!("{}: {e}", self.path.display()),
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::ClearFailed {
                reason: format!("{}: {e}", self.path.display()),
            }),
        }
    }
}
