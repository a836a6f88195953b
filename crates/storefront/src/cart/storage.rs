//! Durable cart persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::CartState;

/// Errors from a [`CartStorage`] backend.
#[derive(Debug, Error)]
pub enum CartStorageError {
    #[error("cart storage i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("saved cart is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Opaque key-value persistence for the serialized cart.
pub trait CartStorage: Send + Sync {
    /// Read the saved cart, `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the saved cart cannot be read or parsed.
    fn load(&self) -> Result<Option<CartState>, CartStorageError>;

    /// Replace the saved cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be written.
    fn save(&self, state: &CartState) -> Result<(), CartStorageError>;
}

/// Stores the cart as a JSON file.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous cart intact.
#[derive(Debug, Clone)]
pub struct FileCartStorage {
    path: PathBuf,
}

impl FileCartStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CartStorage for FileCartStorage {
    fn load(&self) -> Result<Option<CartState>, CartStorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save(&self, state: &CartState) -> Result<(), CartStorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
