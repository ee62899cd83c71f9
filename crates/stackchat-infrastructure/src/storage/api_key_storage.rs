//! Cached API key file storage.
//!
//! Reads and overwrites the plain-text key at `~/.gpustack/api_key.txt`.

use crate::paths::StackChatPaths;
use stackchat_core::error::{Result, StackChatError};
use stackchat_core::secret::ApiKeyStore;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during API key storage operations.
#[derive(Debug, Error)]
pub enum ApiKeyStorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not determine home directory")]
    HomeDirNotFound,
}

impl From<ApiKeyStorageError> for StackChatError {
    fn from(err: ApiKeyStorageError) -> Self {
        StackChatError::io(err.to_string())
    }
}

/// Storage for the cached API key.
///
/// Does NOT validate the key or encrypt it. The file holds the key as
/// plain text and is restricted to mode 600 on Unix when written.
pub struct ApiKeyStorage {
    path: PathBuf,
}

impl ApiKeyStorage {
    /// Creates a storage at the default path (`~/.gpustack/api_key.txt`).
    pub fn new() -> std::result::Result<Self, ApiKeyStorageError> {
        let path = StackChatPaths::api_key_file().map_err(|_| ApiKeyStorageError::HomeDirNotFound)?;
        Ok(Self { path })
    }

    /// Creates a storage with a custom path (for testing).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> std::result::Result<Option<String>, ApiKeyStorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        let key = content.trim();
        Ok((!key.is_empty()).then(|| key.to_string()))
    }

    fn write(&self, api_key: &str) -> std::result::Result<(), ApiKeyStorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        fs::write(&self.path, api_key.trim()).map_err(|source| self.io_error(source))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, permissions).map_err(|source| self.io_error(source))?;
        }

        tracing::info!("[ApiKeyStorage] Saved API key to {}", self.path.display());
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> ApiKeyStorageError {
        ApiKeyStorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ApiKeyStore for ApiKeyStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.read()?)
    }

    fn save(&self, api_key: &str) -> Result<()> {
        Ok(self.write(api_key)?)
    }
}
