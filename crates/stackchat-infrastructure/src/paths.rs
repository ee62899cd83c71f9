//! Unified path management for StackChat files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/stackchat/         # Config directory (platform config dir)
//! ├── config.toml              # Application configuration
//! └── logs/                    # Chat REPL logs
//!     └── stackchat-chat.log.YYYY-MM-DD
//!
//! ~/.gpustack/
//! └── api_key.txt              # Cached backend API key (shared with GPUStack tooling)
//! ```

use std::path::PathBuf;
use thiserror::Error;

const APP_DIR: &str = "stackchat";
const GPUSTACK_DIR: &str = ".gpustack";
const API_KEY_FILE: &str = "api_key.txt";

/// Errors that can occur during path resolution.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("Cannot find home directory")]
    HomeDirNotFound,
    #[error("Cannot find configuration directory")]
    ConfigDirNotFound,
}

pub struct StackChatPaths;

impl StackChatPaths {
    /// Returns the StackChat configuration directory (e.g., `~/.config/stackchat/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::ConfigDirNotFound)
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn logs_dir() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("logs"))
    }

    /// Returns the cached API key file: `~/.gpustack/api_key.txt`.
    ///
    /// # Security Note
    ///
    /// Plain text. Ensure the file is readable only by the user.
    pub fn api_key_file() -> Result<PathBuf, PathError> {
        dirs::home_dir()
            .map(|home| home.join(GPUSTACK_DIR).join(API_KEY_FILE))
            .ok_or(PathError::HomeDirNotFound)
    }
}
