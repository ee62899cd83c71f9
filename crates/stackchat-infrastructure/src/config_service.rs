//! Configuration service implementation.
//!
//! Loads the root configuration from `~/.config/stackchat/config.toml` and
//! applies environment overrides on top.
//!
//! Precedence (highest first): environment variables, config file, defaults.
//! Command-line flags are applied by the binaries after loading.

use crate::paths::StackChatPaths;
use stackchat_core::config::RootConfig;
use stackchat_core::error::{Result, StackChatError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Overrides `backend.base_url`.
pub const ENV_API_BASE: &str = "GPUSTACK_API_BASE";
/// Overrides `backend.api_key`.
pub const ENV_API_KEY: &str = "GPUSTACK_API_KEY";
/// Overrides `deploy.model_id`.
pub const ENV_MODEL_ID: &str = "MODEL_ID";

/// Environment values that take precedence over `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model_id: Option<String>,
}

impl EnvOverrides {
    /// Reads the overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the overrides through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            base_url: read(ENV_API_BASE),
            api_key: read(ENV_API_KEY),
            model_id: read(ENV_MODEL_ID),
        }
    }

    pub fn apply(&self, config: &mut RootConfig) {
        if let Some(base_url) = &self.base_url {
            config.backend.base_url = base_url.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.backend.api_key = api_key.clone();
        }
        if let Some(model_id) = &self.model_id {
            config.deploy.model_id = model_id.clone();
        }
    }
}

/// Configuration service that loads and caches the root configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    overrides: EnvOverrides,
    /// Cached configuration loaded from file.
    /// Uses RwLock for thread-safe lazy loading.
    config: Arc<RwLock<Option<RootConfig>>>,
}

impl ConfigService {
    /// Creates a service for the default config file and the process environment.
    pub fn new() -> Result<Self> {
        let path =
            StackChatPaths::config_file().map_err(|e| StackChatError::config(e.to_string()))?;
        Ok(Self::with_path(path, EnvOverrides::from_env()))
    }

    /// Creates a service with a custom path and overrides (for testing).
    pub fn with_path(path: PathBuf, overrides: EnvOverrides) -> Self {
        Self {
            path,
            overrides,
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the root configuration, loading from file if not cached.
    ///
    /// An unreadable or invalid file is an error rather than a silent
    /// fallback to the defaults; failures are not cached.
    pub fn get_config(&self) -> Result<RootConfig> {
        if let Ok(read_lock) = self.config.read()
            && let Some(cached) = read_lock.as_ref()
        {
            return Ok(cached.clone());
        }

        let loaded = self.load().inspect_err(|e| {
            tracing::error!(
                "[ConfigService] Failed to load {}: {}",
                self.path.display(),
                e
            );
        })?;

        if let Ok(mut write_lock) = self.config.write() {
            *write_lock = Some(loaded.clone());
        }
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        if let Ok(mut write_lock) = self.config.write() {
            *write_lock = None;
        }
    }

    /// Reads the config file (writing the defaults when it is missing) and
    /// applies the environment overrides.
    pub fn load(&self) -> Result<RootConfig> {
        let mut config = if self.path.exists() {
            let content = fs::read_to_string(&self.path)?;
            toml::from_str::<RootConfig>(&content)?
        } else {
            let default_config = RootConfig::default();
            if let Err(e) = self.write_default(&default_config) {
                tracing::warn!(
                    "[ConfigService] Could not create default config at {}: {}",
                    self.path.display(),
                    e
                );
            }
            default_config
        };

        self.overrides.apply(&mut config);
        Ok(config)
    }

    fn write_default(&self, config: &RootConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(config)?)?;
        tracing::info!(
            "[ConfigService] Created default config at {}",
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackchat_core::config::DEFAULT_MODEL_ID;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stackchat").join("config.toml");
        let service = ConfigService::with_path(path.clone(), EnvOverrides::default());

        let config = service.load().unwrap();

        assert_eq!(config, RootConfig::default());
        assert!(path.exists());
        let written: RootConfig = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, RootConfig::default());
    }

    #[test]
    fn test_env_overrides_beat_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [backend]
            base_url = "http://from-file/v1"
            api_key = "file-key"
            "#,
        )
        .unwrap();

        let overrides = EnvOverrides::from_lookup(|name| match name {
            ENV_API_BASE => Some("http://from-env/v1".to_string()),
            ENV_MODEL_ID => Some("org/env-model".to_string()),
            ENV_API_KEY => Some(String::new()),
            _ => None,
        });
        let service = ConfigService::with_path(path, overrides);

        let config = service.get_config().unwrap();

        assert_eq!(config.backend.base_url, "http://from-env/v1");
        // Empty env value does not clear the file's key.
        assert_eq!(config.backend.api_key(), Some("file-key"));
        assert_eq!(config.deploy.model_id, "org/env-model");
    }

    #[test]
    fn test_invalid_file_is_reported_not_defaulted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[backend\nbase_url = ").unwrap();
        let service = ConfigService::with_path(path.clone(), EnvOverrides::default());

        assert!(service.get_config().is_err());

        // A fixed file is picked up since failures are not cached.
        fs::write(&path, "[backend]\nbase_url = \"http://gpu:80/v1\"\n").unwrap();
        assert_eq!(service.get_config().unwrap().backend.base_url, "http://gpu:80/v1");
    }

    #[test]
    fn test_partial_retry_section_keeps_other_settings() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[backend]\nbase_url = \"http://gpu:80/v1\"\n[chat.startup_retry]\nmax_attempts = 5\n",
        )
        .unwrap();
        let service = ConfigService::with_path(path, EnvOverrides::default());

        let config = service.get_config().unwrap();

        assert_eq!(config.backend.base_url, "http://gpu:80/v1");
        assert_eq!(config.chat.startup_retry.max_attempts, 5);
        assert_eq!(config.deploy.model_id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn test_cache_and_invalidate() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[deploy]\nmodel_id = \"first\"\n").unwrap();
        let service = ConfigService::with_path(path.clone(), EnvOverrides::default());

        assert_eq!(service.get_config().unwrap().deploy.model_id, "first");
        fs::write(&path, "[deploy]\nmodel_id = \"second\"\n").unwrap();
        assert_eq!(service.get_config().unwrap().deploy.model_id, "first");

        service.invalidate_cache();
        assert_eq!(service.get_config().unwrap().deploy.model_id, "second");
    }
}
