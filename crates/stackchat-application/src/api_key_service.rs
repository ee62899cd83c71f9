//! API key acquisition.
//!
//! Uses the cached key when there is one; otherwise asks the operator and
//! caches a non-empty answer. An empty answer means "continue without
//! authentication" and is not cached.

use stackchat_core::error::Result;
use stackchat_core::secret::ApiKeyStore;
use std::sync::Arc;

/// Asks the operator for a key. Implemented by the binaries.
pub trait ApiKeyPrompt {
    fn prompt_api_key(&self) -> Result<String>;
}

/// Where the key in use came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeySource {
    Cached(String),
    Entered(String),
    /// The operator chose to continue unauthenticated.
    None,
}

impl ApiKeySource {
    pub fn into_key(self) -> Option<String> {
        match self {
            ApiKeySource::Cached(key) | ApiKeySource::Entered(key) => Some(key),
            ApiKeySource::None => None,
        }
    }
}

pub struct ApiKeyService {
    store: Arc<dyn ApiKeyStore>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn ApiKeyStore>) -> Self {
        Self { store }
    }

    pub fn acquire(&self, prompt: &dyn ApiKeyPrompt) -> Result<ApiKeySource> {
        match self.store.load() {
            Ok(Some(key)) => {
                tracing::info!("[ApiKey] Using cached API key");
                return Ok(ApiKeySource::Cached(key));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("[ApiKey] Could not read cached API key: {}", e),
        }

        let entered = prompt.prompt_api_key()?;
        let entered = entered.trim();
        if entered.is_empty() {
            return Ok(ApiKeySource::None);
        }

        self.store.save(entered)?;
        Ok(ApiKeySource::Entered(entered.to_string()))
    }
}
