//! Configuration model (`config.toml`).
//!
//! Loading and environment overrides live in `stackchat-infrastructure`;
//! this module only defines the shape and defaults.

use crate::device::Device;
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::session::{DEFAULT_SYSTEM_PROMPT, GenerationParams};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";
pub const DEFAULT_MODEL_ID: &str = "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF";
pub const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 5;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RootConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub setup: SetupConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Empty means unauthenticated requests.
    pub api_key: String,
    pub readiness_timeout_secs: u64,
}

impl BackendConfig {
    /// The bearer token, if one is configured.
    pub fn api_key(&self) -> Option<&str> {
        let key = self.api_key.trim();
        (!key.is_empty()).then_some(key)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            readiness_timeout_secs: DEFAULT_READINESS_TIMEOUT_SECS,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DeployConfig {
    pub model_id: String,
    /// Overrides the platform lookup when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            device: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub startup_retry: RetryPolicy,
}

impl ChatConfig {
    /// Validated generation parameters for a new session.
    pub fn generation_params(&self) -> Result<GenerationParams> {
        GenerationParams::new(self.temperature, self.max_tokens, self.top_p)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: GenerationParams::DEFAULT_TEMPERATURE,
            max_tokens: GenerationParams::DEFAULT_MAX_TOKENS,
            top_p: GenerationParams::DEFAULT_TOP_P,
            startup_retry: RetryPolicy::interactive(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SetupConfig {
    pub retry: RetryPolicy,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::setup(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: RootConfig = toml::from_str("").unwrap();
        assert_eq!(config, RootConfig::default());
        assert_eq!(config.backend.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.backend.api_key(), None);
        assert_eq!(config.chat.startup_retry, RetryPolicy::interactive());
        assert_eq!(config.setup.retry, RetryPolicy::setup());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: RootConfig = toml::from_str(
            r#"
            [backend]
            base_url = "http://gpu-box:80/v1"

            [deploy]
            device = "cpu"

            [chat.startup_retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.base_url, "http://gpu-box:80/v1");
        assert_eq!(config.backend.readiness_timeout_secs, 5);
        assert_eq!(config.deploy.device, Some(Device::Cpu));
        assert_eq!(config.deploy.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.chat.startup_retry.max_attempts, 5);
        assert_eq!(config.chat.startup_retry.delay, Duration::from_secs(2));
        assert_eq!(config.chat.max_tokens, 500);
    }

    #[test]
    fn test_blank_api_key_means_unauthenticated() {
        let backend = BackendConfig {
            api_key: "   ".to_string(),
            ..BackendConfig::default()
        };
        assert_eq!(backend.api_key(), None);
    }

    #[test]
    fn test_out_of_range_chat_params_are_rejected() {
        let chat = ChatConfig {
            max_tokens: 10,
            ..ChatConfig::default()
        };
        assert!(chat.generation_params().is_err());
        assert!(ChatConfig::default().generation_params().is_ok());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&RootConfig::default()).unwrap();
        let parsed: RootConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, RootConfig::default());
    }
}
