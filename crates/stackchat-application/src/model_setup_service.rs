//! Model setup use cases shared by the chat startup and the setup commands:
//! readiness waiting, registry inspection, deployment and a response smoke test.

use stackchat_core::backend::{Backend, BackendError, ChatRequest, DeployRequest, ModelDescriptor};
use stackchat_core::device::{Device, Platform};
use stackchat_core::retry::{ProbeAttempt, RetryPolicy, wait_until_ready};
use stackchat_core::session::Message;
use std::sync::Arc;

/// Small GGUF models that run comfortably on an Apple-silicon laptop.
pub const RECOMMENDED_MODELS: [&str; 5] = [
    "TheBloke/Qwen2.5-0.5B-Instruct-GGUF",
    "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
    "TheBloke/Mistral-7B-Instruct-v0.2-GGUF",
    "TheBloke/Llama-3.1-8B-Instruct-GGUF",
    "neural-chat/neural-chat-7b-v3-1-GGUF",
];

const SMOKE_TEST_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
const SMOKE_TEST_USER_PROMPT: &str = "Hello, how are you feeling today?";
const SMOKE_TEST_MAX_TOKENS: u32 = 100;
const SMOKE_TEST_TEMPERATURE: f32 = 0.7;

/// What the registry says about servable models.
///
/// "Nothing deployed" and "deployed but not running" are kept apart because
/// they need different operator actions (deploy vs. wait).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelAvailability {
    NoneDeployed,
    NoneRunning { deployed: Vec<ModelDescriptor> },
    Running(Vec<ModelDescriptor>),
}

impl ModelAvailability {
    pub fn from_registry(models: Vec<ModelDescriptor>) -> Self {
        if models.is_empty() {
            return ModelAvailability::NoneDeployed;
        }
        let running: Vec<ModelDescriptor> = models
            .iter()
            .filter(|m| m.is_running())
            .cloned()
            .collect();
        if running.is_empty() {
            ModelAvailability::NoneRunning { deployed: models }
        } else {
            ModelAvailability::Running(running)
        }
    }

    pub fn running(&self) -> &[ModelDescriptor] {
        match self {
            ModelAvailability::Running(models) => models,
            _ => &[],
        }
    }
}

pub struct ModelSetupService {
    backend: Arc<dyn Backend>,
    platform: Platform,
    device_override: Option<Device>,
}

impl ModelSetupService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            platform: Platform::current(),
            device_override: None,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_device_override(mut self, device: Option<Device>) -> Self {
        self.device_override = device;
        self
    }

    /// Device the next deployment will request.
    pub fn device(&self) -> Device {
        Device::resolve(self.device_override, &self.platform)
    }

    pub async fn wait_until_ready<F>(&self, policy: &RetryPolicy, on_failure: F) -> bool
    where
        F: FnMut(&ProbeAttempt),
    {
        wait_until_ready(self.backend.as_ref(), policy, on_failure).await
    }

    pub async fn deployed_models(&self) -> Result<Vec<ModelDescriptor>, BackendError> {
        self.backend.list_models().await
    }

    pub async fn model_availability(&self) -> Result<ModelAvailability, BackendError> {
        self.backend
            .list_models()
            .await
            .map(ModelAvailability::from_registry)
    }

    pub async fn available_models(&self) -> Result<serde_json::Value, BackendError> {
        self.backend.list_available_models().await
    }

    /// Deploys `model_id` as an LLM on the resolved device.
    pub async fn deploy(&self, model_id: &str) -> Result<DeployRequest, BackendError> {
        let request = DeployRequest::llm(model_id, self.device());
        self.backend.deploy_model(&request).await?;
        tracing::info!(
            "[ModelSetup] Model '{}' deployed on {}",
            request.model_id,
            request.device
        );
        Ok(request)
    }

    /// Fixed two-message completion used to check that a model answers.
    pub fn smoke_test_request(model_id: &str) -> ChatRequest {
        ChatRequest {
            model: model_id.to_string(),
            messages: vec![
                Message::system(SMOKE_TEST_SYSTEM_PROMPT),
                Message::user(SMOKE_TEST_USER_PROMPT),
            ],
            max_tokens: SMOKE_TEST_MAX_TOKENS,
            temperature: SMOKE_TEST_TEMPERATURE,
            top_p: None,
        }
    }

    pub async fn run_smoke_test(&self, model_id: &str) -> Result<String, BackendError> {
        self.backend
            .send_chat_turn(&Self::smoke_test_request(model_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_distinguishes_empty_from_stopped() {
        assert_eq!(
            ModelAvailability::from_registry(Vec::new()),
            ModelAvailability::NoneDeployed
        );

        let stopped = vec![ModelDescriptor::new("b", "STOPPED")];
        assert_eq!(
            ModelAvailability::from_registry(stopped.clone()),
            ModelAvailability::NoneRunning { deployed: stopped }
        );

        let mixed = vec![
            ModelDescriptor::new("a", "RUNNING"),
            ModelDescriptor::new("b", "STOPPED"),
        ];
        let availability = ModelAvailability::from_registry(mixed);
        assert_eq!(availability.running(), &[ModelDescriptor::new("a", "RUNNING")]);
    }

    #[test]
    fn test_smoke_test_request_shape() {
        let request = ModelSetupService::smoke_test_request("tiny");
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.top_p, None);
    }

    #[test]
    fn test_recommended_models_are_unique() {
        let mut models = RECOMMENDED_MODELS.to_vec();
        models.sort();
        models.dedup();
        assert_eq!(models.len(), RECOMMENDED_MODELS.len());
    }
}
