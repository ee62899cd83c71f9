//! BackendClient - REST client for the GPUStack OpenAI-compatible API.
//!
//! Endpoints (relative to the configured base URL, e.g. `http://localhost:8000/v1`):
//! `GET /models`, `GET /models/available`, `GET /metrics`,
//! `POST /models/deploy` and `POST /chat/completions`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use stackchat_core::backend::{
    Backend, BackendError, ChatRequest, DeployRequest, ModelDescriptor, Readiness,
};
use stackchat_core::config::{BackendConfig, DEFAULT_READINESS_TIMEOUT_SECS};
use std::time::Duration;

/// Client for the serving backend.
///
/// Only the readiness probe carries a timeout; completions wait for as long
/// as the backend takes.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    readiness_timeout: Duration,
}

impl BackendClient {
    /// Creates a client for `base_url`. A blank `api_key` means unauthenticated.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            readiness_timeout: Duration::from_secs(DEFAULT_READINESS_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.base_url.clone(), config.api_key().map(str::to_string))
            .with_readiness_timeout(config.readiness_timeout())
    }

    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Replaces the bearer token (e.g., after the key was acquired interactively).
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = self
            .authorize(self.client.get(self.url(path)))
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| BackendError::Decode(format!("GET /{path}: {err}")))
    }
}

#[async_trait]
impl Backend for BackendClient {
    async fn probe(&self) -> Readiness {
        let result = self
            .authorize(self.client.get(self.url("models")))
            .timeout(self.readiness_timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::OK => Readiness::Ready,
            Ok(response) => Readiness::Status(response.status().as_u16()),
            Err(err) if err.is_timeout() => Readiness::TimedOut,
            Err(err) if err.is_connect() => Readiness::Refused,
            Err(err) => {
                tracing::error!(
                    "[BackendClient] Error while connecting to {}: {}",
                    self.base_url,
                    err
                );
                Readiness::Failed(err.to_string())
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, BackendError> {
        let registry: ModelList = self.get_json("models").await?;
        tracing::debug!("[BackendClient] Registry has {} model(s)", registry.data.len());
        Ok(registry.data)
    }

    async fn list_available_models(&self) -> Result<serde_json::Value, BackendError> {
        self.get_json("models/available").await
    }

    async fn fetch_usage_metrics(&self) -> Result<serde_json::Value, BackendError> {
        self.get_json("metrics").await
    }

    async fn deploy_model(&self, request: &DeployRequest) -> Result<(), BackendError> {
        tracing::info!(
            "[BackendClient] Deploying model '{}' on {}",
            request.model_id,
            request.device
        );
        let response = self
            .authorize(self.client.post(self.url("models/deploy")))
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        // The deploy contract is exactly 200; other 2xx codes are not accepted.
        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = read_body(response).await;
            return Err(BackendError::Status { status, body });
        }
        Ok(())
    }

    async fn send_chat_turn(&self, request: &ChatRequest) -> Result<String, BackendError> {
        let response = self
            .authorize(self.client.post(self.url("chat/completions")))
            .json(request)
            .send()
            .await
            .map_err(map_chat_transport_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = error_message(&read_body(response).await);
            if BackendError::is_repetition_message(&message) {
                return Err(BackendError::DegenerateRepetition(message));
            }
            return Err(BackendError::Status {
                status,
                body: message,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|err| {
            if err.is_decode() {
                BackendError::Decode(format!("Failed to parse chat completion: {err}"))
            } else {
                map_chat_transport_error(err)
            }
        })?;

        extract_text_response(parsed)
    }
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelDescriptor>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed { message: String },
    Plain(String),
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String, BackendError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| BackendError::Decode("Backend returned no content in the response".into()))
}

/// Error text from an OpenAI-style error body, or the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| match wrapper.error {
            ErrorBody::Detailed { message } => message,
            ErrorBody::Plain(message) => message,
        })
        .unwrap_or_else(|_| body.to_string())
}

async fn read_body(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string())
}

async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    if response.status() == StatusCode::OK {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = read_body(response).await;
    Err(BackendError::Status { status, body })
}

fn map_transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else if err.is_connect() {
        BackendError::Unreachable(err.to_string())
    } else {
        BackendError::Api(err.to_string())
    }
}

/// A chat completion that fails in transport after the backend was reached
/// (request write, connection reset, truncated body) is a lost connection.
fn map_chat_transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else if err.is_connect() || err.is_request() || err.is_body() {
        BackendError::Disconnected
    } else {
        BackendError::from_chat_failure(err.to_string())
    }
}
