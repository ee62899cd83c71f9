//! Serving backend contract.
//!
//! Defines the request/response types exchanged with the LLM-serving HTTP API
//! and the [`Backend`] trait the rest of the application talks to. The HTTP
//! implementation lives in `stackchat-interaction`; tests substitute mocks.

use crate::device::Device;
use crate::session::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Status string the backend reports for a model that can serve requests.
pub const RUNNING_STATUS: &str = "RUNNING";

/// Lifecycle status of a deployed model, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelStatus {
    Running,
    Other(String),
}

impl ModelStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ModelStatus::Running)
    }
}

impl From<String> for ModelStatus {
    fn from(value: String) -> Self {
        if value == RUNNING_STATUS {
            ModelStatus::Running
        } else {
            ModelStatus::Other(value)
        }
    }
}

impl From<ModelStatus> for String {
    fn from(value: ModelStatus) -> Self {
        match value {
            ModelStatus::Running => RUNNING_STATUS.to_string(),
            ModelStatus::Other(other) => other,
        }
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelStatus::Running => f.write_str(RUNNING_STATUS),
            ModelStatus::Other(other) => f.write_str(other),
        }
    }
}

/// A model entry from the backend registry. Read-only on the client side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub status: ModelStatus,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ModelStatus::from(status.into()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }
}

/// Keeps only the models that can currently serve requests, in registry order.
pub fn filter_running(models: Vec<ModelDescriptor>) -> Vec<ModelDescriptor> {
    models.into_iter().filter(ModelDescriptor::is_running).collect()
}

/// Outcome of a single readiness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The registry endpoint answered 200.
    Ready,
    /// The connection was refused or could not be established.
    Refused,
    /// The probe exceeded its timeout.
    TimedOut,
    /// The backend answered with a non-200 status.
    Status(u16),
    /// Any other failure. Reported, but not fatal.
    Failed(String),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }

    /// Whether the outcome is one of the expected "not up yet" conditions.
    pub fn is_expected_failure(&self) -> bool {
        matches!(
            self,
            Readiness::Refused | Readiness::TimedOut | Readiness::Status(_)
        )
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::Ready => write!(f, "ready"),
            Readiness::Refused => write!(f, "connection refused"),
            Readiness::TimedOut => write!(f, "timed out"),
            Readiness::Status(code) => write!(f, "HTTP status {code}"),
            Readiness::Failed(reason) => write!(f, "unexpected error: {reason}"),
        }
    }
}

/// How loudly a failure should be surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recoverable by retrying with different input.
    Warning,
    Error,
}

/// Failures of backend calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Connection could not be established.
    #[error("Cannot connect to the GPUStack server: {0}")]
    Unreachable(String),

    #[error("Request to the GPUStack server timed out")]
    Timeout,

    /// Connection lost while a chat completion was in flight.
    #[error("Disconnected from the GPUStack server. Check that the server is running.")]
    Disconnected,

    /// The backend stopped generating because the output became a repetition loop.
    #[error("The model stopped generating a response. Try a different question.")]
    DegenerateRepetition(String),

    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response from backend: {0}")]
    Decode(String),

    #[error("An error occurred: {0}")]
    Api(String),
}

/// Markers the backend uses when it aborts a degenerate repetition loop.
const REPETITION_MARKERS: [&str; 2] = ["imitating", "模倣"];

impl BackendError {
    pub fn severity(&self) -> Severity {
        match self {
            BackendError::DegenerateRepetition(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Whether an error text carries the backend's repetition-loop marker.
    pub fn is_repetition_message(text: &str) -> bool {
        REPETITION_MARKERS.iter().any(|marker| text.contains(marker))
    }

    /// Builds the error for a failed chat completion from its raw text,
    /// downgrading repetition-loop stops to a soft warning.
    pub fn from_chat_failure(text: impl Into<String>) -> Self {
        let text = text.into();
        if Self::is_repetition_message(&text) {
            BackendError::DegenerateRepetition(text)
        } else {
            BackendError::Api(text)
        }
    }
}

/// Body of `POST {base}/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// Body of `POST {base}/models/deploy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployRequest {
    pub model_id: String,
    pub device: Device,
    #[serde(rename = "type")]
    pub kind: String,
}

impl DeployRequest {
    pub fn llm(model_id: impl Into<String>, device: Device) -> Self {
        Self {
            model_id: model_id.into(),
            device,
            kind: "llm".to_string(),
        }
    }
}

/// The operations the client needs from the serving backend.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Issues one bounded-timeout request against the registry endpoint.
    async fn probe(&self) -> Readiness;

    /// `true` only when the registry endpoint answered 200. Never errors.
    async fn check_ready(&self) -> bool {
        self.probe().await.is_ready()
    }

    /// Full model registry, regardless of status.
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, BackendError>;

    /// Registry entries whose status is `RUNNING`.
    async fn list_running_models(&self) -> Result<Vec<ModelDescriptor>, BackendError> {
        self.list_models().await.map(filter_running)
    }

    /// Listing of models that can be deployed.
    async fn list_available_models(&self) -> Result<serde_json::Value, BackendError>;

    /// Opaque runtime metrics structure.
    async fn fetch_usage_metrics(&self) -> Result<serde_json::Value, BackendError>;

    async fn deploy_model(&self, request: &DeployRequest) -> Result<(), BackendError>;

    /// Sends a chat completion and returns the first choice's content.
    async fn send_chat_turn(&self, request: &ChatRequest) -> Result<String, BackendError>;
}
