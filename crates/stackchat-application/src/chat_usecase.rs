//! Chat turn use case.
//!
//! Drives one turn of the session state machine:
//! `Idle -> AwaitingResponse -> {Completed, Failed}`.

use chrono::Local;
use stackchat_core::backend::{Backend, BackendError, ChatRequest, Severity};
use stackchat_core::error::{Result, StackChatError};
use stackchat_core::metrics::UsageSample;
use stackchat_core::session::Session;
use std::sync::Arc;
use tokio::time::Instant;

/// A turn that produced an assistant reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTurn {
    pub reply: String,
    pub sample: UsageSample,
}

/// A turn the backend could not answer. The session keeps the user message.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnFailure {
    pub error: BackendError,
}

impl TurnFailure {
    pub fn severity(&self) -> Severity {
        self.error.severity()
    }

    /// Whether the failure is the soft "stopped generating" case.
    pub fn is_warning(&self) -> bool {
        self.severity() == Severity::Warning
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self.error, BackendError::Disconnected)
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed(CompletedTurn),
    Failed(TurnFailure),
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed(_))
    }
}

/// Runs chat turns for a session against a backend.
///
/// `run_turn` borrows the session mutably for the whole turn, so two turns of
/// the same session can never be in flight at once.
pub struct ChatTurnOrchestrator {
    backend: Arc<dyn Backend>,
}

impl ChatTurnOrchestrator {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Sends `input` as the next user message and waits for the reply.
    ///
    /// Returns `Err` only when the turn could not start (blank input, no model
    /// selected, a turn already pending); the session is untouched then.
    /// Backend failures come back as `Ok(TurnOutcome::Failed)`.
    pub async fn run_turn(&self, session: &mut Session, input: &str) -> Result<TurnOutcome> {
        let input = input.trim();
        if input.is_empty() {
            return Err(StackChatError::session("message is empty"));
        }
        let model = session
            .active_model()
            .map(str::to_string)
            .ok_or_else(|| StackChatError::session("no model selected"))?;

        session.begin_turn(input)?;

        let params = *session.params();
        let request = ChatRequest {
            model,
            messages: session.request_messages(),
            max_tokens: params.max_tokens(),
            temperature: params.temperature(),
            top_p: Some(params.top_p()),
        };

        tracing::debug!(
            "[ChatTurn] Sending {} message(s) to '{}'",
            request.messages.len(),
            request.model
        );
        let started = Instant::now();
        let result = self.backend.send_chat_turn(&request).await.and_then(non_empty_reply);
        let elapsed = started.elapsed();

        match result {
            Ok(reply) => {
                let sample = session.complete_turn(reply.clone(), elapsed, Local::now())?;
                tracing::info!(
                    "[ChatTurn] Completed in {:.2}s, ~{} tokens",
                    sample.elapsed_seconds,
                    sample.estimated_tokens
                );
                Ok(TurnOutcome::Completed(CompletedTurn { reply, sample }))
            }
            Err(error) => {
                session.fail_turn()?;
                match error.severity() {
                    Severity::Warning => tracing::warn!("[ChatTurn] {}", error),
                    Severity::Error => tracing::error!("[ChatTurn] {}", error),
                }
                Ok(TurnOutcome::Failed(TurnFailure { error }))
            }
        }
    }
}

/// An empty reply records nothing: it fails the turn instead.
fn non_empty_reply(reply: String) -> std::result::Result<String, BackendError> {
    if reply.trim().is_empty() {
        Err(BackendError::Decode("Backend returned an empty reply".to_string()))
    } else {
        Ok(reply)
    }
}
