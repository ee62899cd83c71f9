//! Interactive chat session state.

use super::message::{Message, MessageRole};
use super::params::GenerationParams;
use super::turn::TurnState;
use crate::error::{Result, StackChatError};
use crate::metrics::{UsageSample, UsageStats};
use chrono::{DateTime, Local};
use std::time::Duration;
use uuid::Uuid;

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Answer the user's questions concisely and accurately.";

/// State of one interactive chat session.
///
/// The transcript holds only user and assistant turns, in the order they
/// happened. The system message is built from `system_prompt` for every
/// request and never stored. Usage samples are recorded together with the
/// assistant message they belong to, so the number of samples always equals
/// the number of successful turns.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    created_at: DateTime<Local>,
    active_model: Option<String>,
    params: GenerationParams,
    system_prompt: String,
    transcript: Vec<Message>,
    usage: UsageStats,
    turn_state: TurnState,
}

impl Session {
    /// Creates a session with default parameters and system prompt.
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_SYSTEM_PROMPT, GenerationParams::default())
    }

    pub fn with_settings(system_prompt: impl Into<String>, params: GenerationParams) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Local::now(),
            active_model: None,
            params,
            system_prompt: system_prompt.into(),
            transcript: Vec::new(),
            usage: UsageStats::new(),
            turn_state: TurnState::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn active_model(&self) -> Option<&str> {
        self.active_model.as_deref()
    }

    pub fn select_model(&mut self, model_id: impl Into<String>) {
        self.active_model = Some(model_id.into());
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn set_temperature(&mut self, value: f32) -> Result<()> {
        self.params.set_temperature(value)
    }

    pub fn set_max_tokens(&mut self, value: u32) -> Result<()> {
        self.params.set_max_tokens(value)
    }

    pub fn set_top_p(&mut self, value: f32) -> Result<()> {
        self.params.set_top_p(value)
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn usage(&self) -> &UsageStats {
        &self.usage
    }

    pub fn turn_state(&self) -> TurnState {
        self.turn_state
    }

    pub fn assistant_message_count(&self) -> usize {
        self.transcript
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .count()
    }

    /// Appends the user's message and moves to `AwaitingResponse`.
    pub fn begin_turn(&mut self, input: impl Into<String>) -> Result<()> {
        if !self.turn_state.can_begin() {
            return Err(StackChatError::session(
                "a response is still pending for the previous message",
            ));
        }
        self.transcript.push(Message::user(input));
        self.turn_state = TurnState::AwaitingResponse;
        Ok(())
    }

    /// Messages for the completion request: the system prompt, then the transcript.
    pub fn request_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.transcript.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(self.transcript.iter().cloned());
        messages
    }

    /// Records the assistant's reply and its usage sample, moving to `Completed`.
    pub fn complete_turn(
        &mut self,
        reply: impl Into<String>,
        elapsed: Duration,
        completed_at: DateTime<Local>,
    ) -> Result<UsageSample> {
        self.ensure_awaiting()?;
        let reply = reply.into();
        let sample = UsageSample::from_response(&reply, elapsed, completed_at);

        self.transcript.push(Message::assistant(reply));
        self.usage.record(sample.clone());
        self.turn_state = TurnState::Completed;
        Ok(sample)
    }

    /// Marks the pending turn as failed. The user's message stays in the transcript.
    pub fn fail_turn(&mut self) -> Result<()> {
        self.ensure_awaiting()?;
        self.turn_state = TurnState::Failed;
        Ok(())
    }

    fn ensure_awaiting(&self) -> Result<()> {
        if self.turn_state == TurnState::AwaitingResponse {
            Ok(())
        } else {
            Err(StackChatError::session(format!(
                "no turn is awaiting a response (state: {:?})",
                self.turn_state
            )))
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
