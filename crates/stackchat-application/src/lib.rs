//! Use cases of StackChat: chat turns, model setup and API key acquisition.

pub mod api_key_service;
pub mod chat_usecase;
pub mod model_setup_service;

pub use api_key_service::{ApiKeyPrompt, ApiKeyService, ApiKeySource};
pub use chat_usecase::{ChatTurnOrchestrator, CompletedTurn, TurnFailure, TurnOutcome};
pub use model_setup_service::{ModelAvailability, ModelSetupService};
