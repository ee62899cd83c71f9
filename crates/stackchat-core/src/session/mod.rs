//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: the interactive session state (`Session`)
//! - `message`: chat transcript message types (`MessageRole`, `Message`)
//! - `params`: generation parameters and their valid ranges (`GenerationParams`)
//! - `turn`: per-turn state machine (`TurnState`)

mod message;
mod model;
mod params;
mod turn;

pub use message::{Message, MessageRole};
pub use model::{DEFAULT_SYSTEM_PROMPT, Session};
pub use params::GenerationParams;
pub use turn::TurnState;
