//! Domain layer of StackChat: session state, usage metrics, the backend
//! contract, readiness polling and device lookup.

pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod secret;
pub mod session;

pub use error::{Result, StackChatError};
