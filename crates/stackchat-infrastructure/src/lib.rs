//! Infrastructure layer: filesystem paths, `config.toml` loading and the
//! cached API key file.

pub mod config_service;
pub mod paths;
pub mod storage;

pub use config_service::{ConfigService, EnvOverrides};
pub use paths::StackChatPaths;
pub use storage::ApiKeyStorage;
