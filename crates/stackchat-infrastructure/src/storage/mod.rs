//! File-backed storage.

mod api_key_storage;

pub use api_key_storage::{ApiKeyStorage, ApiKeyStorageError};
