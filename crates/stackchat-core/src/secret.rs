//! API key storage trait.
//!
//! The key is a bearer token passed through to the backend. It is never
//! validated or rotated here.

use crate::error::Result;

/// Local cache for the backend API key.
///
/// # Security Note
///
/// Implementations should keep the file readable only by the user
/// (e.g., 600 on Unix) and must never log the key.
pub trait ApiKeyStore: Send + Sync {
    /// Returns the cached key, or `None` when nothing (or only whitespace) is cached.
    fn load(&self) -> Result<Option<String>>;

    /// Overwrites the cached key.
    fn save(&self, api_key: &str) -> Result<()>;
}
