//! Secret store trait

use std::collections::HashMap;

use crate::error::Result;

/// Credential backend shared by every crawl worker
///
/// Implementations must be safe to read from many workers at once; writes are
/// expected to be rare.
pub trait SecretStore: Send + Sync {
    /// Fetch and decrypt the secret stored under `secret_id`
    ///
    /// # Errors
    /// Returns `SecretError::NotFound` if nothing is stored under the ID, or a
    /// decryption error if the blob cannot be authenticated.
    fn get_secret_by_id(&self, secret_id: &str) -> Result<String>;

    /// Encrypt and store `value` under `secret_id`, replacing any previous value
    ///
    /// # Errors
    /// Returns an error if encryption or persistence fails, or if the store is read-only.
    fn store_secret_by_id(&self, secret_id: &str, value: &str) -> Result<()>;

    /// List stored secret IDs with their stored (encrypted) representation
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    fn list_secrets(&self) -> Result<HashMap<String, String>>;

    /// Remove the secret stored under `secret_id`
    ///
    /// # Errors
    /// Returns `SecretError::NotFound` if nothing is stored under the ID.
    fn remove_secret_by_id(&self, secret_id: &str) -> Result<()>;

    /// Short backend name for logging
    fn store_type(&self) -> &'static str;
}
