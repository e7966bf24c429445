//! Error types for bmcsweep-secrets

use thiserror::Error;

/// Errors that can occur during secret store operations
#[derive(Error, Debug)]
pub enum SecretError {
    /// Master key was not supplied
    #[error("master key not set: {0}")]
    MissingMasterKey(String),

    /// Master key could not be decoded or has the wrong length
    #[error("invalid master key: {0}")]
    InvalidMasterKey(String),

    /// No secret stored under the requested ID
    #[error("secret not found: {0}")]
    NotFound(String),

    /// Per-secret key derivation failed
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Ciphertext could not be authenticated (wrong master key or corrupt blob)
    #[error("decryption failed for secret {0}")]
    Decryption(String),

    /// Stored blob is not valid hex or is too short to hold a nonce
    #[error("malformed ciphertext for secret {0}")]
    MalformedCiphertext(String),

    /// Store does not support mutation
    #[error("secret store is read-only")]
    ReadOnly,

    /// Secret payload is not the expected credential JSON
    #[error("invalid credential payload: {0}")]
    InvalidCredentials(String),

    /// Secret file could not be parsed
    #[error("failed to parse secret file: {0}")]
    Parse(#[from] serde_json::Error),

    /// I/O error reading or writing the secret file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SecretError {
    /// Check if the error means the lookup simply missed
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, SecretError::NotFound(_))
    }

    /// Check if the error came from the cipher refusing the ciphertext
    #[must_use]
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            SecretError::Decryption(_) | SecretError::MalformedCiphertext(_)
        )
    }
}

/// Result type for secret store operations
pub type Result<T> = std::result::Result<T, SecretError>;
