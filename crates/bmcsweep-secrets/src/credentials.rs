//! BMC credential payloads stored inside secrets

use serde::{Deserialize, Serialize};

use crate::error::{Result, SecretError};

/// Secret ID consulted when no URI-specific credentials exist
pub const DEFAULT_SECRET_ID: &str = "default";

/// Username/password pair for a BMC
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BmcCredentials {
    /// BMC account name
    pub username: String,
    /// BMC account password
    pub password: String,
}

impl BmcCredentials {
    /// Create a credential pair
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both fields empty
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    /// Decode a secret value into credentials
    ///
    /// # Errors
    /// Returns `SecretError::InvalidCredentials` if the value is not a JSON
    /// object with `username` and `password` fields.
    pub fn from_secret(value: &str) -> Result<Self> {
        serde_json::from_str(value).map_err(|e| SecretError::InvalidCredentials(e.to_string()))
    }

    /// Encode credentials as a secret value
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_secret(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl std::fmt::Debug for BmcCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BmcCredentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}
