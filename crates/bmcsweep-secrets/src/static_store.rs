//! In-memory store holding a single credential pair

use std::collections::HashMap;

use crate::credentials::BmcCredentials;
use crate::error::{Result, SecretError};
use crate::traits::SecretStore;

/// Returns the same credentials for every secret ID
///
/// Used when the operator passes `--username/--password` and no secret file.
/// An [`empty`](Self::empty) store holds nothing and reports every ID as not
/// found.
#[derive(Debug, Clone)]
pub struct StaticSecretStore {
    credentials: Option<BmcCredentials>,
}

impl StaticSecretStore {
    /// Create a static store
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Some(BmcCredentials::new(username, password)),
        }
    }

    /// Store without any credentials
    #[must_use]
    pub fn empty() -> Self {
        Self { credentials: None }
    }
}

impl SecretStore for StaticSecretStore {
    fn get_secret_by_id(&self, secret_id: &str) -> Result<String> {
        match &self.credentials {
            Some(creds) => creds.to_secret(),
            None => Err(SecretError::NotFound(secret_id.to_string())),
        }
    }

    fn store_secret_by_id(&self, _secret_id: &str, _value: &str) -> Result<()> {
        Err(SecretError::ReadOnly)
    }

    fn list_secrets(&self) -> Result<HashMap<String, String>> {
        let Some(creds) = &self.credentials else {
            return Ok(HashMap::new());
        };
        Ok(HashMap::from([("static_creds".to_string(), creds.to_secret()?)]))
    }

    fn remove_secret_by_id(&self, _secret_id: &str) -> Result<()> {
        Err(SecretError::ReadOnly)
    }

    fn store_type(&self) -> &'static str {
        "static"
    }
}
