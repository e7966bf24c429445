//! Credential resolution for a crawl target

use bmcsweep_secrets::{BmcCredentials, DEFAULT_SECRET_ID};
use tracing::{debug, warn};

use crate::crawler::CrawlerConfig;

/// Where a crawl's credentials came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Passed in by the caller
    Explicit,
    /// Secret stored under the target URI
    UriSecret,
    /// Secret stored under `"default"`
    DefaultSecret,
    /// Nothing found; crawl proceeds unauthenticated
    Blank,
}

impl CredentialSource {
    /// Resolvers in precedence order
    pub const ORDER: [CredentialSource; 4] = [
        CredentialSource::Explicit,
        CredentialSource::UriSecret,
        CredentialSource::DefaultSecret,
        CredentialSource::Blank,
    ];

    fn resolve(self, config: &CrawlerConfig) -> Option<BmcCredentials> {
        match self {
            CredentialSource::Explicit => config.credentials.clone(),
            CredentialSource::UriSecret => lookup(config, &config.uri),
            CredentialSource::DefaultSecret if config.use_default => {
                lookup(config, DEFAULT_SECRET_ID)
            }
            CredentialSource::DefaultSecret => None,
            CredentialSource::Blank => Some(BmcCredentials::default()),
        }
    }
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CredentialSource::Explicit => "explicit",
            CredentialSource::UriSecret => "uri-secret",
            CredentialSource::DefaultSecret => "default-secret",
            CredentialSource::Blank => "blank",
        };
        f.write_str(name)
    }
}

/// Read and decode one secret; store failures fall through to the next resolver
fn lookup(config: &CrawlerConfig, secret_id: &str) -> Option<BmcCredentials> {
    let store = &config.credential_store;
    match store.get_secret_by_id(secret_id) {
        Ok(value) => match BmcCredentials::from_secret(&value) {
            Ok(creds) => Some(creds),
            Err(e) => {
                warn!(secret_id, error = %e, "stored secret is not a credential pair");
                None
            }
        },
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            warn!(
                secret_id,
                store = store.store_type(),
                error = %e,
                "failed to read credentials from secret store"
            );
            None
        }
    }
}

/// Pick credentials for `config.uri`: explicit, then URI secret, then default secret, else blank
#[must_use]
pub fn resolve_credentials(config: &CrawlerConfig) -> (BmcCredentials, CredentialSource) {
    for source in CredentialSource::ORDER {
        if let Some(creds) = source.resolve(config) {
            if source == CredentialSource::Blank {
                warn!(uri = %config.uri, "no credentials found, crawling with blank credentials");
            } else {
                debug!(uri = %config.uri, %source, "resolved credentials");
            }
            return (creds, source);
        }
    }
    (BmcCredentials::default(), CredentialSource::Blank)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use bmcsweep_secrets::{Result as SecretResult, SecretError, SecretStore, StaticSecretStore};

    use super::*;

    struct MapStore(HashMap<String, String>);

    impl MapStore {
        fn with(entries: &[(&str, BmcCredentials)]) -> Arc<Self> {
            Arc::new(Self(
                entries
                    .iter()
                    .map(|(id, c)| ((*id).to_string(), c.to_secret().unwrap()))
                    .collect(),
            ))
        }
    }

    impl SecretStore for MapStore {
        fn get_secret_by_id(&self, secret_id: &str) -> SecretResult<String> {
            self.0
                .get(secret_id)
                .cloned()
                .ok_or_else(|| SecretError::NotFound(secret_id.to_string()))
        }
        fn store_secret_by_id(&self, _: &str, _: &str) -> SecretResult<()> {
            Err(SecretError::ReadOnly)
        }
        fn list_secrets(&self) -> SecretResult<HashMap<String, String>> {
            Ok(self.0.clone())
        }
        fn remove_secret_by_id(&self, _: &str) -> SecretResult<()> {
            Err(SecretError::ReadOnly)
        }
        fn store_type(&self) -> &'static str {
            "map"
        }
    }

    struct BrokenStore;

    impl SecretStore for BrokenStore {
        fn get_secret_by_id(&self, _: &str) -> SecretResult<String> {
            Err(SecretError::Decryption("bad tag".into()))
        }
        fn store_secret_by_id(&self, _: &str, _: &str) -> SecretResult<()> {
            Err(SecretError::ReadOnly)
        }
        fn list_secrets(&self) -> SecretResult<HashMap<String, String>> {
            Ok(HashMap::new())
        }
        fn remove_secret_by_id(&self, _: &str) -> SecretResult<()> {
            Err(SecretError::ReadOnly)
        }
        fn store_type(&self) -> &'static str {
            "broken"
        }
    }

    const URI: &str = "https://10.0.0.5";

    #[test]
    fn test_explicit_wins() {
        let store = MapStore::with(&[(URI, BmcCredentials::new("uri", "p"))]);
        let config = CrawlerConfig::new(URI, store)
            .with_credentials(BmcCredentials::new("explicit", "p"));
        let (creds, source) = resolve_credentials(&config);
        assert_eq!(source, CredentialSource::Explicit);
        assert_eq!(creds.username, "explicit");
    }

    #[test]
    fn test_uri_secret_before_default() {
        let store = MapStore::with(&[
            (URI, BmcCredentials::new("uri", "p")),
            (DEFAULT_SECRET_ID, BmcCredentials::new("default", "p")),
        ]);
        let config = CrawlerConfig::new(URI, store).with_use_default(true);
        let (creds, source) = resolve_credentials(&config);
        assert_eq!(source, CredentialSource::UriSecret);
        assert_eq!(creds.username, "uri");
    }

    #[test]
    fn test_default_only_when_enabled() {
        let store = MapStore::with(&[(DEFAULT_SECRET_ID, BmcCredentials::new("default", "p"))]);

        let config = CrawlerConfig::new(URI, store.clone()).with_use_default(true);
        let (creds, source) = resolve_credentials(&config);
        assert_eq!(source, CredentialSource::DefaultSecret);
        assert_eq!(creds.username, "default");

        let config = CrawlerConfig::new(URI, store).with_use_default(false);
        let (creds, source) = resolve_credentials(&config);
        assert_eq!(source, CredentialSource::Blank);
        assert!(creds.is_blank());
    }

    #[test]
    fn test_store_errors_fall_through_to_blank() {
        let config = CrawlerConfig::new(URI, Arc::new(BrokenStore)).with_use_default(true);
        let (creds, source) = resolve_credentials(&config);
        assert_eq!(source, CredentialSource::Blank);
        assert!(creds.is_blank());
    }

    #[test]
    fn test_static_store_answers_uri_lookup() {
        let config = CrawlerConfig::new(URI, Arc::new(StaticSecretStore::new("root", "calvin")));
        let (creds, source) = resolve_credentials(&config);
        assert_eq!(source, CredentialSource::UriSecret);
        assert_eq!(creds, BmcCredentials::new("root", "calvin"));
    }

    #[test]
    fn test_empty_static_store_resolves_blank() {
        let config = CrawlerConfig::new(URI, Arc::new(StaticSecretStore::empty()))
            .with_use_default(true);
        let (creds, source) = resolve_credentials(&config);
        assert_eq!(source, CredentialSource::Blank);
        assert!(creds.is_blank());
    }
}
