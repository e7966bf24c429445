//! bmcsweep-secrets: credential storage
//!
//! A pluggable [`SecretStore`] with an encrypted local-file backend and a
//! static in-memory backend. Secrets in the local file are AES-256-GCM blobs
//! keyed by a per-ID HKDF derivation of an externally supplied master key.

pub mod credentials;
pub mod crypto;
pub mod error;
pub mod local;
pub mod static_store;
pub mod traits;

pub use credentials::{BmcCredentials, DEFAULT_SECRET_ID};
pub use crypto::{MASTER_KEY_ENV, MasterKey, generate_master_key};
pub use error::{Result, SecretError};
pub use local::LocalSecretStore;
pub use static_store::StaticSecretStore;
pub use traits::SecretStore;
