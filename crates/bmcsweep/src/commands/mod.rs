//! Subcommand implementations

use std::sync::Arc;

use bmcsweep_secrets::{
    BmcCredentials, LocalSecretStore, MASTER_KEY_ENV, MasterKey, SecretStore, StaticSecretStore,
};
use eyre::WrapErr;
use tracing::warn;

use crate::cli::{CredentialArgs, StoreArgs};
use crate::config::Config;

pub mod collect;
pub mod crawl;
pub mod scan;
pub mod secrets;

/// Master key from `--master-key`, else the environment; `None` when neither is set
fn master_key(args: &StoreArgs) -> eyre::Result<Option<MasterKey>> {
    if let Some(hex) = &args.master_key {
        return Ok(Some(MasterKey::from_hex(hex)?));
    }
    match std::env::var(MASTER_KEY_ENV) {
        Ok(hex) => Ok(Some(
            MasterKey::from_hex(&hex).wrap_err_with(|| format!("invalid {MASTER_KEY_ENV}"))?,
        )),
        Err(_) => Ok(None),
    }
}

/// Open the encrypted store; the master key is mandatory here
pub(crate) fn open_local_store(args: &StoreArgs, config: &Config) -> eyre::Result<LocalSecretStore> {
    let Some(key) = master_key(args)? else {
        eyre::bail!("no master key: pass --master-key or set {MASTER_KEY_ENV}");
    };
    let path = args.secrets_file.as_ref().unwrap_or(&config.secrets.file);
    LocalSecretStore::open(path, key)
        .wrap_err_with(|| format!("failed to open secret store {}", path.display()))
}

/// Credentials named on the command line
pub(crate) fn explicit_credentials(args: &CredentialArgs) -> Option<BmcCredentials> {
    match (&args.username, &args.password) {
        (Some(user), Some(pass)) => Some(BmcCredentials::new(user, pass)),
        _ => None,
    }
}

/// Store the crawler resolves credentials from
///
/// The encrypted file when a master key is available, otherwise a static store
/// holding the command line credentials (or blank ones).
pub(crate) fn credential_store(
    args: &CredentialArgs,
    config: &Config,
) -> eyre::Result<Arc<dyn SecretStore>> {
    if master_key(&args.store)?.is_some() {
        return Ok(Arc::new(open_local_store(&args.store, config)?));
    }

    match explicit_credentials(args) {
        Some(creds) => Ok(Arc::new(StaticSecretStore::new(creds.username, creds.password))),
        None => {
            warn!("no master key and no --username/--password, BMCs will be crawled without credentials");
            Ok(Arc::new(StaticSecretStore::empty()))
        }
    }
}
