use bmcsweep_secrets::{BmcCredentials, SecretStore, generate_master_key};
use color_eyre::Result;
use tracing::info;

use super::open_local_store;
use crate::cli::SecretsCommand;
use crate::config::Config;

pub fn run(command: SecretsCommand, config: &Config) -> Result<()> {
    match command {
        SecretsCommand::GenerateKey => {
            println!("{}", generate_master_key());
        }
        SecretsCommand::Store {
            secret_id,
            username,
            password,
            store,
        } => {
            let store = open_local_store(&store, config)?;
            let value = BmcCredentials::new(username, password).to_secret()?;
            store.store_secret_by_id(&secret_id, &value)?;
            info!(%secret_id, path = %store.path().display(), "stored secret");
        }
        SecretsCommand::Retrieve { secret_id, store } => {
            let store = open_local_store(&store, config)?;
            println!("{}", store.get_secret_by_id(&secret_id)?);
        }
        SecretsCommand::List { store } => {
            let store = open_local_store(&store, config)?;
            let mut ids: Vec<String> = store.list_secrets()?.into_keys().collect();
            ids.sort();
            for id in ids {
                println!("{id}");
            }
        }
        SecretsCommand::Remove { secret_id, store } => {
            let store = open_local_store(&store, config)?;
            store.remove_secret_by_id(&secret_id)?;
            info!(%secret_id, "removed secret");
        }
    }
    Ok(())
}
