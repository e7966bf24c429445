//! Encrypted secret file backend

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::crypto::{self, MasterKey};
use crate::error::{Result, SecretError};
use crate::traits::SecretStore;

/// On-disk layout: `{"secrets": {"<id>": "<hex blob>"}}`
#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretFile {
    #[serde(default)]
    secrets: BTreeMap<String, String>,
}

/// Secret store backed by a JSON file of AES-256-GCM blobs
///
/// The whole file is rewritten on every mutation. All access goes through one
/// mutex so concurrent writers cannot lose each other's updates.
pub struct LocalSecretStore {
    path: PathBuf,
    master_key: MasterKey,
    secrets: Mutex<BTreeMap<String, String>>,
}

impl std::fmt::Debug for LocalSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSecretStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl LocalSecretStore {
    /// Open the store at `path`
    ///
    /// A missing file is treated as an empty store; it is created on the first
    /// write.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, master_key: MasterKey) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let secrets = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str::<SecretFile>(&content)?.secrets
            }
        } else {
            debug!("secret file does not exist yet");
            BTreeMap::new()
        };

        info!(count = secrets.len(), "opened secret store");

        Ok(Self {
            path,
            master_key,
            secrets: Mutex::new(secrets),
        })
    }

    /// Open the store using the master key from the environment
    ///
    /// # Errors
    /// Returns an error if the master key is missing or invalid, or if the file
    /// cannot be read.
    pub fn open_from_env(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, MasterKey::from_env()?)
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.secrets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the full map back to disk
    ///
    /// The content goes to a temporary file next to the target which is then
    /// renamed over it, so a failed write leaves the previous file intact.
    fn persist(&self, secrets: &BTreeMap<String, String>) -> Result<()> {
        let file = SecretFile {
            secrets: secrets.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        restrict_permissions(tmp.path())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), count = secrets.len(), "persisted secrets");
        Ok(())
    }
}

impl SecretStore for LocalSecretStore {
    fn get_secret_by_id(&self, secret_id: &str) -> Result<String> {
        let blob = self
            .lock()
            .get(secret_id)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(secret_id.to_string()))?;

        let plaintext = crypto::decrypt(&self.master_key, secret_id, &blob)?;
        String::from_utf8(plaintext).map_err(|_| SecretError::Decryption(secret_id.to_string()))
    }

    fn store_secret_by_id(&self, secret_id: &str, value: &str) -> Result<()> {
        let blob = crypto::encrypt(&self.master_key, secret_id, value.as_bytes())?;

        let mut secrets = self.lock();
        let mut updated = secrets.clone();
        updated.insert(secret_id.to_string(), blob);
        self.persist(&updated)?;
        *secrets = updated;

        info!(secret_id, "stored secret");
        Ok(())
    }

    fn list_secrets(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .lock()
            .iter()
            .map(|(id, blob)| (id.clone(), blob.clone()))
            .collect())
    }

    fn remove_secret_by_id(&self, secret_id: &str) -> Result<()> {
        let mut secrets = self.lock();
        let mut updated = secrets.clone();
        if updated.remove(secret_id).is_none() {
            return Err(SecretError::NotFound(secret_id.to_string()));
        }
        self.persist(&updated)?;
        *secrets = updated;

        info!(secret_id, "removed secret");
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(0o600);
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
