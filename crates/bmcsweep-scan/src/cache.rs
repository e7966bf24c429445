//! JSON file cache of scan results
//!
//! `scan` writes here and `collect` reads from here, so the two can run as
//! separate invocations.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::types::RemoteAsset;

/// Scan result cache on disk
#[derive(Debug, Clone)]
pub struct ScanCache {
    path: PathBuf,
}

impl ScanCache {
    /// Cache stored at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the cache file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all cached assets; a missing file yields an empty list
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Vec<RemoteAsset>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "scan cache does not exist");
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let assets: Vec<RemoteAsset> = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), count = assets.len(), "loaded scan cache");
        Ok(assets)
    }

    /// Merge `assets` into the cache, replacing entries with the same host and port
    ///
    /// # Errors
    /// Returns an error if the existing cache cannot be read or the file cannot be written.
    pub fn store(&self, assets: &[RemoteAsset]) -> Result<()> {
        let mut cached = self.load()?;
        for asset in assets {
            match cached
                .iter_mut()
                .find(|c| c.host == asset.host && c.port == asset.port)
            {
                Some(existing) => *existing = asset.clone(),
                None => cached.push(asset.clone()),
            }
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&cached)?)?;

        info!(path = %self.path.display(), count = cached.len(), "updated scan cache");
        Ok(())
    }

    /// Remove the cache file if present
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
