//! Writing collected records to disk

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OutputError, OutputResult};
use crate::record::InventoryRecord;

/// Serialization format of output files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    /// Format implied by a file extension
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(OutputFormat::Json),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            _ => None,
        }
    }

    /// File extension for this format
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }

    /// Serialize `value` in this format
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn render<T: Serialize + ?Sized>(self, value: &T) -> OutputResult<String> {
        Ok(match self {
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
        })
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> OutputResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(OutputError::UnknownFormat(other.to_string())),
        }
    }
}

/// Where collected records go
#[derive(Debug, Clone, Default)]
pub struct OutputTargets {
    /// Single file holding all records
    pub file: Option<PathBuf>,
    /// Root of the per-ID directory tree
    pub dir: Option<PathBuf>,
    /// Explicit format; otherwise taken from `file`'s extension, else JSON
    pub format: Option<OutputFormat>,
}

impl OutputTargets {
    /// Effective output format
    #[must_use]
    pub fn resolved_format(&self) -> OutputFormat {
        self.format
            .or_else(|| self.file.as_deref().and_then(OutputFormat::from_extension))
            .unwrap_or_default()
    }

    /// Whether any target is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.dir.is_none()
    }

    /// Write `records` to every configured target, returning the files written
    ///
    /// # Errors
    /// Returns the first serialization or file system error.
    pub fn write(&self, records: &[InventoryRecord]) -> OutputResult<Vec<PathBuf>> {
        let format = self.resolved_format();
        let mut written = Vec::new();

        if let Some(file) = &self.file {
            write_flat(file, records, format)?;
            written.push(file.clone());
        }
        if let Some(dir) = &self.dir {
            written.extend(write_tree(dir, records, format, Utc::now())?);
        }

        info!(files = written.len(), %format, "wrote collection output");
        Ok(written)
    }
}

fn ensure_parent(path: &Path) -> OutputResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write all records as one array
///
/// # Errors
/// Returns an error if serialization or the write fails.
pub fn write_flat(path: &Path, records: &[InventoryRecord], format: OutputFormat) -> OutputResult<()> {
    ensure_parent(path)?;
    std::fs::write(path, format.render(records)?)?;
    debug!(path = %path.display(), records = records.len(), "wrote flat output");
    Ok(())
}

/// Write each record to `<dir>/<id>/<id>.<timestamp>.<ext>`
///
/// # Errors
/// Returns an error if serialization or a write fails.
pub fn write_tree(
    dir: &Path,
    records: &[InventoryRecord],
    format: OutputFormat,
    timestamp: DateTime<Utc>,
) -> OutputResult<Vec<PathBuf>> {
    let stamp = timestamp.format("%Y%m%dT%H%M%SZ");
    let mut written = Vec::with_capacity(records.len());

    for record in records {
        let record_dir = dir.join(&record.id);
        std::fs::create_dir_all(&record_dir)?;

        let path = record_dir.join(format!("{}.{stamp}.{}", record.id, format.extension()));
        std::fs::write(&path, format.render(record)?)?;
        debug!(path = %path.display(), "wrote record");
        written.push(path);
    }
    Ok(written)
}
