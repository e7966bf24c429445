//! Configuration loading and types

use std::path::{Path, PathBuf};

use bmcsweep_core::OutputFormat;
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "BMCSWEEP_CONFIG";

/// Top-level configuration read from `bmcsweep.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Scanner settings
    #[serde(default)]
    pub scan: ScanConfig,
    /// Collection settings
    #[serde(default)]
    pub collect: CollectConfig,
    /// Secret store settings
    #[serde(default)]
    pub secrets: SecretsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            scan: ScanConfig::default(),
            collect: CollectConfig::default(),
            secrets: SecretsConfig::default(),
        }
    }
}

/// Scanner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Ports to probe on every host
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,
    /// Worker count; 0 picks one per host up to 255
    #[serde(default)]
    pub concurrency: usize,
    /// Per-connection timeout in seconds
    #[serde(default = "default_scan_timeout")]
    pub timeout_secs: u64,
    /// Require a Redfish service root on open ports
    #[serde(default)]
    pub probe: bool,
    /// Scan result cache
    #[serde(default = "default_cache_path")]
    pub cache: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ports: default_ports(),
            concurrency: 0,
            timeout_secs: default_scan_timeout(),
            probe: false,
            cache: default_cache_path(),
        }
    }
}

/// Collection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Worker count; 0 picks one per host up to 255
    #[serde(default)]
    pub concurrency: usize,
    /// Whole-crawl timeout per BMC in seconds
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,
    /// Skip TLS certificate validation
    #[serde(default)]
    pub insecure: bool,
    /// Fall back to the `default` secret
    #[serde(default = "default_true")]
    pub use_default: bool,
    /// Flat output file
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    /// Per-ID output directory
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Output format; otherwise from the output file extension
    #[serde(default)]
    pub format: Option<OutputFormat>,
    /// Inline ID map or `@path`
    #[serde(default)]
    pub id_map: Option<String>,
    /// Inventory service base URL
    #[serde(default)]
    pub inventory_url: Option<String>,
    /// Bearer token for the inventory service
    #[serde(default)]
    pub inventory_token: Option<String>,
    /// Replace records that already exist in the inventory service
    #[serde(default)]
    pub force_update: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            concurrency: 0,
            timeout_secs: default_crawl_timeout(),
            insecure: false,
            use_default: true,
            output_file: None,
            output_dir: None,
            format: None,
            id_map: None,
            inventory_url: None,
            inventory_token: None,
            force_update: false,
        }
    }
}

/// Secret store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Encrypted secret file
    #[serde(default = "default_secrets_path")]
    pub file: PathBuf,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            file: default_secrets_path(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ports() -> Vec<u16> {
    vec![443]
}

fn default_scan_timeout() -> u64 {
    5
}

fn default_crawl_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("bmcsweep/assets.json"))
        .unwrap_or_else(|| PathBuf::from("bmcsweep-assets.json"))
}

fn default_secrets_path() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("bmcsweep/secrets.json"))
        .unwrap_or_else(|| PathBuf::from("bmcsweep-secrets.json"))
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Config file to use when none is given on the command line
    ///
    /// `BMCSWEEP_CONFIG` wins even if the file does not exist, so a typo
    /// surfaces as an error instead of silently falling back to defaults.
    pub fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        let paths = [
            Some(PathBuf::from("bmcsweep.toml")),
            Some(PathBuf::from("/etc/bmcsweep/bmcsweep.toml")),
            dirs::config_dir().map(|p| p.join("bmcsweep/bmcsweep.toml")),
        ];

        paths.into_iter().flatten().find(|path| path.exists())
    }
}
