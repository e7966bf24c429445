//! Command-line definition

use std::path::PathBuf;

use bmcsweep_core::OutputFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "bmcsweep", version)]
#[command(about = "Discover BMCs and collect their Redfish inventory", long_about = None)]
pub struct Cli {
    /// Config file (default: $BMCSWEEP_CONFIG, ./bmcsweep.toml, /etc/bmcsweep, user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, overrides the config file; RUST_LOG overrides both
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe hosts for open BMC ports and cache the results
    Scan(ScanArgs),
    /// Crawl live BMCs into inventory records
    Collect(CollectArgs),
    /// Crawl a single BMC and print what it reports
    Crawl(CrawlArgs),
    /// Manage the encrypted secret store
    #[command(subcommand)]
    Secrets(SecretsCommand),
}

/// Hosts and ports to probe
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Host, IP or URI; repeatable or comma separated
    #[arg(long = "host", value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// Subnet in CIDR form, or a bare address combined with --mask
    #[arg(long = "subnet", value_delimiter = ',')]
    pub subnets: Vec<String>,

    /// Netmask for bare subnet addresses (e.g. 255.255.255.0)
    #[arg(long)]
    pub mask: Option<String>,

    /// Ports to probe (default from config)
    #[arg(long = "port", value_delimiter = ',')]
    pub ports: Vec<u16>,
}

impl TargetArgs {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.subnets.is_empty()
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Worker count; 0 picks one per host up to 255
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-connection timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Only report ports that serve a Redfish service root
    #[arg(long)]
    pub probe: bool,

    /// Skip TLS validation when probing
    #[arg(long)]
    pub insecure: bool,

    /// Report closed ports too
    #[arg(long)]
    pub all: bool,

    /// Scan cache file (default from config)
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Do not update the scan cache
    #[arg(long)]
    pub no_cache: bool,

    /// Format of the result printed to stdout
    #[arg(long, value_parser = parse_format, default_value = "json")]
    pub format: OutputFormat,
}

/// Where BMC credentials come from
#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// BMC username applied to every host
    #[arg(long, requires = "password")]
    pub username: Option<String>,

    /// BMC password applied to every host
    #[arg(long, requires = "username")]
    pub password: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Do not fall back to the "default" secret
    #[arg(long)]
    pub no_default: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    // scanned first when given; otherwise the scan cache is read
    #[command(flatten)]
    pub targets: TargetArgs,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    /// Scan cache file (default from config)
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Worker count; 0 picks one per host up to 255
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Whole-crawl timeout per BMC in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Skip TLS certificate validation
    #[arg(long)]
    pub insecure: bool,

    /// ID map as inline JSON/YAML or @path
    #[arg(long)]
    pub id_map: Option<String>,

    /// Write all records to this file
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Write one file per record under this directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Output format (default: output file extension, else json)
    #[arg(long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// Inventory service base URL
    #[arg(long)]
    pub inventory_url: Option<String>,

    /// Bearer token for the inventory service
    #[arg(long)]
    pub inventory_token: Option<String>,

    /// Replace records that already exist in the inventory service
    #[arg(long)]
    pub force_update: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// BMC URI, e.g. https://10.254.1.5
    pub uri: String,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    /// Skip TLS certificate validation
    #[arg(long)]
    pub insecure: bool,

    /// Whole-crawl timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Crawl managers instead of systems
    #[arg(long)]
    pub managers: bool,

    /// Format of the result printed to stdout
    #[arg(long, value_parser = parse_format, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum SecretsCommand {
    /// Print a new random master key
    GenerateKey,
    /// Store BMC credentials under an ID (a BMC URI or "default")
    Store {
        secret_id: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print the decrypted secret stored under an ID
    Retrieve {
        secret_id: String,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// List stored secret IDs
    List {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Remove the secret stored under an ID
    Remove {
        secret_id: String,
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Encrypted secret file (default from config)
    #[arg(long)]
    pub secrets_file: Option<PathBuf>,

    /// Hex master key (default: $BMCSWEEP_MASTER_KEY)
    #[arg(long)]
    pub master_key: Option<String>,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse().map_err(|e: bmcsweep_core::OutputError| e.to_string())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_collect() {
        let cli = Cli::try_parse_from([
            "bmcsweep",
            "collect",
            "--subnet",
            "10.254.1.0/24",
            "--port",
            "443,8443",
            "--username",
            "root",
            "--password",
            "initial0",
            "--output-file",
            "inventory.yaml",
            "--force-update",
        ])
        .unwrap();

        let Commands::Collect(args) = cli.command else {
            panic!("expected collect");
        };
        assert_eq!(args.targets.subnets, ["10.254.1.0/24"]);
        assert_eq!(args.targets.ports, [443, 8443]);
        assert_eq!(args.credentials.username.as_deref(), Some("root"));
        assert!(args.force_update);
        assert!(args.format.is_none());
    }

    #[test]
    fn test_username_requires_password() {
        assert!(Cli::try_parse_from(["bmcsweep", "crawl", "https://x", "--username", "root"]).is_err());
    }

    #[test]
    fn test_format_flag() {
        let cli =
            Cli::try_parse_from(["bmcsweep", "--log-format", "json", "scan", "--format", "yaml"])
                .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.format, OutputFormat::Yaml);
    }
}
