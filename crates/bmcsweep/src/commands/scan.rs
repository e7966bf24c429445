use std::sync::Arc;
use std::time::Duration;

use bmcsweep_redfish::RedfishProbe;
use bmcsweep_scan::targets::build_targets;
use bmcsweep_scan::{RemoteAsset, ScanCache, ScanParams, Scanner, ServiceProbe};
use color_eyre::Result;
use eyre::WrapErr;
use tracing::info;

use crate::cli::{ScanArgs, TargetArgs};
use crate::config::Config;

/// Scanner settings after applying command line overrides
pub(crate) struct ScanSettings {
    pub concurrency: usize,
    pub timeout: Duration,
    pub probe: bool,
    pub insecure: bool,
    pub keep_open_only: bool,
}

impl ScanSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.scan.concurrency,
            timeout: Duration::from_secs(config.scan.timeout_secs),
            probe: config.scan.probe,
            insecure: config.collect.insecure,
            keep_open_only: true,
        }
    }
}

/// Expand targets and probe them
pub(crate) async fn scan_targets(
    targets: &TargetArgs,
    settings: &ScanSettings,
    config: &Config,
) -> Result<Vec<RemoteAsset>> {
    let hosts = build_targets(&targets.hosts, &targets.subnets, targets.mask.as_deref())?;
    if hosts.is_empty() {
        eyre::bail!("no targets: pass --host and/or --subnet");
    }

    let ports = if targets.ports.is_empty() {
        config.scan.ports.clone()
    } else {
        targets.ports.clone()
    };

    let probe: Option<Arc<dyn ServiceProbe>> = if settings.probe {
        Some(Arc::new(RedfishProbe::new(settings.timeout, settings.insecure)?))
    } else {
        None
    };

    let scanner = Scanner::new(ScanParams {
        concurrency: settings.concurrency,
        timeout: settings.timeout,
        keep_open_only: settings.keep_open_only,
        probe,
    });

    Ok(scanner.scan(&hosts, &ports).await)
}

pub async fn run(args: ScanArgs, config: &Config) -> Result<()> {
    let mut settings = ScanSettings::from_config(config);
    if let Some(concurrency) = args.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(secs) = args.timeout_secs {
        settings.timeout = Duration::from_secs(secs);
    }
    settings.probe |= args.probe;
    settings.insecure |= args.insecure;
    settings.keep_open_only = !args.all;

    let assets = scan_targets(&args.targets, &settings, config).await?;
    info!(
        live = assets.iter().filter(|a| a.state).count(),
        total = assets.len(),
        "scan finished"
    );

    if !args.no_cache {
        let cache = ScanCache::new(args.cache.as_ref().unwrap_or(&config.scan.cache));
        cache
            .store(&assets)
            .wrap_err_with(|| format!("failed to write scan cache {}", cache.path().display()))?;
    }

    println!("{}", args.format.render(&assets)?);
    Ok(())
}
