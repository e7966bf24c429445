use std::time::Duration;

use bmcsweep_core::{
    BmcIdMap, CollectParams, Collector, Headers, HostOutcome, HttpInventorySink, OutputTargets,
    forward_records, select_mapper,
};
use bmcsweep_redfish::BmcCrawler;
use bmcsweep_scan::ScanCache;
use color_eyre::Result;
use eyre::WrapErr;
use tracing::{info, warn};

use super::scan::{ScanSettings, scan_targets};
use super::{credential_store, explicit_credentials};
use crate::cli::CollectArgs;
use crate::config::Config;

pub async fn run(args: CollectArgs, config: &Config) -> Result<()> {
    let cc = &config.collect;
    let insecure = args.insecure || cc.insecure;

    let assets = if args.targets.is_empty() {
        let cache = ScanCache::new(args.cache.as_ref().unwrap_or(&config.scan.cache));
        let assets = cache
            .load()
            .wrap_err_with(|| format!("failed to read scan cache {}", cache.path().display()))?;
        info!(path = %cache.path().display(), count = assets.len(), "using cached scan results");
        assets
    } else {
        let mut settings = ScanSettings::from_config(config);
        settings.insecure = insecure;
        scan_targets(&args.targets, &settings, config).await?
    };

    let id_map = match args.id_map.as_ref().or(cc.id_map.as_ref()) {
        Some(source) => Some(BmcIdMap::from_source(source).wrap_err("failed to load ID map")?),
        None => None,
    };
    let mapper = select_mapper(id_map);

    let params = CollectParams {
        concurrency: args.concurrency.unwrap_or(cc.concurrency),
        timeout: Duration::from_secs(args.timeout_secs.unwrap_or(cc.timeout_secs)),
        insecure,
        use_default: cc.use_default && !args.credentials.no_default,
        credentials: explicit_credentials(&args.credentials),
    };
    let store = credential_store(&args.credentials, config)?;

    let collector = Collector::new(BmcCrawler::http(), mapper, store, params);
    let outcome = collector.collect(&assets).await;

    for status in &outcome.statuses {
        if let HostOutcome::Failed(e) = &status.outcome {
            warn!(host = %status.host, port = status.port, error = %e, "host failed");
        }
    }

    let targets = OutputTargets {
        file: args.output_file.or_else(|| cc.output_file.clone()),
        dir: args.output_dir.or_else(|| cc.output_dir.clone()),
        format: args.format.or(cc.format),
    };
    if targets.is_empty() {
        println!("{}", targets.resolved_format().render(&outcome.records)?);
    } else {
        targets.write(&outcome.records)?;
    }

    if let Some(url) = args.inventory_url.as_ref().or(cc.inventory_url.as_ref()) {
        let token = args.inventory_token.or_else(|| cc.inventory_token.clone());
        let sink = HttpInventorySink::new(url, token, insecure, Duration::from_secs(cc.timeout_secs))
            .wrap_err("failed to set up inventory sink")?;
        forward_records(
            &sink,
            &outcome.records,
            &Headers::new(),
            args.force_update || cc.force_update,
        )
        .await;
    }

    info!(
        records = outcome.records.len(),
        failed = outcome.failures().count(),
        "collect finished"
    );
    Ok(())
}
