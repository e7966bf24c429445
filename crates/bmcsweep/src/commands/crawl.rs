use std::time::Duration;

use bmcsweep_redfish::{BmcCrawler, CrawlerConfig};
use color_eyre::Result;

use super::{credential_store, explicit_credentials};
use crate::cli::CrawlArgs;
use crate::config::Config;

pub async fn run(args: CrawlArgs, config: &Config) -> Result<()> {
    let store = credential_store(&args.credentials, config)?;

    let mut crawl_config = CrawlerConfig::new(&args.uri, store)
        .with_insecure(args.insecure || config.collect.insecure)
        .with_use_default(config.collect.use_default && !args.credentials.no_default)
        .with_timeout(Duration::from_secs(
            args.timeout_secs.unwrap_or(config.collect.timeout_secs),
        ));
    if let Some(creds) = explicit_credentials(&args.credentials) {
        crawl_config = crawl_config.with_credentials(creds);
    }

    let crawler = BmcCrawler::http();
    let rendered = if args.managers {
        args.format.render(&crawler.crawl_managers(&crawl_config).await?)?
    } else {
        args.format.render(&crawler.crawl_systems(&crawl_config).await?)?
    };

    println!("{rendered}");
    Ok(())
}
