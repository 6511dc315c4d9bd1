use anyhow::{Context, Result};
use std::sync::Arc;

use vidscan::config::Config;
use vidscan::notifications::Notifier;
use vidscan::report::DailyReporter;
use vidscan::store::HttpTokenStore;

pub async fn report(config: Config, dry_run: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let tokens = HttpTokenStore::new(
        &config.stores.token_url,
        &config.stores.api_key,
        config.store_timeout(),
    )
    .context("Failed to create token store client")?;

    let reporter = DailyReporter::new(
        Arc::new(tokens),
        config.scan.slice_minutes,
        config.scan.total_slices,
    )
    .with_failure_policy(config.stores.failure_policy);

    let report = reporter.build().await.context("Failed to build daily report")?;
    let text = report.render();
    println!("{text}");

    if dry_run {
        tracing::info!("Dry run, report not sent");
        return Ok(());
    }

    Notifier::from_config(&config.notifier).send(&text).await;
    Ok(())
}
