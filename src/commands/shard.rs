use anyhow::{Context, Result};
use std::sync::Arc;

use vidscan::config::Config;
use vidscan::scheduler::{adjusted_budget, business_now, Shard, ShardScheduler};
use vidscan::store::HttpCandidateStore;

/// Print the current shard and this worker's slice of it, without probing
pub async fn shard(config: Config, fetch: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let partition = config.partition()?;

    let now = business_now();
    let shard = Shard::at(now, config.scan.slice_minutes, config.scan.total_slices);
    let budget = adjusted_budget(config.scan.run_minutes, now, config.scan.slice_minutes);

    println!("Shard");
    println!("=====");
    println!("  Now (UTC+8): {}", now.format("%Y/%m/%d %H:%M:%S"));
    println!(
        "  Slice:       {}/{}{}",
        shard.index,
        shard.total_slices,
        if shard.is_addressable() { "" } else { " (outside store range)" }
    );
    println!(
        "  Window:      {} - {}",
        shard.window_start.format("%H:%M"),
        shard.window_end.format("%H:%M")
    );
    println!("  Budget:      {} min", budget.as_secs() / 60);
    println!("  Worker:      {partition}");

    if !fetch {
        return Ok(());
    }

    let candidates = HttpCandidateStore::new(
        &config.stores.candidate_url,
        &config.stores.api_key,
        config.store_timeout(),
    )
    .context("Failed to create candidate store client")?;
    let scheduler = ShardScheduler::new(
        Arc::new(candidates),
        config.scan.slice_minutes,
        config.scan.total_slices,
        config.scan.run_minutes,
    )
    .with_failure_policy(config.stores.failure_policy);
    let plan = scheduler.plan_at(now).await.context("Failed to plan shard")?;

    let bounds = partition.bounds(plan.candidates.len());
    println!("  Candidates:  {}", plan.candidates.len());
    println!(
        "  Own range:   [{}, {}) = {} items",
        bounds.start,
        bounds.end,
        bounds.len()
    );

    Ok(())
}
