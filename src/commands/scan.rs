use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use vidscan::config::{Config, Variant};
use vidscan::identity::IdentityManager;
use vidscan::report::RunReport;
use vidscan::scan::probe::egress_ip;
use vidscan::scan::{
    BackoffController, EngineSettings, HttpProbe, RetryRoundController, ScanEngine,
};
use vidscan::scheduler::{HalfSelector, ShardScheduler};
use vidscan::store::{HttpCandidateStore, HttpTokenStore};

/// Command-line overrides for a scan run
#[derive(Debug, Clone, Default)]
pub struct ScanOverrides {
    pub variant: Option<Variant>,
    pub worker: Option<usize>,
    pub workers: Option<usize>,
    pub half: Option<HalfSelector>,
    pub run_minutes: Option<u32>,
    pub pattern: Option<String>,
    pub seed: Option<u64>,
}

impl ScanOverrides {
    /// Apply the preset first, then individual flags
    pub fn apply(self, config: &mut Config) {
        if let Some(variant) = self.variant {
            variant.apply(config);
        }
        if let Some(worker) = self.worker {
            config.scan.worker_ordinal = worker;
        }
        if let Some(workers) = self.workers {
            config.scan.total_workers = workers;
        }
        if let Some(half) = self.half {
            config.scan.half = Some(half);
        }
        if let Some(minutes) = self.run_minutes {
            config.scan.run_minutes = minutes;
        }
        if let Some(pattern) = self.pattern {
            config.scan.target_pattern = pattern;
        }
        if let Some(seed) = self.seed {
            config.scan.seed = Some(seed);
        }
    }
}

pub async fn scan(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    if config.scan.target_pattern.trim().is_empty() {
        anyhow::bail!("target pattern is not set (VIDSCAN_TARGET_PATTERN or --pattern)");
    }

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "run",
        run_id = %run_id,
        strategy = config.identity.strategy.label()
    );

    run(config).instrument(span).await
}

async fn run(config: Config) -> Result<()> {
    let partition = config.partition()?;

    if let Some(url) = &config.probe.egress_ip_url {
        match egress_ip(url, config.request_timeout()).await {
            Ok(ip) => info!(ip = %ip, "Egress address"),
            Err(e) => warn!(error = %e, "Egress address lookup failed"),
        }
    }

    let candidates = HttpCandidateStore::new(
        &config.stores.candidate_url,
        &config.stores.api_key,
        config.store_timeout(),
    )
    .context("Failed to create candidate store client")?;
    let tokens = HttpTokenStore::new(
        &config.stores.token_url,
        &config.stores.api_key,
        config.store_timeout(),
    )
    .context("Failed to create token store client")?;

    let scheduler = ShardScheduler::new(
        Arc::new(candidates),
        config.scan.slice_minutes,
        config.scan.total_slices,
        config.scan.run_minutes,
    )
    .with_failure_policy(config.stores.failure_policy);
    let plan = scheduler.plan().await.context("Failed to plan shard")?;

    let own = partition.apply(&plan.candidates).to_vec();
    info!(
        partition = %partition,
        bounds = ?partition.bounds(plan.candidates.len()),
        items = own.len(),
        budget_secs = plan.budget.as_secs(),
        "Partition selected"
    );

    let seed = config.scan.seed;
    let identities =
        IdentityManager::new(config.identity.strategy, config.identity.warm_up, seed);
    let backoff = BackoffController::new(&config.backoff, seed.map(|s| s.wrapping_add(1)));
    let settings = EngineSettings {
        target_pattern: config.scan.target_pattern.clone(),
        parse_error_policy: config.scan.parse_error_policy,
        upload_retry: config.upload_retry(),
    };

    let mut engine = ScanEngine::new(
        Arc::new(HttpProbe::new(config.probe.clone())),
        Arc::new(tokens),
        identities,
        backoff,
        settings,
        plan.budget,
    );

    let partition_size = own.len();
    let controller = RetryRoundController::new(config.round_policy());
    let retry = controller.run(&mut engine, own).await;
    let stats = engine.finish().await;

    let report = RunReport::new(partition_size, stats, &retry);
    report.log();
    println!("{report}");

    Ok(())
}
