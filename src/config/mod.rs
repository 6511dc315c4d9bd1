//! Configuration management for the vidscan scanner
//!
//! This module handles loading and validating configuration from environment variables,
//! files, and command-line arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::identity::RotationStrategy;
use crate::notifications::channels::telegram::DEFAULT_API_BASE;
use crate::scan::backoff::DelayWindow;
use crate::scan::engine::ParseErrorPolicy;
use crate::scan::rounds::RoundPolicy;
use crate::scheduler::partition::{HalfSelector, WorkerPartition};
use crate::scheduler::shard::is_valid_slice_width;
use crate::store::StoreFailurePolicy;
use crate::utils::parse_http_url;
use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Candidate and token store endpoints
    pub stores: StoreConfig,

    /// Sharding, partitioning and round control
    pub scan: ScanConfig,

    /// Identity rotation
    pub identity: IdentityConfig,

    /// Error backoff
    pub backoff: BackoffConfig,

    /// Target endpoint and request shape
    pub probe: ProbeConfig,

    /// Report delivery
    pub notifier: NotifierConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Remote store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Bearer credential shared by both stores
    pub api_key: String,

    /// Candidate store base URL
    pub candidate_url: String,

    /// Token store base URL
    pub token_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// What a failed store call turns into
    pub failure_policy: StoreFailurePolicy,

    /// Retries for a failed token upload
    pub upload_retries: u32,
}

/// Scan orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Substring of the activation URL that marks a match
    pub target_pattern: String,

    /// Wall-clock budget of one run, in minutes
    pub run_minutes: u32,

    /// Width of one shard window in minutes; must divide 60
    pub slice_minutes: u32,

    /// Number of slices the candidate store splits its data into
    pub total_slices: u32,

    /// Workers sharing one shard
    pub total_workers: usize,

    /// Zero-based ordinal of this worker
    pub worker_ordinal: usize,

    /// Optional second-stage split of the worker's range
    pub half: Option<HalfSelector>,

    /// Extra rounds after the initial one
    pub max_retry_rounds: u32,

    /// Pause before each retry round, in seconds
    pub round_pause_secs: u64,

    /// Whether parse errors are retried
    pub parse_error_policy: ParseErrorPolicy,

    /// Seed for fingerprint and jitter selection; random when unset
    pub seed: Option<u64>,
}

/// Identity rotation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Lifetime of an identity
    pub strategy: RotationStrategy,

    /// Navigate to the warm-up URL when an identity opens
    pub warm_up: bool,
}

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Sleep windows for streaks 1, 2, 3 and beyond
    pub tiers: Vec<DelayWindow>,

    /// Sleep after a non-error outcome
    pub pacing: DelayWindow,

    /// Streak at which a round is aborted
    pub max_consecutive_errors: u32,
}

/// Probe endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Activity API endpoint
    pub endpoint: String,

    /// `functionId` form field
    pub function_id: String,

    /// `appid` form field
    pub app_id: String,

    /// `clientVersion` form field
    pub client_version: String,

    /// `client` form field
    pub client: String,

    /// `source` inside the JSON body parameter
    pub source: String,

    /// Origin header
    pub origin: String,

    /// Shop page the referer is built from
    pub referer_base: String,

    /// Page opened once per identity when warm-up is on
    pub warm_up_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Outbound proxy applied to every session
    pub proxy: Option<String>,

    /// IP echo service queried once at start-up
    pub egress_ip_url: Option<String>,
}

/// Notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Telegram bot token
    pub bot_token: Option<String>,

    /// Chat the daily report goes to
    pub chat_id: Option<String>,

    /// Bot API host
    pub api_base: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Resend attempts on transient failures
    pub max_retries: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

/// Deployment preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Fresh identity per item, half-hour shards, multi-round retry
    Fresh,
    /// Pooled identities with warm-up, hour-wide shards, single round
    Pooled,
}

impl Variant {
    /// Overwrite the settings that differ between variants
    pub fn apply(self, config: &mut Config) {
        match self {
            Self::Fresh => {
                config.identity.strategy = RotationStrategy::FreshPerItem;
                config.identity.warm_up = false;
                config.backoff.pacing = DelayWindow::secs(4, 6);
                config.scan.slice_minutes = 30;
                config.scan.total_slices = 48;
                config.scan.max_retry_rounds = 3;
            }
            Self::Pooled => {
                config.identity.strategy = RotationStrategy::pooled_default();
                config.identity.warm_up = true;
                config.backoff.pacing = DelayWindow::new(2800, 6300);
                config.scan.slice_minutes = 60;
                config.scan.total_slices = 24;
                config.scan.total_workers = 1;
                config.scan.worker_ordinal = 0;
                config.scan.half = None;
                config.scan.max_retry_rounds = 0;
            }
        }
    }
}

impl FromStr for Variant {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fresh" => Ok(Self::Fresh),
            "pooled" => Ok(Self::Pooled),
            other => Err(crate::error::Error::config(format!(
                "variant must be 'fresh' or 'pooled', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Pooled => write!(f, "pooled"),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Like `env_parse`, but a set value that does not parse is an error
fn env_parse_strict<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{key}={raw:?} is invalid: {e}")),
        None => Ok(None),
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables keep their defaults, except the
    /// partition keys (`VIDSCAN_TOTAL_WORKERS`, `VIDSCAN_WORKER_ORDINAL`,
    /// `VIDSCAN_HALF`), where a bad value would overlap another worker's
    /// range and is rejected instead.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(variant) = env_parse::<Variant>("VIDSCAN_VARIANT") {
            variant.apply(&mut config);
        }

        let stores = &mut config.stores;
        if let Some(v) = env_string("VIDSCAN_API_KEY") {
            stores.api_key = v;
        }
        if let Some(v) = env_string("VIDSCAN_CANDIDATE_URL") {
            stores.candidate_url = v;
        }
        if let Some(v) = env_string("VIDSCAN_TOKEN_URL") {
            stores.token_url = v;
        }
        stores.timeout_secs = env_parse("VIDSCAN_STORE_TIMEOUT").unwrap_or(stores.timeout_secs);
        stores.failure_policy =
            env_parse("VIDSCAN_STORE_FAILURE_POLICY").unwrap_or(stores.failure_policy);
        stores.upload_retries = env_parse("VIDSCAN_UPLOAD_RETRIES").unwrap_or(stores.upload_retries);

        let scan = &mut config.scan;
        if let Some(v) = env_string("VIDSCAN_TARGET_PATTERN") {
            scan.target_pattern = v;
        }
        scan.run_minutes = env_parse("VIDSCAN_RUN_MINUTES").unwrap_or(scan.run_minutes);
        scan.slice_minutes = env_parse("VIDSCAN_SLICE_MINUTES").unwrap_or(scan.slice_minutes);
        scan.total_slices = env_parse("VIDSCAN_TOTAL_SLICES").unwrap_or(scan.total_slices);
        if let Some(v) = env_parse_strict("VIDSCAN_TOTAL_WORKERS")? {
            scan.total_workers = v;
        }
        if let Some(v) = env_parse_strict("VIDSCAN_WORKER_ORDINAL")? {
            scan.worker_ordinal = v;
        }
        if let Some(half) = env_parse_strict::<HalfSelector>("VIDSCAN_HALF")? {
            scan.half = Some(half);
        }
        scan.max_retry_rounds = env_parse("VIDSCAN_MAX_RETRY_ROUNDS").unwrap_or(scan.max_retry_rounds);
        scan.round_pause_secs = env_parse("VIDSCAN_ROUND_PAUSE").unwrap_or(scan.round_pause_secs);
        scan.parse_error_policy =
            env_parse("VIDSCAN_PARSE_ERROR_POLICY").unwrap_or(scan.parse_error_policy);
        scan.seed = env_parse("VIDSCAN_SEED").or(scan.seed);

        config.backoff.max_consecutive_errors = env_parse("VIDSCAN_MAX_CONSECUTIVE_ERRORS")
            .unwrap_or(config.backoff.max_consecutive_errors);

        if let RotationStrategy::PooledWithRotation {
            min_items,
            max_items,
            error_threshold,
        } = &mut config.identity.strategy
        {
            *min_items = env_parse("VIDSCAN_POOL_MIN_ITEMS").unwrap_or(*min_items);
            *max_items = env_parse("VIDSCAN_POOL_MAX_ITEMS").unwrap_or(*max_items);
            *error_threshold = env_parse("VIDSCAN_POOL_ERROR_THRESHOLD").unwrap_or(*error_threshold);
        }
        config.identity.warm_up = env_parse("VIDSCAN_WARM_UP").unwrap_or(config.identity.warm_up);

        let probe = &mut config.probe;
        if let Some(v) = env_string("VIDSCAN_PROBE_ENDPOINT") {
            probe.endpoint = v;
        }
        if let Some(v) = env_string("VIDSCAN_WARM_UP_URL") {
            probe.warm_up_url = Some(v);
        }
        probe.timeout_secs = env_parse("VIDSCAN_REQUEST_TIMEOUT").unwrap_or(probe.timeout_secs);
        if let Some(v) = env_string("VIDSCAN_PROXY") {
            probe.proxy = Some(v);
        }
        if let Some(v) = env_string("VIDSCAN_EGRESS_IP_URL") {
            probe.egress_ip_url = Some(v);
        }

        config.notifier.bot_token = env_string("TELEGRAM_BOT_TOKEN");
        config.notifier.chat_id = env_string("TELEGRAM_CHAT_ID");

        if let Some(v) = env_string("VIDSCAN_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = env_string("VIDSCAN_LOG_FORMAT") {
            config.logging.format = v;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let scan = &self.scan;
        if scan.total_workers == 0 {
            anyhow::bail!("total_workers must be greater than 0");
        }
        if scan.worker_ordinal >= scan.total_workers {
            anyhow::bail!(
                "worker_ordinal {} must be less than total_workers {}",
                scan.worker_ordinal,
                scan.total_workers
            );
        }
        if !is_valid_slice_width(scan.slice_minutes) {
            anyhow::bail!("slice_minutes must divide 60, got {}", scan.slice_minutes);
        }
        if scan.total_slices == 0 {
            anyhow::bail!("total_slices must be greater than 0");
        }

        if let RotationStrategy::PooledWithRotation {
            min_items,
            max_items,
            error_threshold,
        } = self.identity.strategy
        {
            if min_items == 0 || min_items > max_items {
                anyhow::bail!("pooled identity item range {min_items}..={max_items} is invalid");
            }
            if error_threshold == 0 {
                anyhow::bail!("error_threshold must be greater than 0");
            }
        }

        self.backoff.validate()?;

        if self.probe.timeout_secs == 0 {
            anyhow::bail!("probe timeout must be greater than 0");
        }
        parse_http_url(&self.probe.endpoint).context("probe endpoint")?;
        if let Some(url) = &self.probe.warm_up_url {
            parse_http_url(url).context("warm-up URL")?;
        }
        if let Some(url) = &self.probe.egress_ip_url {
            parse_http_url(url).context("egress IP URL")?;
        }
        for (name, url) in [
            ("candidate store", &self.stores.candidate_url),
            ("token store", &self.stores.token_url),
        ] {
            if !url.is_empty() {
                parse_http_url(url).with_context(|| format!("{name} URL"))?;
            }
        }
        if self.stores.timeout_secs == 0 {
            anyhow::bail!("store timeout must be greater than 0");
        }

        self.logging.validate()?;

        Ok(())
    }

    /// This worker's partition
    pub fn partition(&self) -> Result<WorkerPartition> {
        WorkerPartition::new(self.scan.worker_ordinal, self.scan.total_workers, self.scan.half)
            .map_err(anyhow::Error::from)
    }

    /// Get probe timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.timeout_secs)
    }

    /// Get store timeout as Duration
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.stores.timeout_secs)
    }

    /// Retry-round policy
    #[must_use]
    pub fn round_policy(&self) -> RoundPolicy {
        RoundPolicy {
            max_retry_rounds: self.scan.max_retry_rounds,
            pause: Duration::from_secs(self.scan.round_pause_secs),
        }
    }

    /// Upload retry policy
    #[must_use]
    pub fn upload_retry(&self) -> RetryConfig {
        RetryConfig::new(self.stores.upload_retries)
    }
}

impl BackoffConfig {
    /// Backoff that never sleeps, aborting at `max_consecutive_errors`
    pub fn immediate(max_consecutive_errors: u32) -> Self {
        Self {
            tiers: vec![DelayWindow::zero(); 3],
            pacing: DelayWindow::zero(),
            max_consecutive_errors,
        }
    }

    /// Reject inverted windows and overlapping tiers
    ///
    /// Tier k must end at or below where tier k+1 begins, which keeps the
    /// sleep non-decreasing in the streak.
    pub fn validate(&self) -> Result<()> {
        if self.max_consecutive_errors == 0 {
            anyhow::bail!("max_consecutive_errors must be greater than 0");
        }
        if !self.pacing.is_valid() {
            anyhow::bail!("pacing window is inverted");
        }
        for (i, tier) in self.tiers.iter().enumerate() {
            if !tier.is_valid() {
                anyhow::bail!("backoff tier {} is inverted", i + 1);
            }
        }
        for (i, pair) in self.tiers.windows(2).enumerate() {
            if pair[0].max_ms > pair[1].min_ms {
                anyhow::bail!("backoff tiers {} and {} overlap", i + 1, i + 2);
            }
        }
        Ok(())
    }
}

impl LoggingConfig {
    /// Apply command-line overrides on top of the loaded settings
    #[must_use]
    pub fn with_overrides(mut self, format: Option<&str>, verbose: bool) -> Self {
        if let Some(format) = format {
            self.format = format.to_string();
        }
        if verbose {
            self.level = String::from("debug");
        }
        self
    }

    /// `EnvFilter` directive: the crate at `level`, dependencies at warn
    pub fn filter_directive(&self) -> String {
        format!("vidscan={},warn", self.level.trim().to_lowercase())
    }

    pub fn is_json(&self) -> bool {
        self.format.trim().eq_ignore_ascii_case("json")
    }

    pub fn validate(&self) -> Result<()> {
        let level = self.level.trim().to_lowercase();
        if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            anyhow::bail!("log level must be one of trace, debug, info, warn, error; got '{}'", self.level);
        }
        let format = self.format.trim().to_lowercase();
        if format != "text" && format != "json" {
            anyhow::bail!("log format must be 'text' or 'json', got '{}'", self.format);
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            candidate_url: String::new(),
            token_url: String::new(),
            timeout_secs: 15,
            failure_policy: StoreFailurePolicy::Empty,
            upload_retries: 2,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target_pattern: String::new(),
            run_minutes: 10,
            slice_minutes: 30,
            total_slices: 48,
            total_workers: 20,
            worker_ordinal: 0,
            half: None,
            max_retry_rounds: 3,
            round_pause_secs: 5,
            parse_error_policy: ParseErrorPolicy::Drop,
            seed: None,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                DelayWindow::secs(4, 6),
                DelayWindow::secs(8, 12),
                DelayWindow::secs(14, 18),
            ],
            pacing: DelayWindow::secs(4, 6),
            max_consecutive_errors: 10,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("https://api.m.jd.com/client.action"),
            function_id: String::from("whx_getShopHomeActivityInfo"),
            app_id: String::from("shop_m_jd_com"),
            client_version: String::from("11.0.0"),
            client: String::from("wh5"),
            source: String::from("m-shop"),
            origin: String::from("https://shop.m.jd.com"),
            referer_base: String::from("https://shop.m.jd.com/shop/home"),
            warm_up_url: Some(String::from("https://m.jd.com")),
            timeout_secs: 15,
            proxy: None,
            egress_ip_url: None,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: String::from(DEFAULT_API_BASE),
            timeout_secs: 10,
            max_retries: 2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}
