//! The per-round scan loop
//!
//! ```text
//! for each vendor id:
//!   budget left? ──no──▶ stop, remainder becomes failures
//!   acquire identity ─▶ probe ─▶ classify
//!   update stats + run streak, spawn upload on match
//!   backoff decision ──abort──▶ stop, remainder becomes failures
//!   sleep, then let the identity manager rotate
//! ```
//!
//! The run-level error streak lives here and survives round boundaries and
//! identity rotations. Identity-local counters live in the identity manager.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::backoff::{BackoffController, BackoffDecision};
use super::classify::classify;
use super::probe::Probe;
use super::rounds::RoundTag;
use crate::error::{Error, VidscanErrorTrait};
use crate::identity::IdentityManager;
use crate::models::{RunStats, ScanOutcome, TokenRecord, VendorId};
use crate::scheduler::shard::business_now;
use crate::store::{upload_with_retry, TokenStore, UploadReceipt};
use crate::utils::error::StoreError;
use crate::utils::retry::RetryConfig;

/// Whether `ParseError` items are retried in the next round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseErrorPolicy {
    /// Count and log, never retry
    #[default]
    Drop,
    /// Put back on the failure queue; the error streak is not touched
    Requeue,
}

impl FromStr for ParseErrorPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "requeue" => Ok(Self::Requeue),
            other => Err(Error::config(format!(
                "parse error policy must be 'drop' or 'requeue', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ParseErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => write!(f, "drop"),
            Self::Requeue => write!(f, "requeue"),
        }
    }
}

/// Engine knobs that do not belong to a collaborator
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Substring of the activation URL that marks a match
    pub target_pattern: String,
    pub parse_error_policy: ParseErrorPolicy,
    /// Retry policy for token uploads
    pub upload_retry: RetryConfig,
}

impl EngineSettings {
    pub fn new(target_pattern: impl Into<String>) -> Self {
        Self {
            target_pattern: target_pattern.into(),
            parse_error_policy: ParseErrorPolicy::default(),
            upload_retry: RetryConfig::default(),
        }
    }
}

/// Why a round stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStop {
    /// Every input item was attempted
    Completed,
    /// The run's time budget ran out
    BudgetExhausted,
    /// The consecutive-error streak hit its limit
    ErrorLimit,
}

/// Result of one pass over an input queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub stop: RoundStop,
    /// Items to hand to the next round, in input order
    pub failures: Vec<VendorId>,
}

impl RoundResult {
    /// Whether the round stopped before attempting every item
    pub fn aborted(&self) -> bool {
        self.stop != RoundStop::Completed
    }
}

type UploadOutcome = (VendorId, Result<UploadReceipt, StoreError>);

/// Probes vendor ids one at a time and classifies the results
pub struct ScanEngine {
    probe: Arc<dyn Probe>,
    tokens: Arc<dyn TokenStore>,
    identities: IdentityManager,
    backoff: BackoffController,
    settings: EngineSettings,
    deadline: Instant,
    error_streak: u32,
    stats: RunStats,
    uploads: JoinSet<UploadOutcome>,
}

impl ScanEngine {
    /// Create an engine whose time budget starts now
    pub fn new(
        probe: Arc<dyn Probe>,
        tokens: Arc<dyn TokenStore>,
        identities: IdentityManager,
        backoff: BackoffController,
        settings: EngineSettings,
        budget: Duration,
    ) -> Self {
        Self {
            probe,
            tokens,
            identities,
            backoff,
            settings,
            deadline: Instant::now() + budget,
            error_streak: 0,
            stats: RunStats::default(),
            uploads: JoinSet::new(),
        }
    }

    /// Start with an existing consecutive-error streak
    pub fn with_error_streak(mut self, streak: u32) -> Self {
        self.error_streak = streak;
        self
    }

    /// Current run-level consecutive-error streak
    pub fn error_streak(&self) -> u32 {
        self.error_streak
    }

    /// Whether the time budget is used up
    pub fn budget_exhausted(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Snapshot of the counters so far
    pub fn stats(&self) -> RunStats {
        RunStats {
            identities_opened: self.identities.opened(),
            ..self.stats.clone()
        }
    }

    /// Run one round over `input`
    pub async fn run_round(&mut self, tag: RoundTag, input: &[VendorId]) -> RoundResult {
        let mut failures = Vec::new();

        for (position, vendor_id) in input.iter().enumerate() {
            if self.budget_exhausted() {
                info!(
                    round = %tag,
                    remaining = input.len() - position,
                    "Run budget exhausted, stopping round"
                );
                failures.extend_from_slice(&input[position..]);
                return RoundResult {
                    stop: RoundStop::BudgetExhausted,
                    failures,
                };
            }

            let outcome = self.scan_item(vendor_id).await;

            self.stats.record(&outcome);
            if outcome.is_transient() {
                self.error_streak += 1;
            } else {
                self.error_streak = 0;
            }
            self.log_outcome(tag, vendor_id, &outcome);

            match &outcome {
                ScanOutcome::Matched { token } => self.spawn_upload(vendor_id, token),
                ScanOutcome::TransientError { .. } => failures.push(vendor_id.clone()),
                ScanOutcome::ParseError { .. }
                    if self.settings.parse_error_policy == ParseErrorPolicy::Requeue =>
                {
                    failures.push(vendor_id.clone())
                }
                _ => {}
            }

            match self.backoff.decide(&outcome, self.error_streak) {
                BackoffDecision::Abort => {
                    self.identities.complete_item(&outcome);
                    let remaining = &input[position + 1..];
                    error!(
                        round = %tag,
                        streak = self.error_streak,
                        remaining = remaining.len(),
                        "Consecutive error limit reached, aborting round"
                    );
                    failures.extend_from_slice(remaining);
                    return RoundResult {
                        stop: RoundStop::ErrorLimit,
                        failures,
                    };
                }
                BackoffDecision::Continue(delay) => {
                    self.backoff.pause(delay).await;
                    self.identities.complete_item(&outcome);
                }
            }

            self.reap_uploads();
        }

        RoundResult {
            stop: RoundStop::Completed,
            failures,
        }
    }

    /// Wait for outstanding uploads and return the final counters
    pub async fn finish(mut self) -> RunStats {
        if !self.uploads.is_empty() {
            info!(pending = self.uploads.len(), "Waiting for token uploads");
        }
        while let Some(joined) = self.uploads.join_next().await {
            self.record_upload(joined);
        }
        self.identities.discard();
        self.stats()
    }

    async fn scan_item(&mut self, vendor_id: &str) -> ScanOutcome {
        let probe = Arc::clone(&self.probe);
        let identity = match self.identities.acquire(probe.as_ref()).await {
            Ok(identity) => identity,
            Err(e) => {
                return ScanOutcome::TransientError {
                    reason: format!("identity setup failed: {e}"),
                }
            }
        };

        let result = probe.probe(&identity.session, vendor_id).await;
        classify(result, &self.settings.target_pattern)
    }

    fn log_outcome(&self, tag: RoundTag, vendor_id: &str, outcome: &ScanOutcome) {
        let scanned = self.stats.scanned;
        match outcome {
            ScanOutcome::Matched { token } => {
                info!(round = %tag, scanned, vendor_id = %vendor_id, token = %token, "Activation signature matched");
            }
            ScanOutcome::NoMatch => {
                debug!(round = %tag, scanned, vendor_id = %vendor_id, "No match");
            }
            ScanOutcome::TransientError { reason } => {
                warn!(
                    round = %tag,
                    scanned,
                    vendor_id = %vendor_id,
                    streak = self.error_streak,
                    reason = %reason,
                    "Probe failed"
                );
            }
            ScanOutcome::ParseError { reason } => {
                warn!(
                    round = %tag,
                    scanned,
                    vendor_id = %vendor_id,
                    policy = %self.settings.parse_error_policy,
                    reason = %reason,
                    "Matched response without token"
                );
            }
        }
    }

    fn spawn_upload(&mut self, vendor_id: &str, token: &str) {
        let record = TokenRecord::captured(vendor_id, token, business_now());
        let store = Arc::clone(&self.tokens);
        let retry = self.settings.upload_retry.clone();

        self.uploads.spawn(async move {
            let result = upload_with_retry(store.as_ref(), &record, &retry).await;
            (record.vendor_id, result)
        });
    }

    fn reap_uploads(&mut self) {
        while let Some(joined) = self.uploads.try_join_next() {
            self.record_upload(joined);
        }
    }

    fn record_upload(&mut self, joined: Result<UploadOutcome, JoinError>) {
        match joined {
            Ok((vendor_id, Ok(receipt))) => {
                self.stats.uploads_ok += 1;
                debug!(vendor_id = %vendor_id, code = receipt.code, "Token uploaded");
            }
            Ok((vendor_id, Err(e))) => {
                self.stats.uploads_failed += 1;
                warn!(
                    vendor_id = %vendor_id,
                    category = e.category().as_str(),
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "Token upload failed"
                );
            }
            Err(e) => {
                self.stats.uploads_failed += 1;
                error!(error = %e, "Token upload task failed");
            }
        }
    }
}
