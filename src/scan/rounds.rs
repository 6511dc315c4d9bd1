//! Bounded multi-round retry
//!
//! Round 0 scans the whole partition. Each later round scans only what the
//! previous round handed back, so the queue can shrink but never grow, and
//! an item that resolved to a match or no-match is never scanned again.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::info;

use super::engine::{RoundStop, ScanEngine};
use crate::models::VendorId;

/// Label of a round in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundTag {
    /// The first pass over the full partition
    Initial,
    /// The n-th retry pass, starting at 1
    Retry(u32),
}

impl RoundTag {
    fn for_attempt(attempt: u32) -> Self {
        if attempt == 0 {
            Self::Initial
        } else {
            Self::Retry(attempt)
        }
    }
}

impl fmt::Display for RoundTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Retry(n) => write!(f, "retry-{n}"),
        }
    }
}

/// How many extra rounds to run and how long to rest between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPolicy {
    pub max_retry_rounds: u32,
    pub pause: Duration,
}

impl Default for RoundPolicy {
    fn default() -> Self {
        Self {
            max_retry_rounds: 3,
            pause: Duration::from_secs(5),
        }
    }
}

/// Terminal state of the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The queue drained
    Completed,
    /// Retry rounds ran out with items still failing
    RetriesExhausted,
    /// The time budget ran out mid-round
    BudgetExhausted,
    /// A round was aborted on the consecutive-error limit
    ErrorLimit,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Completed => "completed",
            Self::RetriesExhausted => "retries exhausted",
            Self::BudgetExhausted => "budget exhausted",
            Self::ErrorLimit => "error limit",
        };
        write!(f, "{label}")
    }
}

/// What the retry loop leaves behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySummary {
    pub outcome: RunOutcome,
    pub rounds_executed: u32,
    /// Items still unresolved when the loop stopped
    pub unresolved: Vec<VendorId>,
}

/// Drives the scan engine through the initial round and its retries
pub struct RetryRoundController {
    policy: RoundPolicy,
}

impl RetryRoundController {
    pub fn new(policy: RoundPolicy) -> Self {
        Self { policy }
    }

    /// Run rounds until the queue drains, a round aborts, or retries run out
    pub async fn run(&self, engine: &mut ScanEngine, candidates: Vec<VendorId>) -> RetrySummary {
        let mut queue = candidates;
        let mut rounds_executed = 0;

        for attempt in 0..=self.policy.max_retry_rounds {
            if queue.is_empty() {
                break;
            }

            let tag = RoundTag::for_attempt(attempt);
            if attempt > 0 {
                if engine.budget_exhausted() {
                    info!(round = %tag, pending = queue.len(), "Run budget exhausted before retry round");
                    return RetrySummary {
                        outcome: RunOutcome::BudgetExhausted,
                        rounds_executed,
                        unresolved: queue,
                    };
                }
                info!(round = %tag, pending = queue.len(), "Starting retry round");
                if !self.policy.pause.is_zero() {
                    tokio::time::sleep(self.policy.pause).await;
                }
            }

            let result = engine.run_round(tag, &queue).await;
            rounds_executed += 1;
            queue = result.failures;

            let stopped = match result.stop {
                RoundStop::Completed => None,
                RoundStop::BudgetExhausted => Some(RunOutcome::BudgetExhausted),
                RoundStop::ErrorLimit => Some(RunOutcome::ErrorLimit),
            };
            if let Some(outcome) = stopped {
                return RetrySummary {
                    outcome,
                    rounds_executed,
                    unresolved: queue,
                };
            }
        }

        let outcome = if queue.is_empty() {
            RunOutcome::Completed
        } else {
            RunOutcome::RetriesExhausted
        };

        RetrySummary {
            outcome,
            rounds_executed,
            unresolved: queue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_tag_display() {
        assert_eq!(RoundTag::Initial.to_string(), "initial");
        assert_eq!(RoundTag::Retry(2).to_string(), "retry-2");
        assert_eq!(RoundTag::for_attempt(0), RoundTag::Initial);
        assert_eq!(RoundTag::for_attempt(3), RoundTag::Retry(3));
    }

    #[test]
    fn test_default_policy() {
        let policy = RoundPolicy::default();
        assert_eq!(policy.max_retry_rounds, 3);
        assert_eq!(policy.pause, Duration::from_secs(5));
    }
}
