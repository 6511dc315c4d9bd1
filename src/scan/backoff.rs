//! Error backoff and abort decisions
//!
//! After every item the engine asks the controller how long to wait. A
//! transient error sleeps in a tier picked by the run's consecutive-error
//! streak; any other outcome only gets the short pacing delay. Once the
//! streak reaches the configured limit the round is aborted instead.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::BackoffConfig;
use crate::models::ScanOutcome;

/// Inclusive random delay range in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayWindow {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Window between two whole-second bounds
    pub const fn secs(min: u64, max: u64) -> Self {
        Self {
            min_ms: min * 1000,
            max_ms: max * 1000,
        }
    }

    /// A window that never sleeps
    pub const fn zero() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    /// Whether the bounds are ordered
    pub fn is_valid(&self) -> bool {
        self.min_ms <= self.max_ms
    }

    /// Draw a delay uniformly from the window
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }
}

/// What the engine does after an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Sleep for the given duration, then move on
    Continue(Duration),
    /// Stop the round; the streak hit the limit
    Abort,
}

/// Tiered backoff over the run-level error streak
pub struct BackoffController {
    tiers: Vec<DelayWindow>,
    pacing: DelayWindow,
    max_consecutive_errors: u32,
    rng: ChaCha8Rng,
}

impl BackoffController {
    /// Create a controller; a seed makes the jitter reproducible
    pub fn new(config: &BackoffConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            tiers: config.tiers.clone(),
            pacing: config.pacing,
            max_consecutive_errors: config.max_consecutive_errors,
            rng,
        }
    }

    /// Streak at which a round is aborted
    pub fn max_consecutive_errors(&self) -> u32 {
        self.max_consecutive_errors
    }

    /// Window used for a given streak; streaks past the last tier stay there
    pub fn tier_for(&self, streak: u32) -> DelayWindow {
        if streak == 0 || self.tiers.is_empty() {
            return DelayWindow::zero();
        }
        let index = (streak as usize - 1).min(self.tiers.len() - 1);
        self.tiers[index]
    }

    /// Decide what follows an item, given the streak after that item
    ///
    /// The abort check comes first, so the item that trips the limit does
    /// not sleep before the round stops.
    pub fn decide(&mut self, outcome: &ScanOutcome, streak: u32) -> BackoffDecision {
        if outcome.is_transient() {
            if streak >= self.max_consecutive_errors {
                return BackoffDecision::Abort;
            }
            let delay = self.tier_for(streak).sample(&mut self.rng);
            debug!(streak, delay_ms = delay.as_millis() as u64, "Backing off after error");
            BackoffDecision::Continue(delay)
        } else {
            BackoffDecision::Continue(self.pacing.sample(&mut self.rng))
        }
    }

    /// Sleep for a decided delay
    pub async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
