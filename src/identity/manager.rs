//! Identity lifecycle and rotation
//!
//! The scan engine owns exactly one [`IdentityManager`], which owns at most
//! one live [`Identity`]. Identities are never shared or reused after being
//! discarded; a rotation drops the whole session (cookies included) and the
//! next item gets a freshly sampled fingerprint.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use super::catalog::{sample_profile, FingerprintProfile};
use crate::models::ScanOutcome;
use crate::scan::probe::{Probe, Session};
use crate::utils::error::FetchError;
use crate::utils::truncate_text;

/// How long an identity lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RotationStrategy {
    /// New identity before every probe, discarded right after it
    FreshPerItem,
    /// One identity for a random number of items in `[min_items, max_items]`,
    /// rotated early once its error streak reaches `error_threshold`
    PooledWithRotation {
        min_items: u32,
        max_items: u32,
        error_threshold: u32,
    },
}

impl RotationStrategy {
    /// Pooled strategy with the usual thresholds (20-30 items, 3 errors)
    pub fn pooled_default() -> Self {
        Self::PooledWithRotation {
            min_items: 20,
            max_items: 30,
            error_threshold: 3,
        }
    }

    /// Short label for logs and CLI
    pub fn label(&self) -> &'static str {
        match self {
            Self::FreshPerItem => "fresh",
            Self::PooledWithRotation { .. } => "pooled",
        }
    }
}

impl Default for RotationStrategy {
    fn default() -> Self {
        Self::FreshPerItem
    }
}

/// Why an identity was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    /// Fresh-per-item strategy tears down after every probe
    PerItem,
    /// Item budget for a pooled identity used up
    ItemBudget,
    /// Identity-local error streak hit the threshold
    ErrorStreak,
}

impl fmt::Display for RotationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PerItem => "per-item",
            Self::ItemBudget => "item budget reached",
            Self::ErrorStreak => "error streak",
        };
        write!(f, "{label}")
    }
}

/// A simulated client: fingerprint plus its transient session
#[derive(Debug)]
pub struct Identity {
    /// Sequence number within the run, starting at 1
    pub serial: u64,
    pub profile: FingerprintProfile,
    pub session: Session,
    /// Probes issued with this identity
    pub items_served: u32,
    /// Consecutive transient errors seen by this identity
    pub error_streak: u32,
    /// Items this identity may serve before rotating
    pub item_budget: u32,
}

impl Identity {
    /// Update identity-local counters after a probe
    pub fn record(&mut self, outcome: &ScanOutcome) {
        self.items_served += 1;
        if outcome.is_transient() {
            self.error_streak += 1;
        } else {
            self.error_streak = 0;
        }
    }
}

/// Owns the current identity and decides when to rotate it
pub struct IdentityManager {
    strategy: RotationStrategy,
    warm_up: bool,
    rng: ChaCha8Rng,
    current: Option<Identity>,
    opened: u64,
}

impl IdentityManager {
    /// Create a manager; a seed makes fingerprint selection reproducible
    pub fn new(strategy: RotationStrategy, warm_up: bool, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            strategy,
            warm_up,
            rng,
            current: None,
            opened: 0,
        }
    }

    /// The configured strategy
    pub fn strategy(&self) -> RotationStrategy {
        self.strategy
    }

    /// The live identity, if any
    pub fn current(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    /// Identities opened so far
    pub fn opened(&self) -> u64 {
        self.opened
    }

    /// Return the live identity, opening a new one if none is active
    pub async fn acquire(&mut self, probe: &dyn Probe) -> Result<&Identity, FetchError> {
        if self.current.is_none() {
            let identity = self.open(probe).await?;
            self.current = Some(identity);
        }

        self.current
            .as_ref()
            .ok_or_else(|| FetchError::Session("no active identity".to_string()))
    }

    /// Record an item's outcome and rotate if the strategy says so
    pub fn complete_item(&mut self, outcome: &ScanOutcome) -> Option<RotationReason> {
        let identity = self.current.as_mut()?;
        identity.record(outcome);

        let reason = match self.strategy {
            RotationStrategy::FreshPerItem => Some(RotationReason::PerItem),
            RotationStrategy::PooledWithRotation {
                error_threshold, ..
            } => {
                if identity.error_streak >= error_threshold {
                    Some(RotationReason::ErrorStreak)
                } else if identity.items_served >= identity.item_budget {
                    Some(RotationReason::ItemBudget)
                } else {
                    None
                }
            }
        };

        if let Some(reason) = reason {
            debug!(
                identity = identity.serial,
                items = identity.items_served,
                reason = %reason,
                "Discarding identity"
            );
            self.current = None;
        }

        reason
    }

    /// Drop the live identity without recording anything
    pub fn discard(&mut self) {
        self.current = None;
    }

    async fn open(&mut self, probe: &dyn Probe) -> Result<Identity, FetchError> {
        let profile = sample_profile(&mut self.rng);
        let item_budget = match self.strategy {
            RotationStrategy::FreshPerItem => 1,
            RotationStrategy::PooledWithRotation {
                min_items,
                max_items,
                ..
            } => self.rng.gen_range(min_items..=max_items.max(min_items)),
        };

        let session = probe.open_session(&profile)?;

        if self.warm_up {
            if let Err(e) = probe.warm_up(&session).await {
                debug!(error = %e, "Warm-up navigation failed, continuing");
            }
        }

        self.opened += 1;
        let identity = Identity {
            serial: self.opened,
            profile,
            session,
            items_served: 0,
            error_streak: 0,
            item_budget,
        };

        if matches!(self.strategy, RotationStrategy::PooledWithRotation { .. }) {
            info!(
                identity = identity.serial,
                device = identity.profile.device,
                user_agent = %truncate_text(&identity.profile.user_agent, 50),
                item_budget = identity.item_budget,
                "Opened new identity"
            );
        } else {
            debug!(
                identity = identity.serial,
                device = identity.profile.device,
                "Opened new identity"
            );
        }

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::probe::ProbeResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingProbe {
        warm_ups: AtomicU32,
    }

    #[async_trait]
    impl Probe for CountingProbe {
        fn open_session(&self, profile: &FingerprintProfile) -> Result<Session, FetchError> {
            Session::new(&profile.user_agent, std::time::Duration::from_secs(1), None)
        }

        async fn warm_up(&self, _session: &Session) -> Result<(), FetchError> {
            self.warm_ups.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Timeout)
        }

        async fn probe(&self, _session: &Session, _vendor_id: &str) -> Result<ProbeResponse, FetchError> {
            Err(FetchError::Timeout)
        }
    }

    fn transient() -> ScanOutcome {
        ScanOutcome::TransientError {
            reason: "timeout".into(),
        }
    }

    #[tokio::test]
    async fn test_fresh_per_item_rotates_every_item() {
        let probe = CountingProbe::default();
        let mut manager = IdentityManager::new(RotationStrategy::FreshPerItem, false, Some(1));

        for i in 1..=3 {
            let serial = manager.acquire(&probe).await.unwrap().serial;
            assert_eq!(serial, i);
            assert_eq!(
                manager.complete_item(&ScanOutcome::NoMatch),
                Some(RotationReason::PerItem)
            );
            assert!(manager.current().is_none());
        }
        assert_eq!(manager.opened(), 3);
        assert_eq!(probe.warm_ups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pooled_rotates_on_item_budget() {
        let probe = CountingProbe::default();
        let strategy = RotationStrategy::PooledWithRotation {
            min_items: 4,
            max_items: 4,
            error_threshold: 3,
        };
        let mut manager = IdentityManager::new(strategy, true, Some(2));

        for _ in 0..3 {
            manager.acquire(&probe).await.unwrap();
            assert_eq!(manager.complete_item(&ScanOutcome::NoMatch), None);
        }
        manager.acquire(&probe).await.unwrap();
        assert_eq!(
            manager.complete_item(&ScanOutcome::NoMatch),
            Some(RotationReason::ItemBudget)
        );
        assert_eq!(manager.opened(), 1);
        // Failed warm-up is ignored
        assert_eq!(probe.warm_ups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pooled_rotates_on_error_streak() {
        let probe = CountingProbe::default();
        let strategy = RotationStrategy::PooledWithRotation {
            min_items: 20,
            max_items: 30,
            error_threshold: 3,
        };
        let mut manager = IdentityManager::new(strategy, false, Some(3));

        manager.acquire(&probe).await.unwrap();
        assert_eq!(manager.complete_item(&transient()), None);
        assert_eq!(manager.complete_item(&ScanOutcome::NoMatch), None);
        assert_eq!(manager.current().unwrap().error_streak, 0);

        assert_eq!(manager.complete_item(&transient()), None);
        assert_eq!(manager.complete_item(&transient()), None);
        assert_eq!(
            manager.complete_item(&transient()),
            Some(RotationReason::ErrorStreak)
        );

        let next = manager.acquire(&probe).await.unwrap();
        assert_eq!(next.serial, 2);
        assert_eq!(next.error_streak, 0);
        assert_eq!(next.items_served, 0);
    }

    #[tokio::test]
    async fn test_pooled_budget_within_range() {
        let probe = CountingProbe::default();
        let mut manager = IdentityManager::new(RotationStrategy::pooled_default(), false, Some(9));

        for _ in 0..20 {
            let budget = manager.acquire(&probe).await.unwrap().item_budget;
            assert!((20..=30).contains(&budget));
            manager.discard();
        }
    }

    #[test]
    fn test_strategy_serde() {
        let json = serde_json::to_string(&RotationStrategy::pooled_default()).unwrap();
        assert!(json.contains("pooled_with_rotation"));
        let back: RotationStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RotationStrategy::pooled_default());
    }
}
