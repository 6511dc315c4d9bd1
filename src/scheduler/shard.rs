//! Time-based shard selection
//!
//! The day is cut into fixed-width slices on the business clock (UTC+8).
//! Every worker started inside the same slice derives the same shard index
//! and fetches the same candidate set, without talking to any other worker.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Timelike, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::VendorId;
use crate::store::{CandidateStore, StoreFailurePolicy};
use crate::utils::error::StoreError;

/// Offset of the business clock from UTC, in seconds
pub const BUSINESS_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Default slice width in minutes
pub const DEFAULT_SLICE_MINUTES: u32 = 30;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// The fixed UTC+8 offset every shard and report date is computed in
pub fn business_offset() -> FixedOffset {
    FixedOffset::east_opt(BUSINESS_UTC_OFFSET_SECS).expect("UTC+8 is a valid offset")
}

/// Current time on the business clock, independent of the host timezone
pub fn business_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&business_offset())
}

/// Slice index for a wall-clock time
///
/// With the default 30-minute width this is `hour * 2 + (minute >= 30)`.
pub fn slice_index(hour: u32, minute: u32, slice_minutes: u32) -> u32 {
    (hour * 60 + minute) / slice_minutes.max(1)
}

/// Number of slices in a day for a given width
pub fn slices_per_day(slice_minutes: u32) -> u32 {
    MINUTES_PER_DAY / slice_minutes.max(1)
}

/// Whole minutes already elapsed in the current slice
pub fn minutes_into_slice(minute: u32, slice_minutes: u32) -> u32 {
    minute % slice_minutes.max(1)
}

/// Whether a slice width tiles an hour exactly
pub fn is_valid_slice_width(slice_minutes: u32) -> bool {
    slice_minutes > 0 && 60 % slice_minutes == 0
}

/// Run budget left after subtracting the minutes already spent in the slice
///
/// A worker started late in its slice stops before the next slice begins.
pub fn adjusted_budget(run_minutes: u32, now: DateTime<FixedOffset>, slice_minutes: u32) -> Duration {
    let elapsed = minutes_into_slice(now.minute(), slice_minutes);
    let remaining = run_minutes.saturating_sub(elapsed);
    Duration::from_secs(u64::from(remaining) * 60)
}

/// One time window of the day and its position among the store's slices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Shard {
    /// Slice index derived from the wall clock
    pub index: u32,
    /// Number of slices the candidate store splits its data into
    pub total_slices: u32,
    /// First instant of the window
    pub window_start: DateTime<FixedOffset>,
    /// First instant after the window
    pub window_end: DateTime<FixedOffset>,
}

impl Shard {
    /// Derive the shard containing `now`
    pub fn at(now: DateTime<FixedOffset>, slice_minutes: u32, total_slices: u32) -> Self {
        let width = slice_minutes.max(1);
        let into_slice = minutes_into_slice(now.minute(), width);
        let window_start = now
            - ChronoDuration::minutes(i64::from(into_slice))
            - ChronoDuration::seconds(i64::from(now.second()))
            - ChronoDuration::nanoseconds(i64::from(now.nanosecond()));

        Self {
            index: slice_index(now.hour(), now.minute(), width),
            total_slices,
            window_start,
            window_end: window_start + ChronoDuration::minutes(i64::from(width)),
        }
    }

    /// Whether the store actually has a slice with this index
    pub fn is_addressable(&self) -> bool {
        self.index < self.total_slices
    }
}

/// Everything a worker needs before it starts scanning
#[derive(Debug, Clone)]
pub struct ShardPlan {
    /// Shard derived from the start time
    pub shard: Shard,
    /// Full candidate set of the shard, before partitioning
    pub candidates: Vec<VendorId>,
    /// Run budget after the late-start correction
    pub budget: Duration,
}

/// Derives the current shard and fetches its candidates
pub struct ShardScheduler {
    store: Arc<dyn CandidateStore>,
    slice_minutes: u32,
    total_slices: u32,
    run_minutes: u32,
    failure_policy: StoreFailurePolicy,
}

impl ShardScheduler {
    /// Create a scheduler over a candidate store
    pub fn new(store: Arc<dyn CandidateStore>, slice_minutes: u32, total_slices: u32, run_minutes: u32) -> Self {
        Self {
            store,
            slice_minutes,
            total_slices,
            run_minutes,
            failure_policy: StoreFailurePolicy::default(),
        }
    }

    /// Choose how store failures surface
    pub fn with_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Plan the shard for the current business-clock time
    pub async fn plan(&self) -> Result<ShardPlan, StoreError> {
        self.plan_at(business_now()).await
    }

    /// Plan the shard containing `now`
    ///
    /// With [`StoreFailurePolicy::Empty`] a store failure yields an empty
    /// candidate set, indistinguishable from an empty shard.
    pub async fn plan_at(&self, now: DateTime<FixedOffset>) -> Result<ShardPlan, StoreError> {
        let shard = Shard::at(now, self.slice_minutes, self.total_slices);
        if !shard.is_addressable() {
            warn!(
                slice = shard.index,
                total_slices = shard.total_slices,
                "Slice index is outside the store's slice range"
            );
        }

        let fetched = self.store.fetch(shard.index, shard.total_slices).await;
        let candidates = self.failure_policy.apply(fetched, "candidate fetch")?;

        let budget = adjusted_budget(self.run_minutes, now, self.slice_minutes);
        info!(
            slice = shard.index,
            window_start = %shard.window_start.format("%H:%M"),
            candidates = candidates.len(),
            late_minutes = minutes_into_slice(now.minute(), self.slice_minutes),
            budget_minutes = budget.as_secs() / 60,
            "Shard planned"
        );

        Ok(ShardPlan {
            shard,
            candidates,
            budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<FixedOffset> {
        business_offset()
            .with_ymd_and_hms(2024, 5, 20, hour, minute, second)
            .unwrap()
    }

    #[test]
    fn test_half_hour_slice_index() {
        assert_eq!(slice_index(0, 0, 30), 0);
        assert_eq!(slice_index(0, 29, 30), 0);
        assert_eq!(slice_index(0, 30, 30), 1);
        assert_eq!(slice_index(13, 45, 30), 27);
        assert_eq!(slice_index(23, 59, 30), 47);
    }

    #[test]
    fn test_hour_slice_index() {
        assert_eq!(slice_index(13, 45, 60), 13);
        assert_eq!(slices_per_day(60), 24);
        assert_eq!(slices_per_day(30), 48);
    }

    #[test]
    fn test_slice_width_validation() {
        assert!(is_valid_slice_width(30));
        assert!(is_valid_slice_width(60));
        assert!(is_valid_slice_width(15));
        assert!(!is_valid_slice_width(0));
        assert!(!is_valid_slice_width(45));
        assert!(!is_valid_slice_width(90));
    }

    #[test]
    fn test_adjusted_budget() {
        assert_eq!(adjusted_budget(10, at(9, 30, 0), 30), Duration::from_secs(600));
        assert_eq!(adjusted_budget(10, at(9, 34, 59), 30), Duration::from_secs(360));
        assert_eq!(adjusted_budget(10, at(9, 4, 0), 30), Duration::from_secs(360));
        // Started too late: nothing left
        assert_eq!(adjusted_budget(10, at(9, 52, 0), 30), Duration::ZERO);
        assert_eq!(adjusted_budget(25, at(9, 52, 0), 60), Duration::ZERO);
    }

    #[test]
    fn test_shard_window() {
        let shard = Shard::at(at(14, 47, 12), 30, 48);
        assert_eq!(shard.index, 29);
        assert_eq!(shard.window_start, at(14, 30, 0));
        assert_eq!(shard.window_end, at(15, 0, 0));
        assert!(shard.is_addressable());
    }

    #[test]
    fn test_shard_outside_store_range() {
        let shard = Shard::at(at(23, 40, 0), 30, 46);
        assert_eq!(shard.index, 47);
        assert!(!shard.is_addressable());
    }

    #[test]
    fn test_business_now_uses_fixed_offset() {
        let now = business_now();
        assert_eq!(now.offset().local_minus_utc(), BUSINESS_UTC_OFFSET_SECS);
    }
}
