//! Tests for time-based shard selection

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

use vidscan::scheduler::{adjusted_budget, business_offset, slice_index, Shard};

fn business(hour: u32, minute: u32) -> DateTime<FixedOffset> {
    business_offset()
        .with_ymd_and_hms(2024, 5, 20, hour, minute, 0)
        .unwrap()
}

#[test]
fn test_every_half_hour_of_a_day() {
    let start = business(0, 0);
    let indices: Vec<u32> = (0..48)
        .map(|i| Shard::at(start + ChronoDuration::minutes(30 * i), 30, 48).index)
        .collect();

    assert_eq!(indices, (0..48).collect::<Vec<_>>());
    assert_eq!(indices.iter().collect::<HashSet<_>>().len(), 48);
}

#[test]
fn test_shard_uses_business_clock() {
    // 05:45 UTC is 13:45 on the business clock
    let utc = Utc.with_ymd_and_hms(2024, 5, 20, 5, 45, 0).unwrap();
    let shard = Shard::at(utc.with_timezone(&business_offset()), 30, 48);

    assert_eq!(shard.index, 27);
    assert_eq!(shard.window_start, business(13, 30));
    assert_eq!(shard.window_end, business(14, 0));
}

#[test]
fn test_hour_wide_slices() {
    assert_eq!(Shard::at(business(13, 45), 60, 24).index, 13);
    assert!(!Shard::at(business(13, 45), 30, 24).is_addressable());
}

#[test]
fn test_late_start_budget() {
    assert_eq!(adjusted_budget(10, business(13, 37), 30), Duration::from_secs(180));
    assert_eq!(adjusted_budget(10, business(13, 30), 30), Duration::from_secs(600));
    assert_eq!(adjusted_budget(10, business(13, 55), 30), Duration::ZERO);
}

proptest! {
    #[test]
    fn prop_index_is_deterministic_within_window(hour in 0u32..24, minute in 0u32..60, second in 0u32..60) {
        let now = business_offset().with_ymd_and_hms(2024, 5, 20, hour, minute, second).unwrap();
        let shard = Shard::at(now, 30, 48);

        prop_assert!(shard.index < 48);
        prop_assert!(shard.window_start <= now && now < shard.window_end);
        prop_assert_eq!(Shard::at(shard.window_start, 30, 48), shard);
        prop_assert_eq!(shard.index, slice_index(hour, minute, 30));
    }

    #[test]
    fn prop_index_is_monotonic(a in 0u32..1440, b in 0u32..1440) {
        let (early, late) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            slice_index(early / 60, early % 60, 30) <= slice_index(late / 60, late % 60, 30)
        );
    }
}
