//! Daily token report
//!
//! Compares yesterday's and today's token records (business dates on the
//! UTC+8 clock) and estimates how many shard batches have run today from the
//! capture time of the latest record.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDateTime, Timelike};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::models::{TokenRecord, CAPTURE_TIME_FORMAT};
use crate::scheduler::shard::{business_now, slice_index};
use crate::store::{StoreFailurePolicy, TokenStore};
use crate::utils::error::StoreError;

const CAPTURE_TIME_FORMAT_SHORT: &str = "%Y/%m/%d %H:%M";

/// Token store date key (`MM_DD`)
pub fn business_date_key(at: DateTime<FixedOffset>) -> String {
    at.format("%m_%d").to_string()
}

/// Number of distinct tokens seen today but not yesterday
///
/// Records without a token are ignored.
pub fn new_token_count(yesterday: &[TokenRecord], today: &[TokenRecord]) -> usize {
    let seen: HashSet<&str> = yesterday
        .iter()
        .map(|r| r.token.as_str())
        .filter(|t| !t.is_empty())
        .collect();

    today
        .iter()
        .map(|r| r.token.as_str())
        .filter(|t| !t.is_empty() && !seen.contains(t))
        .collect::<HashSet<_>>()
        .len()
}

/// Parse a capture timestamp with or without seconds
pub fn parse_capture_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, CAPTURE_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, CAPTURE_TIME_FORMAT_SHORT))
        .ok()
}

/// One-based batch number of the slice a capture time falls into
pub fn batch_from_timestamp(raw: &str, slice_minutes: u32) -> Option<u32> {
    parse_capture_time(raw).map(|at| slice_index(at.hour(), at.minute(), slice_minutes) + 1)
}

/// How far today's batches have progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchProgress {
    /// No records today
    NoRecords,
    /// Latest record has an unreadable timestamp
    Pending,
    /// Batch number of the latest record
    Batch(u32),
}

impl BatchProgress {
    /// Progress derived from the last record of today's list
    pub fn from_records(today: &[TokenRecord], slice_minutes: u32) -> Self {
        match today.last() {
            None => Self::NoRecords,
            Some(last) => match batch_from_timestamp(&last.captured_at, slice_minutes) {
                Some(batch) => Self::Batch(batch),
                None => Self::Pending,
            },
        }
    }
}

impl fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRecords => write!(f, "0"),
            Self::Pending => write!(f, "pending"),
            Self::Batch(n) => write!(f, "{n}"),
        }
    }
}

/// The numbers that go into one report message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReport {
    pub generated_at: DateTime<FixedOffset>,
    pub yesterday_total: usize,
    pub today_total: usize,
    pub new_tokens: usize,
    pub progress: BatchProgress,
    pub total_slices: u32,
}

impl DailyReport {
    /// Assemble a report from the two record sets
    pub fn from_records(
        generated_at: DateTime<FixedOffset>,
        yesterday: &[TokenRecord],
        today: &[TokenRecord],
        slice_minutes: u32,
        total_slices: u32,
    ) -> Self {
        Self {
            generated_at,
            yesterday_total: yesterday.len(),
            today_total: today.len(),
            new_tokens: new_token_count(yesterday, today),
            progress: BatchProgress::from_records(today, slice_minutes),
            total_slices,
        }
    }

    /// Markdown message for the notifier
    pub fn render(&self) -> String {
        let mut msg = String::from("📊 *Vendor scan daily report*\n");
        msg.push_str("---");
        msg.push_str(&format!(
            "\n⏰ *Report time*: `{}`",
            self.generated_at.format("%H:%M:%S")
        ));
        msg.push_str(&format!("\n📅 *Tokens yesterday*: `{}`", self.yesterday_total));
        msg.push_str(&format!("\n📅 *Tokens today*: `{}`", self.today_total));
        msg.push_str(&format!("\n✨ *New today*: `+{}`", self.new_tokens));
        msg.push_str("\n---");
        msg.push_str(&format!(
            "\n🔢 *Progress*: `{}/{}` batches",
            self.progress, self.total_slices
        ));
        msg
    }
}

/// Pulls the two days of records and builds the report
pub struct DailyReporter {
    store: Arc<dyn TokenStore>,
    failure_policy: StoreFailurePolicy,
    slice_minutes: u32,
    total_slices: u32,
}

impl DailyReporter {
    pub fn new(store: Arc<dyn TokenStore>, slice_minutes: u32, total_slices: u32) -> Self {
        Self {
            store,
            failure_policy: StoreFailurePolicy::default(),
            slice_minutes,
            total_slices,
        }
    }

    /// Choose how query failures surface
    pub fn with_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Build the report for the current business-clock time
    pub async fn build(&self) -> Result<DailyReport, StoreError> {
        self.build_at(business_now()).await
    }

    /// Build the report as of `now`
    pub async fn build_at(&self, now: DateTime<FixedOffset>) -> Result<DailyReport, StoreError> {
        let today_key = business_date_key(now);
        let yesterday_key = business_date_key(now - ChronoDuration::days(1));

        let yesterday = self
            .failure_policy
            .apply(self.store.query(&yesterday_key).await, "token query (yesterday)")?;
        let today = self
            .failure_policy
            .apply(self.store.query(&today_key).await, "token query (today)")?;

        let report = DailyReport::from_records(
            now,
            &yesterday,
            &today,
            self.slice_minutes,
            self.total_slices,
        );
        info!(
            yesterday = %yesterday_key,
            today = %today_key,
            yesterday_total = report.yesterday_total,
            today_total = report.today_total,
            new_tokens = report.new_tokens,
            progress = %report.progress,
            "Daily report built"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::shard::business_offset;
    use chrono::TimeZone;

    fn record(token: &str, ts: &str) -> TokenRecord {
        TokenRecord {
            vendor_id: format!("v-{token}"),
            token: token.to_string(),
            captured_at: ts.to_string(),
        }
    }

    fn tokens(list: &[&str]) -> Vec<TokenRecord> {
        list.iter().map(|t| record(t, "")).collect()
    }

    #[test]
    fn test_new_token_count() {
        let yesterday = tokens(&["A", "B", "C"]);
        let today = tokens(&["B", "C", "D", "E"]);
        assert_eq!(new_token_count(&yesterday, &today), 2);
    }

    #[test]
    fn test_new_token_count_ignores_duplicates_and_blanks() {
        let yesterday = tokens(&["A"]);
        let today = tokens(&["D", "D", "", "A"]);
        assert_eq!(new_token_count(&yesterday, &today), 1);
    }

    #[test]
    fn test_batch_from_timestamp() {
        assert_eq!(batch_from_timestamp("2024/05/20 00:10:00", 30), Some(1));
        assert_eq!(batch_from_timestamp("2024/05/20 13:45:09", 30), Some(28));
        assert_eq!(batch_from_timestamp("2024/05/20 13:45", 30), Some(28));
        assert_eq!(batch_from_timestamp("2024/05/20 23:59:59", 30), Some(48));
        assert_eq!(batch_from_timestamp("yesterday-ish", 30), None);
    }

    #[test]
    fn test_progress() {
        assert_eq!(BatchProgress::from_records(&[], 30), BatchProgress::NoRecords);
        assert_eq!(
            BatchProgress::from_records(&[record("a", "garbage")], 30),
            BatchProgress::Pending
        );
        assert_eq!(
            BatchProgress::from_records(
                &[record("a", "2024/05/20 01:00:00"), record("b", "2024/05/20 09:31:00")],
                30
            ),
            BatchProgress::Batch(20)
        );
        assert_eq!(BatchProgress::NoRecords.to_string(), "0");
        assert_eq!(BatchProgress::Pending.to_string(), "pending");
    }

    #[test]
    fn test_render() {
        let now = business_offset()
            .with_ymd_and_hms(2024, 5, 20, 10, 2, 3)
            .unwrap();
        let report = DailyReport::from_records(
            now,
            &tokens(&["A", "B", "C"]),
            &[record("B", "2024/05/20 09:40:00"), record("D", "2024/05/20 09:41:00")],
            30,
            48,
        );

        let text = report.render();
        assert!(text.contains("`10:02:03`"));
        assert!(text.contains("*Tokens yesterday*: `3`"));
        assert!(text.contains("*Tokens today*: `2`"));
        assert!(text.contains("`+1`"));
        assert!(text.contains("`20/48` batches"));
    }

    #[test]
    fn test_date_key() {
        let at = business_offset().with_ymd_and_hms(2024, 3, 1, 0, 5, 0).unwrap();
        assert_eq!(business_date_key(at), "03_01");
        assert_eq!(business_date_key(at - ChronoDuration::days(1)), "02_29");
    }
}
