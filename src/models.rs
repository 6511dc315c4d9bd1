// Core data structures for the vidscan scanner

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque vendor identifier supplied by the candidate store
pub type VendorId = String;

/// Capture timestamp format used by the token store (`YYYY/MM/DD HH:MM:SS`)
pub const CAPTURE_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Result of probing a single vendor id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Activation signature found and a token extracted
    Matched { token: String },
    /// Business success without the activation signature
    NoMatch,
    /// Transport failure, timeout, or non-zero business code
    TransientError { reason: String },
    /// Signature matched but no token could be extracted
    ParseError { reason: String },
}

impl ScanOutcome {
    /// Whether this outcome counts toward the consecutive-error streak
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientError { .. })
    }

    /// Whether the probe reached business success (`code == "0"`)
    pub fn is_business_success(&self) -> bool {
        !self.is_transient()
    }

    /// Short label for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Matched { .. } => "matched",
            Self::NoMatch => "no_match",
            Self::TransientError { .. } => "transient_error",
            Self::ParseError { .. } => "parse_error",
        }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched { token } => write!(f, "matched (token={token})"),
            Self::NoMatch => write!(f, "no match"),
            Self::TransientError { reason } => write!(f, "transient error: {reason}"),
            Self::ParseError { reason } => write!(f, "parse error: {reason}"),
        }
    }
}

/// Per-run counters, updated only by the scan engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Probes attempted
    pub scanned: u64,
    /// Probes that reached business success
    pub success: u64,
    /// Probes that produced a token
    pub matched: u64,
    /// Probes without the activation signature
    pub no_match: u64,
    /// Transport/business failures
    pub transient_errors: u64,
    /// Signature matched without an extractable token
    pub parse_errors: u64,
    /// Browsing identities opened during the run
    pub identities_opened: u64,
    /// Token uploads acknowledged by the store
    pub uploads_ok: u64,
    /// Token uploads that failed after retries
    pub uploads_failed: u64,
}

impl RunStats {
    /// Count one probe outcome
    pub fn record(&mut self, outcome: &ScanOutcome) {
        self.scanned += 1;
        if outcome.is_business_success() {
            self.success += 1;
        }
        match outcome {
            ScanOutcome::Matched { .. } => self.matched += 1,
            ScanOutcome::NoMatch => self.no_match += 1,
            ScanOutcome::TransientError { .. } => self.transient_errors += 1,
            ScanOutcome::ParseError { .. } => self.parse_errors += 1,
        }
    }
}

/// A captured token as stored in the token store
///
/// Query results are parsed leniently: a missing, null or non-text field
/// loads as empty (numbers as their decimal text) so one bad record never
/// discards the rest of the day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(rename = "vender", alias = "vid", default, deserialize_with = "lenient_string")]
    pub vendor_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub token: String,
    #[serde(rename = "ts_bj", default, deserialize_with = "lenient_string")]
    pub captured_at: String,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

impl TokenRecord {
    /// Build a record stamped with the given business-clock time
    pub fn captured(
        vendor_id: impl Into<String>,
        token: impl Into<String>,
        at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            vendor_id: vendor_id.into(),
            token: token.into(),
            captured_at: at.format(CAPTURE_TIME_FORMAT).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_stats_record() {
        let mut stats = RunStats::default();
        stats.record(&ScanOutcome::Matched {
            token: "abc".into(),
        });
        stats.record(&ScanOutcome::NoMatch);
        stats.record(&ScanOutcome::TransientError {
            reason: "timeout".into(),
        });
        stats.record(&ScanOutcome::ParseError {
            reason: "no token".into(),
        });

        assert_eq!(stats.scanned, 4);
        assert_eq!(stats.success, 3);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.no_match, 1);
        assert_eq!(stats.transient_errors, 1);
        assert_eq!(stats.parse_errors, 1);
    }

    #[test]
    fn test_token_record_serialization() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let at = offset.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let record = TokenRecord::captured("1000123", "tok", at);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["vender"], "1000123");
        assert_eq!(json["token"], "tok");
        assert_eq!(json["ts_bj"], "2024/03/09 14:05:07");
    }

    #[test]
    fn test_token_record_lenient_parse() {
        let record: TokenRecord = serde_json::from_str(r#"{"vid": "42", "token": "t"}"#).unwrap();
        assert_eq!(record.vendor_id, "42");
        assert!(record.captured_at.is_empty());
    }

    #[test]
    fn test_token_record_null_and_numeric_fields() {
        let records: Vec<TokenRecord> = serde_json::from_str(
            r#"[
                {"vender": "1", "token": "A", "ts_bj": "2024/05/20 01:00:00"},
                {"vender": 2, "token": null, "ts_bj": null}
            ]"#,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].vendor_id, "2");
        assert!(records[1].token.is_empty());
        assert!(records[1].captured_at.is_empty());
    }

    #[test]
    fn test_outcome_kind() {
        assert_eq!(ScanOutcome::NoMatch.kind(), "no_match");
        assert!(ScanOutcome::TransientError { reason: "x".into() }.is_transient());
        assert!(!ScanOutcome::ParseError { reason: "x".into() }.is_transient());
    }
}
