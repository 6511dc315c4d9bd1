//! Tests for config loading from files and the environment

use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

use vidscan::config::{Config, Variant};
use vidscan::identity::RotationStrategy;
use vidscan::scan::ParseErrorPolicy;
use vidscan::scheduler::HalfSelector;
use vidscan::store::StoreFailurePolicy;

const ENV_KEYS: &[&str] = &[
    "VIDSCAN_VARIANT",
    "VIDSCAN_API_KEY",
    "VIDSCAN_CANDIDATE_URL",
    "VIDSCAN_TOKEN_URL",
    "VIDSCAN_TARGET_PATTERN",
    "VIDSCAN_TOTAL_WORKERS",
    "VIDSCAN_WORKER_ORDINAL",
    "VIDSCAN_HALF",
    "VIDSCAN_RUN_MINUTES",
    "VIDSCAN_PARSE_ERROR_POLICY",
    "VIDSCAN_STORE_FAILURE_POLICY",
    "VIDSCAN_MAX_CONSECUTIVE_ERRORS",
    "VIDSCAN_LOG_LEVEL",
    "VIDSCAN_LOG_FORMAT",
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHAT_ID",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// ============================================================================
// File loading
// ============================================================================

#[test]
fn test_from_file_partial_sections() {
    let file = write_config(
        r#"
[stores]
api_key = "k"
candidate_url = "https://candidates.example"
token_url = "https://tokens.example"
failure_policy = "fail"

[scan]
target_pattern = "2PAAf74"
total_workers = 10
worker_ordinal = 9
half = 2
parse_error_policy = "requeue"

[identity]
warm_up = true

[identity.strategy]
kind = "pooled_with_rotation"
min_items = 20
max_items = 30
error_threshold = 3

[backoff]
max_consecutive_errors = 5
"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.stores.failure_policy, StoreFailurePolicy::Fail);
    assert_eq!(config.scan.half, Some(HalfSelector::Second));
    assert_eq!(config.scan.parse_error_policy, ParseErrorPolicy::Requeue);
    assert_eq!(config.scan.slice_minutes, 30);
    assert_eq!(config.identity.strategy, RotationStrategy::pooled_default());
    assert_eq!(config.backoff.max_consecutive_errors, 5);
    assert_eq!(config.backoff.tiers.len(), 3);
    assert_eq!(config.partition().unwrap().to_string(), "9/10-2");
}

#[test]
fn test_from_file_missing_or_malformed() {
    assert!(Config::from_file(std::path::Path::new("/nonexistent/vidscan.toml")).is_err());

    let file = write_config("[scan\ntotal_workers = ");
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_validate_rejects_bad_values() {
    let file = write_config(
        r#"
[scan]
total_workers = 4
worker_ordinal = 4
"#,
    );
    let config = Config::from_file(file.path()).unwrap();
    assert!(config.validate().is_err());

    let file = write_config(
        r#"
[scan]
slice_minutes = 25
"#,
    );
    assert!(Config::from_file(file.path()).unwrap().validate().is_err());

    let file = write_config(
        r#"
[backoff]
tiers = [{ min_ms = 4000, max_ms = 9000 }, { min_ms = 8000, max_ms = 12000 }]
"#,
    );
    assert!(Config::from_file(file.path()).unwrap().validate().is_err());
}

// ============================================================================
// Environment loading
// ============================================================================

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();

    let config = Config::from_env().unwrap();

    assert_eq!(config.scan.total_workers, 20);
    assert_eq!(config.scan.run_minutes, 10);
    assert_eq!(config.identity.strategy, RotationStrategy::FreshPerItem);
    assert_eq!(config.round_policy().pause, Duration::from_secs(5));
    assert!(config.notifier.bot_token.is_none());
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    std::env::set_var("VIDSCAN_TARGET_PATTERN", "2PAAf74");
    std::env::set_var("VIDSCAN_TOTAL_WORKERS", "8");
    std::env::set_var("VIDSCAN_WORKER_ORDINAL", "3");
    std::env::set_var("VIDSCAN_HALF", "1");
    std::env::set_var("VIDSCAN_PARSE_ERROR_POLICY", "requeue");
    std::env::set_var("VIDSCAN_MAX_CONSECUTIVE_ERRORS", "not-a-number");
    std::env::set_var("TELEGRAM_BOT_TOKEN", "123:abc");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.scan.target_pattern, "2PAAf74");
    assert_eq!(config.partition().unwrap().to_string(), "3/8-1");
    assert_eq!(config.scan.parse_error_policy, ParseErrorPolicy::Requeue);
    assert_eq!(config.backoff.max_consecutive_errors, 10);
    assert_eq!(config.notifier.bot_token.as_deref(), Some("123:abc"));
}

#[test]
#[serial]
fn test_from_env_rejects_bad_partition_values() {
    for (key, value) in [
        ("VIDSCAN_HALF", "3"),
        ("VIDSCAN_WORKER_ORDINAL", "five"),
        ("VIDSCAN_TOTAL_WORKERS", "-2"),
    ] {
        clear_env();
        std::env::set_var(key, value);

        let result = Config::from_env();
        clear_env();

        let err = result.expect_err(key).to_string();
        assert!(err.contains(key), "{err}");
    }
}

#[test]
#[serial]
fn test_from_env_logging_settings() {
    clear_env();
    std::env::set_var("VIDSCAN_LOG_LEVEL", "debug");
    std::env::set_var("VIDSCAN_LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    clear_env();

    assert!(config.validate().is_ok());
    assert_eq!(config.logging.filter_directive(), "vidscan=debug,warn");
    assert!(config.logging.is_json());
    assert!(!config.logging.clone().with_overrides(Some("text"), false).is_json());
}

#[test]
#[serial]
fn test_pooled_variant_from_env() {
    clear_env();
    std::env::set_var("VIDSCAN_VARIANT", "pooled");
    std::env::set_var("VIDSCAN_TOTAL_WORKERS", "1");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.identity.strategy, RotationStrategy::pooled_default());
    assert!(config.identity.warm_up);
    assert_eq!(config.scan.slice_minutes, 60);
    assert_eq!(config.scan.total_slices, 24);
    assert_eq!(config.scan.max_retry_rounds, 0);
}

#[test]
fn test_variant_parse() {
    assert_eq!("Fresh".parse::<Variant>().unwrap(), Variant::Fresh);
    assert!("mixed".parse::<Variant>().is_err());
}
