//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use anyhow::{Context, Result};
use url::Url;

/// Normalize a store credential into an `Authorization` header value
///
/// Keys that already carry the `Bearer ` scheme are passed through.
pub fn bearer_value(api_key: &str) -> String {
    if api_key.starts_with("Bearer ") {
        api_key.to_string()
    } else {
        format!("Bearer {api_key}")
    }
}

/// Join a base URL and a path without doubling the slash
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Check that a string is an absolute http(s) URL
pub fn parse_http_url(raw: &str) -> Result<Url> {
    let parsed = Url::parse(raw).with_context(|| format!("Invalid URL: {raw}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => anyhow::bail!("Unsupported URL scheme '{other}' in {raw}"),
    }
}

/// Truncate text to a maximum number of characters
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_value() {
        assert_eq!(bearer_value("secret"), "Bearer secret");
        assert_eq!(bearer_value("Bearer secret"), "Bearer secret");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://store.example/", "/get"), "https://store.example/get");
        assert_eq!(join_url("https://store.example", "upload"), "https://store.example/upload");
    }

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("https://store.example").is_ok());
        assert!(parse_http_url("ftp://store.example").is_err());
        assert!(parse_http_url("not a url").is_err());
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("very long text here", 10), "very lo...");
    }
}
