//! Probe response classification

use regex::Regex;
use std::sync::OnceLock;

use super::probe::ProbeResponse;
use crate::models::ScanOutcome;
use crate::utils::error::FetchError;

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| Regex::new(r"token=([^&]+)").expect("token regex is valid"))
}

/// Value of the first `token=` query component, up to the next `&` or the end
///
/// # Examples
///
/// ```
/// use vidscan::scan::classify::extract_token;
///
/// assert_eq!(extract_token("https://a/x?token=abc&b=1"), Some("abc"));
/// assert_eq!(extract_token("https://a/x?b=1"), None);
/// ```
pub fn extract_token(url: &str) -> Option<&str> {
    token_re()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Map a probe result onto a [`ScanOutcome`]
///
/// An empty `target_pattern` never matches, so a misconfigured run reports
/// every success as `NoMatch` instead of uploading noise.
pub fn classify(result: Result<ProbeResponse, FetchError>, target_pattern: &str) -> ScanOutcome {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            return ScanOutcome::TransientError {
                reason: e.to_string(),
            }
        }
    };

    if !response.is_success() {
        let reason = match response.msg.as_deref() {
            Some(msg) if !msg.is_empty() => format!("code {}: {msg}", response.code),
            _ => format!("code {}", response.code),
        };
        return ScanOutcome::TransientError { reason };
    }

    let url = response.isv_url().unwrap_or_default();
    if target_pattern.is_empty() || !url.contains(target_pattern) {
        return ScanOutcome::NoMatch;
    }

    match extract_token(url) {
        Some(token) => ScanOutcome::Matched {
            token: token.to_string(),
        },
        None => ScanOutcome::ParseError {
            reason: format!("signature matched without token: {url}"),
        },
    }
}
