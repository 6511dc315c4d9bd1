//! Error types for the vidscan scanner
//!
//! This module defines the transport-level error types shared by the probe
//! client and the record-store clients.

use thiserror::Error;

/// Errors that can occur while probing the target endpoint
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Non-success HTTP status
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Response body could not be decoded
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Session could not be opened for a fingerprint
    #[error("Session setup failed: {0}")]
    Session(String),
}

impl FetchError {
    /// Map a reqwest error, keeping timeouts distinguishable
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// Errors that can occur while talking to the candidate or token store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport-level failure
    #[error("Store request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Store answered with a non-success status
    #[error("Store returned status {0}")]
    Status(u16),

    /// Store accepted the connection but rejected the record
    #[error("Store rejected record (status {code})")]
    Rejected {
        /// HTTP status reported by the store
        code: u16,
    },

    /// Response body was not in the expected shape
    #[error("Unexpected store response: {0}")]
    Decode(String),

    /// Invalid store URL
    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),
}

impl StoreError {
    /// Whether a later attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status(code) | Self::Rejected { code } => *code == 429 || *code >= 500,
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_transience() {
        assert!(StoreError::Status(503).is_transient());
        assert!(StoreError::Rejected { code: 429 }.is_transient());
        assert!(!StoreError::Rejected { code: 401 }.is_transient());
        assert!(!StoreError::Decode("bad".to_string()).is_transient());
    }

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(FetchError::Timeout.to_string(), "Request timeout");
        assert_eq!(FetchError::ServerError(502).to_string(), "Server error: 502");
    }
}
