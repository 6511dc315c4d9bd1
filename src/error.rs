//! Unified error handling for the vidscan crate
//!
//! Domain modules keep their own error enums; [`Error`] wraps them so that
//! errors can cross module boundaries without losing detail.
//!
//! Scan results are not errors. A probe that times out or returns a
//! non-zero business code is a [`ScanOutcome`](crate::models::ScanOutcome),
//! not an `Err`.

use thiserror::Error;

pub use crate::notifications::channels::ChannelError;
pub use crate::utils::error::{FetchError, StoreError};

/// Retry and routing hints shared by every vidscan error
pub trait VidscanErrorTrait: std::error::Error {
    /// Whether repeating the same call later could succeed
    fn is_recoverable(&self) -> bool;

    /// Which collaborator the error came from
    fn category(&self) -> ErrorCategory;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Activity endpoint and identity sessions
    Probe,
    /// Candidate or token store
    Store,
    /// Report delivery
    Notify,
    /// Settings rejected before any I/O
    Config,
}

impl ErrorCategory {
    /// Short label for log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::Store => "store",
            Self::Notify => "notify",
            Self::Config => "config",
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("probe error: {0}")]
    Fetch(#[from] FetchError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("notification error: {0}")]
    Channel(#[from] ChannelError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl VidscanErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidUrl(_))
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Probe
    }
}

impl VidscanErrorTrait for StoreError {
    fn is_recoverable(&self) -> bool {
        self.is_transient()
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Store
    }
}

impl VidscanErrorTrait for ChannelError {
    fn is_recoverable(&self) -> bool {
        self.is_retryable()
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Notify
    }
}

impl VidscanErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
            Self::Channel(e) => e.is_recoverable(),
            Self::Config(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Store(e) => e.category(),
            Self::Channel(e) => e.category(),
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
