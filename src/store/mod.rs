//! Candidate and token store clients
//!
//! Both stores are remote HTTP services outside this crate. The core only
//! sees the two traits below; [`http`] holds the production clients.
//!
//! ```text
//! ShardScheduler ──fetch(copy, copies)──▶ CandidateStore
//! ScanEngine ─────upload(record)────────▶ TokenStore ◀──query(MM_DD)── DailyReporter
//! ```

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::Error;
use crate::models::{TokenRecord, VendorId};
use crate::utils::error::StoreError;
use crate::utils::retry::{with_retry_if, RetryConfig};

pub use http::{HttpCandidateStore, HttpTokenStore};

/// Acknowledgement returned by the token store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// HTTP status of the upload call
    pub code: u16,
    /// Whether the store accepted the record
    pub ok: bool,
}

/// Source of shard candidate sets
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Candidates of slice `copy` out of `copies`
    async fn fetch(&self, copy: u32, copies: u32) -> Result<Vec<VendorId>, StoreError>;
}

/// Sink for captured tokens, queryable by business date
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store one captured token
    async fn upload(&self, record: &TokenRecord) -> Result<UploadReceipt, StoreError>;

    /// Records captured on a business date given as `MM_DD`
    async fn query(&self, date: &str) -> Result<Vec<TokenRecord>, StoreError>;
}

/// Upload a record, retrying transient failures
///
/// A receipt with `ok == false` is turned into [`StoreError::Rejected`] so
/// that server-side rejections go through the same retry predicate.
pub async fn upload_with_retry(
    store: &dyn TokenStore,
    record: &TokenRecord,
    retry: &RetryConfig,
) -> Result<UploadReceipt, StoreError> {
    with_retry_if(
        retry,
        "token upload",
        || async move {
            let receipt = store.upload(record).await?;
            if receipt.ok {
                Ok(receipt)
            } else {
                Err(StoreError::Rejected { code: receipt.code })
            }
        },
        StoreError::is_transient,
    )
    .await
}

/// How a failed store call surfaces to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFailurePolicy {
    /// Log the failure and continue with an empty result
    #[default]
    Empty,
    /// Propagate the error
    Fail,
}

impl StoreFailurePolicy {
    /// Apply the policy to a store result
    pub fn apply<T: Default>(self, result: Result<T, StoreError>, what: &str) -> Result<T, StoreError> {
        match (result, self) {
            (Ok(value), _) => Ok(value),
            (Err(e), Self::Empty) => {
                warn!(operation = what, error = %e, "Store call failed, using empty result");
                Ok(T::default())
            }
            (Err(e), Self::Fail) => Err(e),
        }
    }
}

impl FromStr for StoreFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "empty" => Ok(Self::Empty),
            "fail" => Ok(Self::Fail),
            other => Err(Error::config(format!(
                "store failure policy must be 'empty' or 'fail', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for StoreFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Fail => write!(f, "fail"),
        }
    }
}
