//! vidscan - time-sharded vendor id scanner
//!
//! Probes a time-partitioned set of vendor ids for an activation signature
//! and reports matches to a remote token store. Many worker processes run
//! the same code without talking to each other; deterministic sharding and
//! partitioning keep them from scanning the same id twice.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`scheduler`] - Time shards and worker partitions
//! - [`identity`] - Device fingerprints and identity rotation
//! - [`scan`] - Probe, classification, backoff and retry rounds
//! - [`store`] - Candidate and token store clients
//! - [`report`] - Run summaries and the daily token report
//! - [`notifications`] - Report delivery
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vidscan::config::Config;
//! use vidscan::store::HttpCandidateStore;
//! use vidscan::scheduler::ShardScheduler;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = HttpCandidateStore::new(
//!         &config.stores.candidate_url,
//!         &config.stores.api_key,
//!         config.store_timeout(),
//!     )?;
//!     let scheduler = ShardScheduler::new(Arc::new(store), 30, 48, 10);
//!     let plan = scheduler.plan().await?;
//!     let own = config.partition()?.apply(&plan.candidates).to_vec();
//!     println!("{} candidates for this worker", own.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod notifications;
pub mod report;
pub mod scan;
pub mod scheduler;
pub mod store;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, VidscanErrorTrait};
    pub use crate::identity::{IdentityManager, RotationStrategy};
    pub use crate::models::{RunStats, ScanOutcome, TokenRecord, VendorId};
    pub use crate::scan::{RetryRoundController, ScanEngine};
    pub use crate::scheduler::{ShardScheduler, WorkerPartition};
}

// Direct re-exports for convenience
pub use models::{RunStats, ScanOutcome, TokenRecord, VendorId};
