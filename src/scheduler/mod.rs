//! Shard and partition scheduling
//!
//! Two pure steps decide what a worker scans:
//!
//! 1. [`shard`] maps the business-clock time to a slice of the day and
//!    fetches that slice's candidates from the candidate store.
//! 2. [`partition`] narrows the slice to this worker's contiguous range.
//!
//! ```text
//!   wall clock ──► Shard(index) ──► CandidateStore::fetch(index, total)
//!                                          │
//!                                          ▼
//!                        WorkerPartition::apply(candidates)
//!                                          │
//!              ┌───────────┬───────────────┼───────────────┐
//!              ▼           ▼               ▼               ▼
//!           worker 0    worker 1   ...  worker n-1    (no handshake)
//! ```
//!
//! Both steps are deterministic, which is the only thing preventing two
//! workers from scanning the same vendor id in the same window.

pub mod partition;
pub mod shard;

pub use partition::{halve, partition, partition_bounds, HalfSelector, WorkerPartition};
pub use shard::{
    adjusted_budget, business_now, business_offset, slice_index, Shard, ShardPlan, ShardScheduler,
};
