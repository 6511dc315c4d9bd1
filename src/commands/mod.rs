pub mod report;
pub mod scan;
pub mod shard;

// Re-export command functions for convenience
pub use report::report;
pub use scan::{scan, ScanOverrides};
pub use shard::shard;
