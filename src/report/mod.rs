//! Run summaries and the daily token report
//!
//! The two halves are independent: [`summary`] needs only the counters a run
//! returns, while [`daily`] reads the token store and feeds the notifier.

pub mod daily;
pub mod summary;

pub use daily::{BatchProgress, DailyReport, DailyReporter};
pub use summary::RunReport;
