//! End-of-run summary

use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::models::RunStats;
use crate::scan::rounds::{RetrySummary, RunOutcome};

/// Counters of a finished run, ready to log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Items in this worker's partition before any round ran
    pub partition_size: usize,
    pub stats: RunStats,
    pub rounds_executed: u32,
    pub outcome: RunOutcome,
    /// Items still unresolved at the end
    pub unresolved: usize,
}

impl RunReport {
    pub fn new(partition_size: usize, stats: RunStats, retry: &RetrySummary) -> Self {
        Self {
            partition_size,
            stats,
            rounds_executed: retry.rounds_executed,
            outcome: retry.outcome,
            unresolved: retry.unresolved.len(),
        }
    }

    /// Emit the summary as one structured log line
    pub fn log(&self) {
        info!(
            partition_size = self.partition_size,
            scanned = self.stats.scanned,
            success = self.stats.success,
            matched = self.stats.matched,
            errors = self.stats.transient_errors,
            parse_errors = self.stats.parse_errors,
            identities = self.stats.identities_opened,
            uploads_ok = self.stats.uploads_ok,
            uploads_failed = self.stats.uploads_failed,
            rounds = self.rounds_executed,
            unresolved = self.unresolved,
            outcome = %self.outcome,
            "Run finished"
        );
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total {} | success {} | matched {} | errors {} | parse errors {} | identities {} | rounds {} | unresolved {} ({})",
            self.partition_size,
            self.stats.success,
            self.stats.matched,
            self.stats.transient_errors,
            self.stats.parse_errors,
            self.stats.identities_opened,
            self.rounds_executed,
            self.unresolved,
            self.outcome
        )
    }
}
