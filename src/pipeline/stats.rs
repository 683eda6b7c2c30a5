//! Run-wide statistics.
//!
//! [`RunStats`] is the only object mutated from concurrent workers during a
//! run, so every update is an atomic increment. Reporting goes through a
//! plain-integer [`StatsSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one conversion run.
#[derive(Debug, Default)]
pub struct RunStats {
    total_files: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    albums_processed: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the discovered work-item count.
    pub fn set_total(&self, total: u64) {
        self.total_files.store(total, Ordering::Relaxed);
    }

    /// One work item converted and tagged.
    pub fn record_success(&self) {
        self.successful.fetch_add(1, Ordering::Relaxed);
    }

    /// One work item failed (transcode or tag copy).
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// One candidate dropped at discovery time (destination already exists).
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// One album finished its phase sequence.
    pub fn record_album(&self) {
        self.albums_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// A consistent plain-integer view for reporting.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_files: self.total_files.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            albums_processed: self.albums_processed.load(Ordering::Relaxed),
        }
    }
}

/// Plain-integer view of [`RunStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_files: u64,
    pub successful: u64,
    pub failed: u64,
    pub skipped: u64,
    pub albums_processed: u64,
}
