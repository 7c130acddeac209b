// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counters maintained by the worker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Live counters, shared between the worker and whoever reports on it.
#[derive(Debug, Default)]
pub struct WorkerStats {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    open_failures: AtomicU64,
    queries_executed: AtomicU64,
    queries_failed: AtomicU64,
    templates_copied: AtomicU64,
    requests_discarded: AtomicU64,
    last_open_failed: AtomicBool,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub open_failures: u64,
    pub queries_executed: u64,
    pub queries_failed: u64,
    pub templates_copied: u64,
    pub requests_discarded: u64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_open(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.last_open_failed.store(false, Ordering::Relaxed);
    }

    pub(crate) fn record_close(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_open_failure(&self) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
        self.last_open_failed.store(true, Ordering::Relaxed);
    }

    /// Whether the most recent attempt to open a database failed.
    pub fn last_open_failed(&self) -> bool {
        self.last_open_failed.load(Ordering::Relaxed)
    }

    pub(crate) fn record_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_template_copy(&self) {
        self.templates_copied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, count: u64) {
        self.requests_discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            templates_copied: self.templates_copied.load(Ordering::Relaxed),
            requests_discarded: self.requests_discarded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_open_outcome_wins() {
        let stats = WorkerStats::new();
        assert!(!stats.last_open_failed());
        stats.record_open_failure();
        assert!(stats.last_open_failed());
        stats.record_open();
        assert!(!stats.last_open_failed());

        let snap = stats.snapshot();
        assert_eq!(snap.open_failures, 1);
        assert_eq!(snap.connections_opened, 1);
    }
}
