//! Shared run statistics mutated by every submission task.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use parking_lot::Mutex;
use serde::Serialize;

/// Terminal failure causes of a submission task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The node rejected the transaction, or it could not be built.
    Rejected,
    /// The transaction was mined with a failure status.
    Reverted,
    /// No receipt appeared within the polling budget.
    TimedOut,
}

/// Thread-safe run statistics.
///
/// The failure count, the latency sum and the latency maximum each sit behind their own
/// lock; the per-cause breakdown is kept in plain atomics.
#[derive(Debug, Default)]
pub struct RunStats {
    failures: Mutex<u64>,
    total_latency: Mutex<Duration>,
    max_latency: Mutex<Duration>,
    confirmed: AtomicU64,
    retries: AtomicU64,
    rejected: AtomicU64,
    reverted: AtomicU64,
    timed_out: AtomicU64,
}

impl RunStats {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a confirmed transaction and its submission-to-receipt latency.
    pub fn record_confirmed(&self, latency: Duration) {
        *self.total_latency.lock() += latency;
        {
            let mut max = self.max_latency.lock();
            if latency > *max {
                *max = latency;
            }
        }
        self.confirmed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed task.
    pub fn record_failure(&self, kind: FailureKind) {
        *self.failures.lock() += 1;
        let counter = match kind {
            FailureKind::Rejected => &self.rejected,
            FailureKind::Reverted => &self.reverted,
            FailureKind::TimedOut => &self.timed_out,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a retry after a transient nonce conflict.
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of failed tasks.
    pub fn failures(&self) -> u64 {
        *self.failures.lock()
    }

    /// Returns the number of tasks that saw a success receipt.
    pub fn confirmed(&self) -> u64 {
        self.confirmed.load(Ordering::Relaxed)
    }

    /// Returns the sum of all confirmed latencies.
    pub fn total_latency(&self) -> Duration {
        *self.total_latency.lock()
    }

    /// Returns the largest confirmed latency.
    pub fn max_latency(&self) -> Duration {
        *self.max_latency.lock()
    }

    /// Copies the counters into a serializable snapshot.
    pub fn snapshot(&self) -> RunStatsSnapshot {
        RunStatsSnapshot {
            confirmed: self.confirmed(),
            failures: self.failures(),
            rejected: self.rejected.load(Ordering::Relaxed),
            reverted: self.reverted.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            total_latency_secs: self.total_latency().as_secs_f64(),
            max_latency_secs: self.max_latency().as_secs_f64(),
        }
    }
}

/// Point-in-time copy of [`RunStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunStatsSnapshot {
    /// Tasks that saw a success receipt.
    pub confirmed: u64,
    /// Failed tasks, all causes.
    pub failures: u64,
    /// Failures rejected at submission.
    pub rejected: u64,
    /// Failures mined with a failure status.
    pub reverted: u64,
    /// Failures without a receipt in time.
    pub timed_out: u64,
    /// Retries after transient nonce conflicts.
    pub retries: u64,
    /// Sum of confirmed latencies in seconds.
    pub total_latency_secs: f64,
    /// Largest confirmed latency in seconds.
    pub max_latency_secs: f64,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_failures_split_by_cause() {
        let stats = RunStats::new();
        stats.record_failure(FailureKind::Rejected);
        stats.record_failure(FailureKind::TimedOut);
        stats.record_failure(FailureKind::TimedOut);
        stats.record_retry();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.failures, 3);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.reverted, 0);
        assert_eq!(snapshot.timed_out, 2);
        assert_eq!(snapshot.retries, 1);
    }

    #[test]
    fn test_latency_sum_and_max() {
        let stats = RunStats::new();
        stats.record_confirmed(Duration::from_millis(300));
        stats.record_confirmed(Duration::from_millis(1200));
        stats.record_confirmed(Duration::from_millis(500));

        assert_eq!(stats.confirmed(), 3);
        assert_eq!(stats.total_latency(), Duration::from_millis(2000));
        assert_eq!(stats.max_latency(), Duration::from_millis(1200));
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let stats = Arc::new(RunStats::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if i % 2 == 0 {
                            stats.record_confirmed(Duration::from_millis(10));
                        } else {
                            stats.record_failure(FailureKind::Reverted);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.confirmed() + stats.failures(), 800);
        assert_eq!(stats.total_latency(), Duration::from_millis(4000));
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let stats = RunStats::new();
        stats.record_confirmed(Duration::from_millis(250));
        stats.record_failure(FailureKind::Reverted);

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["confirmed"], 1);
        assert_eq!(json["failures"], 1);
        assert_eq!(json["reverted"], 1);
        assert_eq!(json["max_latency_secs"], 0.25);
    }
}
