//! Metrics for benchmark runs.

use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;

/// Metrics for the `tps_bench` harness.
///
/// Latencies are recorded in seconds.
#[derive(Metrics, Clone)]
#[metrics(scope = "tps_bench")]
pub struct BenchMetrics {
    /// Transactions accepted by the node.
    #[metric(describe = "Transactions accepted by the node")]
    pub submitted: Counter,

    /// Transactions that produced a success receipt.
    #[metric(describe = "Transactions that produced a success receipt")]
    pub confirmed: Counter,

    /// Submission tasks that ended in failure.
    #[metric(describe = "Submission tasks that ended in failure")]
    pub failed: Counter,

    /// Submissions retried after a nonce conflict.
    #[metric(describe = "Submissions retried after a nonce conflict")]
    pub retried: Counter,

    /// Time from submission to success receipt.
    #[metric(describe = "Time from submission to success receipt")]
    pub confirmation_latency: Histogram,

    /// Transactions per observed block.
    #[metric(describe = "Transactions per observed block")]
    pub block_transactions: Histogram,

    /// Confirmed transactions per second since the run start.
    #[metric(describe = "Confirmed transactions per second since the run start")]
    pub cumulative_tps: Gauge,

    /// Pending transactions in the node pool at the last header.
    #[metric(describe = "Pending transactions in the node pool at the last header")]
    pub pending_pool: Gauge,

    /// Submission tasks currently running.
    #[metric(describe = "Submission tasks currently running")]
    pub in_flight: Gauge,
}
