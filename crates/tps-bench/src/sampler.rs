//! Block sampler: turns the header subscription into per-block throughput samples.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc, time::Duration};

use futures::StreamExt;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    BenchError, BenchMetrics, BlockSample, NodeClient, NodeError, ResultsFile, SamplerSide,
};

/// What a single header contributed to the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// The recorded sample.
    pub sample: BlockSample,
    /// Transactions in the block divided by the delay since the previous header.
    pub instantaneous_tps: f64,
    /// Running confirmed total after this block.
    pub confirmed_total: u64,
    /// Whether the block number had been sampled before.
    pub replaced: bool,
}

/// Pure throughput bookkeeping, fed one header at a time.
#[derive(Debug, Clone)]
pub struct ThroughputTracker {
    total: u64,
    start: Instant,
    last_header: Instant,
    confirmed: u64,
    samples: BTreeMap<u64, BlockSample>,
    max_tps: f64,
    max_block_delay: Duration,
    elapsed: Duration,
}

impl ThroughputTracker {
    /// Starts tracking a run of `total` transactions that started at `start`.
    pub const fn new(total: u64, start: Instant) -> Self {
        Self {
            total,
            start,
            last_header: start,
            confirmed: 0,
            samples: BTreeMap::new(),
            max_tps: 0.0,
            max_block_delay: Duration::ZERO,
            elapsed: Duration::ZERO,
        }
    }

    /// Records block `number` holding `transactions` transactions, observed at `at`.
    ///
    /// A block number seen before replaces the earlier sample, and the earlier
    /// transaction count is taken back out of the confirmed total.
    pub fn observe(
        &mut self,
        number: u64,
        transactions: u64,
        pending: u64,
        at: Instant,
    ) -> Observation {
        let delay = at.saturating_duration_since(self.last_header);
        self.last_header = at;
        self.elapsed = at.saturating_duration_since(self.start);

        let replaced = match self.samples.get(&number) {
            Some(previous) => {
                self.confirmed = self.confirmed.saturating_sub(previous.confirmed);
                true
            }
            None => false,
        };
        self.confirmed += transactions;

        let instantaneous_tps = per_second(transactions, delay);
        let cumulative_tps = per_second(self.confirmed, self.elapsed);

        self.max_tps = self.max_tps.max(cumulative_tps);
        self.max_block_delay = self.max_block_delay.max(delay);

        let sample =
            BlockSample { number, delay, pending, confirmed: transactions, cumulative_tps };
        self.samples.insert(number, sample);

        Observation { sample, instantaneous_tps, confirmed_total: self.confirmed, replaced }
    }

    /// Returns `true` once `total - failures` transactions were confirmed.
    pub const fn is_complete(&self, failures: u64) -> bool {
        self.confirmed >= self.total.saturating_sub(failures)
    }

    /// Returns the confirmed total.
    pub const fn confirmed(&self) -> u64 {
        self.confirmed
    }

    /// Returns all samples keyed by block number.
    pub const fn samples(&self) -> &BTreeMap<u64, BlockSample> {
        &self.samples
    }

    /// Builds the final report.
    pub fn report(&self, results_file: Option<PathBuf>) -> SamplerReport {
        SamplerReport {
            confirmed: self.confirmed,
            max_tps: self.max_tps,
            max_block_delay_secs: self.max_block_delay.as_secs_f64(),
            total_elapsed_secs: self.elapsed.as_secs_f64(),
            blocks_observed: self.samples.len(),
            results_file,
        }
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

/// Final sampler measurements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplerReport {
    /// Transactions seen in blocks since the run start.
    pub confirmed: u64,
    /// Highest cumulative TPS.
    pub max_tps: f64,
    /// Longest gap between two headers.
    pub max_block_delay_secs: f64,
    /// Time from the run start to the last header.
    pub total_elapsed_secs: f64,
    /// Distinct blocks sampled.
    pub blocks_observed: usize,
    /// Results file, if it was written.
    pub results_file: Option<PathBuf>,
}

/// Long-running listener that samples every new block until the run completes.
#[derive(Debug)]
pub struct Sampler<N> {
    node: Arc<N>,
    total: u64,
    start_timeout: Duration,
    results: ResultsFile,
    metrics: BenchMetrics,
}

impl<N: NodeClient> Sampler<N> {
    /// Creates a sampler for a run of `total` transactions.
    pub fn new(node: Arc<N>, total: u64, start_timeout: Duration, results: ResultsFile) -> Self {
        Self { node, total, start_timeout, results, metrics: BenchMetrics::default() }
    }

    /// Watches headers until the run completes, then persists the samples.
    ///
    /// A failing subscription aborts the run and is not retried.
    pub async fn watch(self, handshake: SamplerSide) -> Result<SamplerReport, BenchError> {
        let SamplerSide { subscribed, start, mut failures, confirmed, flushed } = handshake;

        let mut headers =
            self.node.subscribe_new_heads().await.map_err(BenchError::Subscription)?;
        subscribed.send(())?;

        let start = start.recv(self.start_timeout).await?;
        debug!(total = self.total, "sampler received run start");

        let mut tracker = ThroughputTracker::new(self.total, start);
        let mut failure_count = None;

        while !failure_count.is_some_and(|failures| tracker.is_complete(failures)) {
            // The failure count is polled first so a complete run stops before the next header.
            tokio::select! {
                biased;

                received = &mut failures, if failure_count.is_none() => {
                    let count = received?;
                    info!(failures = count, confirmed = tracker.confirmed(), "driver finished");
                    failure_count = Some(count);
                }
                header = headers.next() => {
                    let number = match header {
                        Some(Ok(number)) => number,
                        Some(Err(err)) => return Err(BenchError::Subscription(err)),
                        None => return Err(BenchError::Subscription(NodeError::SubscriptionClosed)),
                    };
                    self.on_header(&mut tracker, number).await?;
                }
            }
        }

        let written = match self.results.write(tracker.samples()).await {
            Ok(()) => {
                info!(path = %self.results.path().display(), "results written");
                Some(self.results.path().to_path_buf())
            }
            Err(err) => {
                warn!(path = %self.results.path().display(), %err, "failed to write results");
                None
            }
        };

        let report = tracker.report(written.clone());
        info!(
            max_tps = report.max_tps,
            max_block_delay_secs = report.max_block_delay_secs,
            total_elapsed_secs = report.total_elapsed_secs,
            "sampler finished"
        );

        confirmed.send(tracker.confirmed())?;
        flushed.send(written)?;
        Ok(report)
    }

    async fn on_header(
        &self,
        tracker: &mut ThroughputTracker,
        number: u64,
    ) -> Result<(), BenchError> {
        let at = Instant::now();
        let transactions = self.node.block_transaction_count(number).await? as u64;

        let (pending, queued) = match self.node.txpool_status().await {
            Ok(status) => (status.pending, status.queued),
            Err(err) => {
                warn!(block = number, %err, "txpool_status failed");
                (0, 0)
            }
        };

        let observation = tracker.observe(number, transactions, pending, at);
        if observation.replaced {
            warn!(block = number, "block re-announced, replacing earlier sample");
        }

        self.metrics.block_transactions.record(transactions as f64);
        self.metrics.cumulative_tps.set(observation.sample.cumulative_tps);
        self.metrics.pending_pool.set(pending as f64);

        info!(
            block = number,
            transactions,
            confirmed_total = observation.confirmed_total,
            pending,
            queued,
            block_delay_secs = observation.sample.delay.as_secs_f64(),
            current_tps = observation.instantaneous_tps,
            total_tps = observation.sample.cumulative_tps,
            "block sampled"
        );
        Ok(())
    }
}
