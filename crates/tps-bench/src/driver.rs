//! Transaction driver: launches one submission task per transaction and aggregates
//! their outcomes.

use std::{sync::Arc, time::Duration};

use alloy_primitives::TxHash;
use serde::Serialize;
use tokio::{
    sync::Semaphore,
    task::JoinSet,
    time::{Instant, MissedTickBehavior, interval, sleep},
};
use tracing::{debug, info, trace, warn};

use crate::{
    AccountPool, BenchError, BenchMetrics, DriverSide, FailureKind, NodeClient, NonceCoordinator,
    ReceiptStatus, RunStats, RunStatsSnapshot, TxFactory,
};

/// Timing knobs of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Delay between two receipt lookups.
    pub receipt_poll_interval: Duration,
    /// Receipt lookups before a task counts as timed out.
    pub receipt_poll_attempts: u32,
    /// Pause before resubmitting after a nonce conflict.
    pub retry_backoff: Duration,
    /// Pause after every `send_rate` launches.
    pub launch_pause: Duration,
    /// Seconds of launches that may be in flight at once; the limit is `rate * window`.
    pub in_flight_window_secs: u64,
    /// How long to wait for the sampler's confirmed total.
    pub confirm_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            receipt_poll_interval: Duration::from_millis(100),
            receipt_poll_attempts: 600,
            retry_backoff: Duration::from_secs(1),
            launch_pause: Duration::from_secs(1),
            in_flight_window_secs: 60,
            confirm_timeout: Duration::from_secs(600),
        }
    }
}

impl DriverConfig {
    /// Returns the number of tasks allowed in flight for `send_rate`.
    pub fn in_flight_limit(&self, send_rate: u64) -> usize {
        let limit = send_rate.saturating_mul(self.in_flight_window_secs.max(1));
        usize::try_from(limit).unwrap_or(usize::MAX).clamp(1, Semaphore::MAX_PERMITS)
    }
}

/// How submission tasks pick their sending account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderPlan {
    /// Account 0 sends every transaction.
    Shared,
    /// Task `id` sends from account `(id - 1) % senders`.
    RoundRobin {
        /// Number of sending accounts.
        senders: usize,
    },
}

impl SenderPlan {
    /// Returns the pool index of the sender of task `id`.
    pub fn sender_index(&self, id: u64) -> usize {
        match *self {
            Self::Shared => 0,
            Self::RoundRobin { senders } => (id.saturating_sub(1) % senders.max(1) as u64) as usize,
        }
    }

    fn senders(&self) -> usize {
        match *self {
            Self::Shared => 1,
            Self::RoundRobin { senders } => senders,
        }
    }
}

/// Outcome of a driver run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverReport {
    /// Requested transactions.
    pub total: u64,
    /// Launches per pause.
    pub send_rate: u64,
    /// Per-task outcome counters.
    pub stats: RunStatsSnapshot,
    /// Confirmed total handed back by the sampler.
    pub sampler_confirmed: u64,
    /// Summed latency divided by the sampler's confirmed total; absent if either is zero.
    pub average_latency_secs: Option<f64>,
    /// Time from the start signal until the last task finished.
    pub send_elapsed_secs: f64,
}

/// Per-task logic shared by every submission task.
#[derive(Debug)]
struct Submitter<N, F> {
    node: Arc<N>,
    factory: Arc<F>,
    accounts: Arc<AccountPool>,
    plan: SenderPlan,
    config: DriverConfig,
    nonces: NonceCoordinator<N>,
    stats: RunStats,
    metrics: BenchMetrics,
}

impl<N: NodeClient, F: TxFactory> Submitter<N, F> {
    fn fail(&self, id: u64, kind: FailureKind) {
        trace!(id, ?kind, "task failed");
        self.stats.record_failure(kind);
        self.metrics.failed.increment(1);
    }

    /// Assigns a nonce, signs and submits until the node accepts the transaction or
    /// rejects it for good.
    async fn submit(&self, id: u64) -> Result<(TxHash, Instant), FailureKind> {
        let sender = self.accounts.get(self.plan.sender_index(id));
        let address = sender.address();

        loop {
            let nonce = self.nonces.assign(address).await.map_err(|err| {
                warn!(id, %address, %err, "failed to fetch pending nonce");
                FailureKind::Rejected
            })?;

            let tx = match self.factory.build(id, sender, nonce) {
                Ok(tx) => tx,
                Err(err) => {
                    self.nonces.release(address, nonce).await;
                    warn!(id, %err, "failed to build transaction");
                    return Err(FailureKind::Rejected);
                }
            };

            match self.node.send_raw_transaction(tx.raw).await {
                Ok(_) => {
                    self.nonces.settle(address, nonce).await;
                    debug!(id, nonce, hash = %tx.hash, "transaction submitted");
                    return Ok((tx.hash, Instant::now()));
                }
                Err(err) if err.is_transient() => {
                    self.nonces.settle(address, nonce).await;
                    debug!(id, nonce, %err, "nonce conflict, retrying");
                    self.stats.record_retry();
                    self.metrics.retried.increment(1);
                    sleep(self.config.retry_backoff).await;
                }
                Err(err) => {
                    self.nonces.release(address, nonce).await;
                    warn!(id, nonce, %err, "transaction rejected");
                    return Err(FailureKind::Rejected);
                }
            }
        }
    }

    /// Polls for the receipt of `hash` within the configured budget.
    async fn await_receipt(&self, id: u64, hash: TxHash) -> Result<(), FailureKind> {
        let mut ticker = interval(self.config.receipt_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for _ in 0..self.config.receipt_poll_attempts {
            ticker.tick().await;
            match self.node.receipt_status(hash).await {
                Ok(Some(ReceiptStatus::Success)) => return Ok(()),
                Ok(Some(ReceiptStatus::Reverted)) => {
                    warn!(id, %hash, "transaction reverted");
                    return Err(FailureKind::Reverted);
                }
                Ok(None) => {}
                Err(err) => trace!(id, %hash, %err, "receipt lookup failed"),
            }
        }

        warn!(id, %hash, attempts = self.config.receipt_poll_attempts, "no receipt in time");
        Err(FailureKind::TimedOut)
    }

    async fn run_task(&self, id: u64) {
        self.metrics.in_flight.increment(1.0);

        let outcome = match self.submit(id).await {
            Ok((hash, submitted_at)) => {
                self.metrics.submitted.increment(1);
                self.await_receipt(id, hash).await.map(|()| submitted_at.elapsed())
            }
            Err(kind) => Err(kind),
        };

        match outcome {
            Ok(latency) => {
                trace!(id, latency_secs = latency.as_secs_f64(), "task confirmed");
                self.stats.record_confirmed(latency);
                self.metrics.confirmed.increment(1);
                self.metrics.confirmation_latency.record(latency.as_secs_f64());
            }
            Err(kind) => self.fail(id, kind),
        }

        self.metrics.in_flight.decrement(1.0);
    }
}

/// Fans out submission tasks and reports their aggregate outcome.
#[derive(Debug)]
pub struct Driver<N, F> {
    submitter: Arc<Submitter<N, F>>,
}

impl<N: NodeClient, F: TxFactory> Driver<N, F> {
    /// Creates a driver sending through `node` with transactions from `factory`.
    pub fn new(
        node: Arc<N>,
        factory: Arc<F>,
        accounts: Arc<AccountPool>,
        plan: SenderPlan,
        config: DriverConfig,
    ) -> Self {
        let submitter = Submitter {
            nonces: NonceCoordinator::new(node.clone()),
            node,
            factory,
            accounts,
            plan,
            config,
            stats: RunStats::new(),
            metrics: BenchMetrics::default(),
        };
        Self { submitter: Arc::new(submitter) }
    }

    fn validate(&self, total: u64, send_rate: u64) -> Result<(), BenchError> {
        if total == 0 {
            return Err(BenchError::InvalidParameters("total must be positive".to_string()));
        }
        if send_rate == 0 {
            return Err(BenchError::InvalidParameters("send rate must be positive".to_string()));
        }
        let senders = self.submitter.plan.senders();
        if senders == 0 || senders > self.submitter.accounts.len() {
            return Err(BenchError::InvalidParameters(format!(
                "{senders} senders requested, {} accounts loaded",
                self.submitter.accounts.len()
            )));
        }
        Ok(())
    }

    /// Sends `total` transactions, pausing after every `send_rate` launches, then
    /// exchanges the failure count for the sampler's confirmed total.
    pub async fn run(
        self,
        total: u64,
        send_rate: u64,
        handshake: DriverSide,
    ) -> Result<DriverReport, BenchError> {
        self.validate(total, send_rate)?;
        let DriverSide { start, failures, confirmed } = handshake;
        let config = self.submitter.config;

        let started = Instant::now();
        start.send(started)?;

        let limit = config.in_flight_limit(send_rate);
        info!(total, send_rate, in_flight_limit = limit, "launching submission tasks");

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();

        for id in 1..=total {
            let permit = semaphore.clone().acquire_owned().await?;
            let submitter = self.submitter.clone();
            tasks.spawn(async move {
                submitter.run_task(id).await;
                drop(permit);
            });

            if id % send_rate == 0 && id < total {
                debug!(launched = id, "pausing launches");
                sleep(config.launch_pause).await;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!(%err, "submission task panicked");
                self.submitter.stats.record_failure(FailureKind::Rejected);
            }
        }
        let send_elapsed = started.elapsed();

        let stats = self.submitter.stats.snapshot();
        info!(
            confirmed = stats.confirmed,
            failures = stats.failures,
            retries = stats.retries,
            elapsed_secs = send_elapsed.as_secs_f64(),
            "all submission tasks finished"
        );

        failures.send(stats.failures)?;
        let sampler_confirmed = confirmed.recv(config.confirm_timeout).await?;

        let average_latency_secs = (stats.confirmed > 0 && sampler_confirmed > 0)
            .then(|| stats.total_latency_secs / sampler_confirmed as f64);

        Ok(DriverReport {
            total,
            send_rate,
            stats,
            sampler_confirmed,
            average_latency_secs,
            send_elapsed_secs: send_elapsed.as_secs_f64(),
        })
    }
}
