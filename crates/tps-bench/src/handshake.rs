//! One-shot rendezvous points binding the driver and sampler lifecycles.
//!
//! Every handoff is written once and read once. The sending half is consumed by
//! [`HandoffSender::send`], so a second writer does not type-check.

use std::{
    future::Future,
    path::PathBuf,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use tokio::{sync::oneshot, time::Instant};

use crate::HandshakeError;

/// Creates a named handoff.
pub fn handoff<T>(phase: &'static str) -> (HandoffSender<T>, HandoffReceiver<T>) {
    let (tx, rx) = oneshot::channel();
    (HandoffSender { phase, tx }, HandoffReceiver { phase, rx })
}

/// Writing half of a handoff.
#[derive(Debug)]
pub struct HandoffSender<T> {
    phase: &'static str,
    tx: oneshot::Sender<T>,
}

impl<T> HandoffSender<T> {
    /// Fires the handoff. Fails if the reader is gone.
    pub fn send(self, value: T) -> Result<(), HandshakeError> {
        self.tx.send(value).map_err(|_| HandshakeError::Dropped(self.phase))
    }
}

/// Reading half of a handoff.
///
/// Awaiting the receiver waits without a deadline; [`Self::recv`] bounds the wait.
#[derive(Debug)]
pub struct HandoffReceiver<T> {
    phase: &'static str,
    rx: oneshot::Receiver<T>,
}

impl<T> HandoffReceiver<T> {
    /// Waits at most `timeout` for the value.
    pub async fn recv(self, timeout: Duration) -> Result<T, HandshakeError> {
        let phase = self.phase;
        tokio::time::timeout(timeout, self)
            .await
            .map_err(|_| HandshakeError::Timeout { phase, timeout })?
    }
}

impl<T> Future for HandoffReceiver<T> {
    type Output = Result<T, HandshakeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let phase = self.phase;
        Pin::new(&mut self.rx).poll(cx).map_err(|_| HandshakeError::Dropped(phase))
    }
}

/// Handoffs owned by the transaction driver.
#[derive(Debug)]
pub struct DriverSide {
    /// Fires the run start timestamp.
    pub start: HandoffSender<Instant>,
    /// Fires the final failure count once every task has finished.
    pub failures: HandoffSender<u64>,
    /// Receives the sampler's final confirmed total.
    pub confirmed: HandoffReceiver<u64>,
}

/// Handoffs owned by the block sampler.
#[derive(Debug)]
pub struct SamplerSide {
    /// Fires once the header subscription is live.
    pub subscribed: HandoffSender<()>,
    /// Receives the run start timestamp.
    pub start: HandoffReceiver<Instant>,
    /// Receives the driver's failure count.
    pub failures: HandoffReceiver<u64>,
    /// Fires the final confirmed total.
    pub confirmed: HandoffSender<u64>,
    /// Fires after the results file write finished, with the path on success.
    pub flushed: HandoffSender<Option<PathBuf>>,
}

/// Handoffs observed by the run coordinator.
#[derive(Debug)]
pub struct CoordinatorSide {
    /// Resolves once the sampler subscribed.
    pub subscribed: HandoffReceiver<()>,
    /// Resolves once the results file write finished.
    pub flushed: HandoffReceiver<Option<PathBuf>>,
}

/// All handoffs of a single run, split by owner.
#[derive(Debug)]
pub struct RunHandshake {
    /// Driver half.
    pub driver: DriverSide,
    /// Sampler half.
    pub sampler: SamplerSide,
    /// Coordinator half.
    pub coordinator: CoordinatorSide,
}

impl RunHandshake {
    /// Creates a fresh set of handoffs for one run.
    pub fn new() -> Self {
        let (subscribed_tx, subscribed_rx) = handoff("subscribed");
        let (start_tx, start_rx) = handoff("start");
        let (failures_tx, failures_rx) = handoff("failures");
        let (confirmed_tx, confirmed_rx) = handoff("confirmed");
        let (flushed_tx, flushed_rx) = handoff("flushed");

        Self {
            driver: DriverSide { start: start_tx, failures: failures_tx, confirmed: confirmed_rx },
            sampler: SamplerSide {
                subscribed: subscribed_tx,
                start: start_rx,
                failures: failures_rx,
                confirmed: confirmed_tx,
                flushed: flushed_tx,
            },
            coordinator: CoordinatorSide { subscribed: subscribed_rx, flushed: flushed_rx },
        }
    }
}

impl Default for RunHandshake {
    fn default() -> Self {
        Self::new()
    }
}
