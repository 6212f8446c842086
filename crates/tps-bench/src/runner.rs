//! Run coordinator: binds one driver and one sampler into a measurement run.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    AccountPool, BenchError, Driver, DriverReport, HandshakeError, NodeClient, RunHandshake,
    RunSettings, Sampler, SamplerReport, TxFactory,
};

/// Combined outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Driver-side outcome.
    pub driver: DriverReport,
    /// Sampler-side measurements.
    pub sampler: SamplerReport,
}

/// Owns everything a single run needs.
#[derive(Debug)]
pub struct Benchmark<N, F> {
    submit: Arc<N>,
    watch: Arc<N>,
    factory: Arc<F>,
    accounts: Arc<AccountPool>,
    settings: RunSettings,
}

impl<N: NodeClient, F: TxFactory> Benchmark<N, F> {
    /// Creates a run submitting through `submit` and sampling headers from `watch`.
    pub const fn new(
        submit: Arc<N>,
        watch: Arc<N>,
        factory: Arc<F>,
        accounts: Arc<AccountPool>,
        settings: RunSettings,
    ) -> Self {
        Self { submit, watch, factory, accounts, settings }
    }

    /// Runs the benchmark to completion.
    ///
    /// The sampler is subscribed before the first transaction is launched. If the
    /// sampler fails, in-flight submission tasks are aborted and the error is returned.
    pub async fn run(self) -> Result<RunReport, BenchError> {
        let Self { submit, watch, factory, accounts, settings } = self;
        let RunHandshake { driver: driver_side, sampler: sampler_side, coordinator } =
            RunHandshake::new();

        let sampler = Sampler::new(watch, settings.total, settings.start_timeout, settings.results);
        let mut sampler_task = tokio::spawn(sampler.watch(sampler_side));

        if let Err(err) = coordinator.subscribed.recv(settings.subscribe_timeout).await {
            return Err(match err {
                HandshakeError::Dropped(_) => match sampler_task.await? {
                    Err(sampler_err) => sampler_err,
                    Ok(_) => err.into(),
                },
                HandshakeError::Timeout { .. } => {
                    sampler_task.abort();
                    err.into()
                }
            });
        }
        info!(total = settings.total, send_rate = settings.send_rate, "sampler subscribed");

        let driver = Driver::new(submit, factory, accounts, settings.plan, settings.driver);
        let driver_run = driver.run(settings.total, settings.send_rate, driver_side);
        tokio::pin!(driver_run);

        let (driver, sampler) = tokio::select! {
            driver = &mut driver_run => {
                let driver = match driver {
                    Ok(report) => report,
                    // A dropped handoff means the sampler died first; its error is the cause.
                    Err(BenchError::Handshake(HandshakeError::Dropped(phase))) => {
                        return Err(match sampler_task.await? {
                            Err(sampler_err) => sampler_err,
                            Ok(_) => HandshakeError::Dropped(phase).into(),
                        });
                    }
                    Err(err) => {
                        sampler_task.abort();
                        return Err(err);
                    }
                };
                (driver, sampler_task.await??)
            }
            sampler = &mut sampler_task => {
                let sampler = sampler?.inspect_err(|err| {
                    warn!(%err, "sampler failed, aborting submission tasks");
                })?;
                (driver_run.await?, sampler)
            }
        };

        let written = coordinator.flushed.recv(settings.flush_timeout).await?;
        info!(results = ?written, "file write finished");

        Ok(RunReport { driver, sampler })
    }
}
