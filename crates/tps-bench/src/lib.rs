#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/base/node-reth/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod error;
pub use error::{
    AccountError, BenchError, ConfigError, FactoryError, HandshakeError, NodeError, NodeResult,
    NonceConflict, SubmitError,
};

mod node;
pub use node::{HeaderStream, NodeClient, ReceiptStatus};

mod provider;
pub use provider::RpcNode;

mod accounts;
pub use accounts::{Account, AccountPool};

mod nonce;
pub use nonce::NonceCoordinator;

mod handshake;
pub use handshake::{
    CoordinatorSide, DriverSide, HandoffReceiver, HandoffSender, RunHandshake, SamplerSide,
    handoff,
};

mod stats;
pub use stats::{FailureKind, RunStats, RunStatsSnapshot};

mod results;
pub use results::{BlockSample, ResultsFile, render_samples};

mod sampler;
pub use sampler::{Observation, Sampler, SamplerReport, ThroughputTracker};

mod driver;
pub use driver::{Driver, DriverConfig, DriverReport, SenderPlan};

mod contracts;
pub use contracts::{
    CONTRACT_CALL_GAS_LIMIT, Call, IMintableErc20, IMintableErc721, IMintableErc1155,
    NATIVE_TRANSFER_GAS_LIMIT, Workload, WorkloadKind,
};

mod factory;
pub use factory::{LegacyTxFactory, SignedTx, TxFactory};

mod config;
pub use config::{
    BenchConfig, ContractsConfig, DEFAULT_CONFIG_PATH, NetworkConfig, NetworkPreset, RunConfig,
    RunSettings, TimingConfig,
};

mod metrics;
pub use metrics::BenchMetrics;

mod runner;
pub use runner::{Benchmark, RunReport};
