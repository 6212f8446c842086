//! TOML configuration and network presets.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{ConfigError, DriverConfig, ResultsFile, SenderPlan, Workload, WorkloadKind};

/// Default configuration file name.
pub const DEFAULT_CONFIG_PATH: &str = "tps-bench.toml";

const ONE_ETHER: u64 = 1_000_000_000_000_000_000;

/// Local devnets the tool ships endpoints for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkPreset {
    /// Avalanche C-chain devnet.
    Ava,
    /// Klaytn devnet.
    Klay,
    /// Ethereum devnet.
    Eth,
}

impl NetworkPreset {
    /// All presets.
    pub const ALL: [Self; 3] = [Self::Ava, Self::Klay, Self::Eth];

    /// Returns the short network name used in results file names.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ava => "ava",
            Self::Klay => "klay",
            Self::Eth => "eth",
        }
    }

    /// Returns the network section for this preset.
    pub fn network(&self) -> NetworkConfig {
        let (chain_id, submit_url, watch_url) = match self {
            Self::Ava => (
                43112,
                "ws://127.0.0.1:9650/ext/bc/C/ws",
                "ws://127.0.0.1:9651/ext/bc/C/ws",
            ),
            Self::Klay => (8216, "ws://127.0.0.1:9551", "ws://127.0.0.1:9551"),
            Self::Eth => (32382, "ws://127.0.0.1:8546", "ws://127.0.0.1:9546"),
        };
        NetworkConfig {
            name: self.name().to_string(),
            chain_id: Some(chain_id),
            submit_url: submit_url.to_string(),
            watch_url: watch_url.to_string(),
        }
    }
}

impl fmt::Display for NetworkPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::Invalid(format!("unknown network preset `{s}`")))
    }
}

/// `[network]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Network name used in results file names.
    pub name: String,
    /// Chain id used for signing. Fetched from the node when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Endpoint transactions are submitted to.
    pub submit_url: String,
    /// Endpoint headers are watched on. Must be a WebSocket URL.
    pub watch_url: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkPreset::Klay.network()
    }
}

/// `[contracts]` section. Zero addresses mean "not deployed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractsConfig {
    /// ERC20 token address.
    pub erc20: Address,
    /// ERC721 token address.
    pub erc721: Address,
    /// ERC1155 token address.
    pub erc1155: Address,
}

/// `[run]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Transactions to send.
    pub total: u64,
    /// Launches per pause.
    pub rate: u64,
    /// Gas limit override; the workload default applies when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Sending accounts of the multi-sender workload.
    pub senders: usize,
    /// File with one hex private key per line.
    pub accounts_file: PathBuf,
    /// Directory results files are written to.
    pub output_dir: PathBuf,
    /// Value of a native transfer, in wei.
    pub transfer_value_wei: u64,
    /// Value of a multi-sender transfer, in wei.
    pub multi_transfer_value_wei: u64,
    /// Token amount minted or transferred per ERC20 and ERC1155 call.
    pub token_amount: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            total: 500,
            rate: 50,
            gas_limit: None,
            senders: 50,
            accounts_file: PathBuf::from("account/privateKey_100k"),
            output_dir: PathBuf::from("result"),
            transfer_value_wei: ONE_ETHER,
            multi_transfer_value_wei: ONE_ETHER / 10,
            token_amount: ONE_ETHER,
        }
    }
}

/// `[timing]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Delay between receipt lookups, in milliseconds.
    pub receipt_poll_interval_ms: u64,
    /// Receipt lookups before a transaction counts as timed out.
    pub receipt_poll_attempts: u32,
    /// Backoff after a nonce conflict, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Pause after every `rate` launches, in milliseconds.
    pub launch_pause_ms: u64,
    /// Seconds of launches allowed in flight.
    pub in_flight_window_secs: u64,
    /// How long the sampler waits for the subscription to come up.
    pub subscribe_timeout_secs: u64,
    /// How long the sampler waits for the start signal.
    pub start_timeout_secs: u64,
    /// How long the driver waits for the confirmed total.
    pub confirm_timeout_secs: u64,
    /// How long the run waits for the results file write.
    pub flush_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let driver = DriverConfig::default();
        Self {
            receipt_poll_interval_ms: driver.receipt_poll_interval.as_millis() as u64,
            receipt_poll_attempts: driver.receipt_poll_attempts,
            retry_backoff_ms: driver.retry_backoff.as_millis() as u64,
            launch_pause_ms: driver.launch_pause.as_millis() as u64,
            in_flight_window_secs: driver.in_flight_window_secs,
            subscribe_timeout_secs: 30,
            start_timeout_secs: 30,
            confirm_timeout_secs: driver.confirm_timeout.as_secs(),
            flush_timeout_secs: 30,
        }
    }
}

impl TimingConfig {
    /// Converts the section into driver timings.
    pub const fn driver(&self) -> DriverConfig {
        DriverConfig {
            receipt_poll_interval: Duration::from_millis(self.receipt_poll_interval_ms),
            receipt_poll_attempts: self.receipt_poll_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            launch_pause: Duration::from_millis(self.launch_pause_ms),
            in_flight_window_secs: self.in_flight_window_secs,
            confirm_timeout: Duration::from_secs(self.confirm_timeout_secs),
        }
    }
}

/// Run-level settings derived from the configuration for one workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Transactions to send.
    pub total: u64,
    /// Launches per pause.
    pub send_rate: u64,
    /// Sender selection.
    pub plan: SenderPlan,
    /// Driver timings.
    pub driver: DriverConfig,
    /// How long to wait for the sampler's subscription.
    pub subscribe_timeout: Duration,
    /// How long the sampler waits for the start signal.
    pub start_timeout: Duration,
    /// How long to wait for the results file write.
    pub flush_timeout: Duration,
    /// Where the samples go.
    pub results: ResultsFile,
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Node endpoints.
    pub network: NetworkConfig,
    /// Token contracts.
    pub contracts: ContractsConfig,
    /// Run parameters.
    pub run: RunConfig,
    /// Timeouts and pacing.
    pub timing: TimingConfig,
}

impl BenchConfig {
    /// Loads `path`, first writing the default configuration there if it does not exist.
    ///
    /// Value ranges are not checked here; call [`Self::validate`] once command line
    /// overrides are applied.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let io_error = |source| ConfigError::Io { path: path.to_path_buf(), source };

        if !path.exists() {
            Self::default().write(path)?;
            info!(path = %path.display(), "wrote default configuration");
        }

        let contents = std::fs::read_to_string(path).map_err(io_error)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Writes the configuration as TOML, creating parent directories.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_error = |source| ConfigError::Io { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?).map_err(io_error)
    }

    /// Replaces the network section with a preset.
    pub fn apply_preset(&mut self, preset: NetworkPreset) {
        self.network = preset.network();
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.run.total == 0 {
            return invalid("run.total must be positive");
        }
        if self.run.rate == 0 {
            return invalid("run.rate must be positive");
        }
        if self.run.senders == 0 {
            return invalid("run.senders must be positive");
        }
        if self.run.gas_limit == Some(0) {
            return invalid("run.gas_limit must be positive");
        }
        if self.timing.receipt_poll_attempts == 0 {
            return invalid("timing.receipt_poll_attempts must be positive");
        }
        if self.network.submit_url.is_empty() || self.network.watch_url.is_empty() {
            return invalid("network endpoints must be set");
        }
        Ok(())
    }

    /// Builds the workload for `kind`, resolving its contract address.
    pub fn workload(&self, kind: WorkloadKind) -> Result<Workload, ConfigError> {
        let amount = U256::from(self.run.token_amount);
        let contract = |address: Address, name: &str| {
            if address.is_zero() {
                Err(ConfigError::Invalid(format!("contracts.{name} is not set")))
            } else {
                Ok(address)
            }
        };

        Ok(match kind {
            WorkloadKind::Erc20Mint => {
                Workload::Erc20Mint { token: contract(self.contracts.erc20, "erc20")?, amount }
            }
            WorkloadKind::Erc20Transfer => {
                Workload::Erc20Transfer { token: contract(self.contracts.erc20, "erc20")?, amount }
            }
            WorkloadKind::Erc721Mint => {
                Workload::Erc721Mint { token: contract(self.contracts.erc721, "erc721")? }
            }
            WorkloadKind::Erc721Transfer => {
                Workload::Erc721Transfer { token: contract(self.contracts.erc721, "erc721")? }
            }
            WorkloadKind::Erc1155Mint => Workload::Erc1155Mint {
                token: contract(self.contracts.erc1155, "erc1155")?,
                amount,
            },
            WorkloadKind::Erc1155Transfer => Workload::Erc1155Transfer {
                token: contract(self.contracts.erc1155, "erc1155")?,
                amount,
            },
            WorkloadKind::NativeTransfer => {
                Workload::NativeTransfer { value: U256::from(self.run.transfer_value_wei) }
            }
            WorkloadKind::MultiTransfer => {
                Workload::MultiTransfer { value: U256::from(self.run.multi_transfer_value_wei) }
            }
        })
    }

    /// Returns the gas limit for `kind`.
    pub fn gas_limit(&self, kind: WorkloadKind) -> u64 {
        self.run.gas_limit.unwrap_or_else(|| kind.default_gas_limit())
    }

    /// Returns the sender selection for `kind`.
    pub const fn sender_plan(&self, kind: WorkloadKind) -> SenderPlan {
        match kind {
            WorkloadKind::MultiTransfer => SenderPlan::RoundRobin { senders: self.run.senders },
            _ => SenderPlan::Shared,
        }
    }

    /// Returns how many keys to load: enough for every sender and one recipient per task.
    pub fn accounts_to_load(&self, kind: WorkloadKind) -> usize {
        let recipients = usize::try_from(self.run.total).unwrap_or(usize::MAX);
        match self.sender_plan(kind) {
            SenderPlan::Shared => recipients,
            SenderPlan::RoundRobin { senders } => recipients.max(senders),
        }
    }

    /// Derives the settings of a `kind` run started at `started`.
    pub fn run_settings(&self, kind: WorkloadKind, started: &DateTime<Local>) -> RunSettings {
        RunSettings {
            total: self.run.total,
            send_rate: self.run.rate,
            plan: self.sender_plan(kind),
            driver: self.timing.driver(),
            subscribe_timeout: Duration::from_secs(self.timing.subscribe_timeout_secs),
            start_timeout: Duration::from_secs(self.timing.start_timeout_secs),
            flush_timeout: Duration::from_secs(self.timing.flush_timeout_secs),
            results: ResultsFile::new(
                &self.run.output_dir,
                &self.network.name,
                started,
                self.run.total,
                self.run.rate,
                kind.label(),
            ),
        }
    }
}
