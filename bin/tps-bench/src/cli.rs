//! CLI argument parsing and logging setup.

use std::{net::IpAddr, path::PathBuf};

use base_tps_bench::{BenchConfig, DEFAULT_CONFIG_PATH, NetworkPreset, WorkloadKind};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Transaction throughput and latency benchmark for EVM nodes.
#[derive(Parser, Debug)]
#[command(name = "tps-bench")]
#[command(about = "Transaction throughput and latency benchmark for EVM nodes")]
pub(crate) struct Args {
    /// Workload to run.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file. Written with defaults when missing.
    #[arg(
        long,
        short,
        global = true,
        default_value = DEFAULT_CONFIG_PATH,
        env = "TPS_BENCH_CONFIG"
    )]
    pub config: PathBuf,

    /// Network preset replacing the `[network]` section.
    #[arg(long, global = true, value_parser = parse_preset)]
    pub preset: Option<NetworkPreset>,

    /// Transactions to send.
    #[arg(long, global = true)]
    pub total: Option<u64>,

    /// Launches per pause.
    #[arg(long, global = true)]
    pub rate: Option<u64>,

    /// Sending accounts of the multi-sender workload.
    #[arg(long, global = true)]
    pub senders: Option<usize>,

    /// Verbose output (can be repeated for more verbosity).
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log line format.
    #[arg(long, global = true, default_value = "full")]
    pub log_format: LogFormat,

    /// Summary format: text, json.
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Prometheus exporter.
    #[command(flatten)]
    pub metrics: MetricsArgs,
}

impl Args {
    /// Applies the preset and numeric overrides on top of the file configuration.
    pub(crate) fn apply(&self, config: &mut BenchConfig) {
        if let Some(preset) = self.preset {
            config.apply_preset(preset);
        }
        if let Some(total) = self.total {
            config.run.total = total;
        }
        if let Some(rate) = self.rate {
            config.run.rate = rate;
        }
        if let Some(senders) = self.senders {
            config.run.senders = senders;
        }
    }
}

fn parse_preset(s: &str) -> Result<NetworkPreset, String> {
    s.parse().map_err(|e: base_tps_bench::ConfigError| e.to_string())
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    /// Mint ERC20 tokens to the sender.
    Erc20Mint,
    /// Transfer ERC20 tokens.
    Erc20Transfer,
    /// Mint one ERC721 token per transaction.
    Erc721Mint,
    /// Transfer ERC721 tokens by id.
    Erc721Transfer,
    /// Mint ERC1155 tokens.
    Erc1155Mint,
    /// Transfer ERC1155 tokens by id.
    Erc1155Transfer,
    /// Value transfers from one sender.
    NativeTransfer,
    /// Value transfers from several senders in turn.
    MultiTransfer,
    /// Write the effective configuration and exit.
    InitConfig,
}

impl Command {
    /// Returns the workload this command runs, if any.
    pub(crate) const fn workload(&self) -> Option<WorkloadKind> {
        Some(match self {
            Self::Erc20Mint => WorkloadKind::Erc20Mint,
            Self::Erc20Transfer => WorkloadKind::Erc20Transfer,
            Self::Erc721Mint => WorkloadKind::Erc721Mint,
            Self::Erc721Transfer => WorkloadKind::Erc721Transfer,
            Self::Erc1155Mint => WorkloadKind::Erc1155Mint,
            Self::Erc1155Transfer => WorkloadKind::Erc1155Transfer,
            Self::NativeTransfer => WorkloadKind::NativeTransfer,
            Self::MultiTransfer => WorkloadKind::MultiTransfer,
            Self::InitConfig => return None,
        })
    }
}

/// Configuration for the Prometheus exporter.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Metrics")]
pub(crate) struct MetricsArgs {
    /// Serve Prometheus metrics during the run.
    #[arg(
        long = "metrics.enabled",
        global = true,
        default_value_t = false,
        env = "TPS_BENCH_METRICS_ENABLED"
    )]
    pub enabled: bool,

    /// The port to serve Prometheus metrics on.
    #[arg(
        id = "metrics_port",
        long = "metrics.port",
        global = true,
        default_value = "9090",
        env = "TPS_BENCH_METRICS_PORT"
    )]
    pub port: u16,

    /// The IP address to serve Prometheus metrics on.
    #[arg(
        long = "metrics.addr",
        global = true,
        default_value = "0.0.0.0",
        env = "TPS_BENCH_METRICS_ADDR"
    )]
    pub addr: IpAddr,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormat {
    /// Full format with timestamp, level and target.
    #[default]
    Full,
    /// Compact format with minimal metadata.
    Compact,
    /// JSON lines.
    Json,
}

/// Output format for the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text.
    Text,
    /// JSON for scripts.
    Json,
}

/// Initialize tracing with the specified verbosity level and format.
pub(crate) fn init_tracing(verbose: u8, format: LogFormat) {
    let filter = match verbose {
        0 => "tps_bench=info,base_tps_bench=info",
        1 => "tps_bench=debug,base_tps_bench=debug",
        _ => "tps_bench=trace,base_tps_bench=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Full => registry.with(fmt::layer()).init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}
