#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/base/node-reth/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod cli;

use std::{net::SocketAddr, sync::Arc};

use base_tps_bench::{
    AccountPool, BenchConfig, Benchmark, LegacyTxFactory, NodeClient, RpcNode, RunReport,
    WorkloadKind,
};
use clap::Parser;
use cli::{Args, MetricsArgs, OutputFormat};
use eyre::{Result, WrapErr};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignores errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    cli::init_tracing(args.verbose, args.log_format);

    let mut config = BenchConfig::load_or_init(&args.config)
        .wrap_err_with(|| format!("Failed to load {}", args.config.display()))?;
    args.apply(&mut config);
    config.validate().wrap_err("Invalid configuration")?;

    let Some(kind) = args.command.workload() else {
        config.write(&args.config)?;
        info!(
            path = %args.config.display(),
            network = %config.network.name,
            "configuration written"
        );
        return Ok(());
    };

    if args.metrics.enabled {
        serve_metrics(&args.metrics)?;
    }

    match run(&config, kind).await {
        Ok(report) => match args.format {
            OutputFormat::Text => print_summary_text(kind, &report),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        },
        Err(err) => {
            error!(error = ?err, workload = kind.label(), "benchmark failed");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn run(config: &BenchConfig, kind: WorkloadKind) -> Result<RunReport> {
    let workload = config.workload(kind)?;

    let submit = Arc::new(
        RpcNode::connect(&config.network.submit_url)
            .await
            .wrap_err_with(|| format!("Failed to connect to {}", config.network.submit_url))?,
    );
    let watch = Arc::new(
        RpcNode::connect(&config.network.watch_url)
            .await
            .wrap_err_with(|| format!("Failed to connect to {}", config.network.watch_url))?,
    );

    let chain_id = match config.network.chain_id {
        Some(chain_id) => chain_id,
        None => submit.chain_id().await.wrap_err("Failed to fetch chain id")?,
    };
    let gas_price = submit.gas_price().await.wrap_err("Failed to fetch gas price")?;

    let accounts = Arc::new(
        AccountPool::load(&config.run.accounts_file, config.accounts_to_load(kind))
            .wrap_err("Failed to load accounts")?,
    );
    info!(
        network = %config.network.name,
        chain_id,
        gas_price,
        accounts = accounts.len(),
        workload = kind.label(),
        "starting benchmark"
    );

    let factory = Arc::new(LegacyTxFactory::new(
        chain_id,
        gas_price,
        config.gas_limit(kind),
        workload,
        accounts.clone(),
    ));
    let settings = config.run_settings(kind, &chrono::Local::now());

    Ok(Benchmark::new(submit, watch, factory, accounts, settings).run().await?)
}

fn serve_metrics(args: &MetricsArgs) -> Result<()> {
    let addr = SocketAddr::from((args.addr, args.port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .wrap_err("Failed to start Prometheus exporter")?;
    info!(target: "prometheus", "Serving metrics at: http://{}", addr);
    Ok(())
}

fn print_summary_text(kind: WorkloadKind, report: &RunReport) {
    let driver = &report.driver;
    let sampler = &report.sampler;
    let stats = &driver.stats;

    println!("workload:          {}", kind.label());
    println!("sent:              {} at {}/pause", driver.total, driver.send_rate);
    println!("confirmed:         {} (blocks: {})", sampler.confirmed, sampler.blocks_observed);
    println!(
        "failures:          {} (rejected {}, reverted {}, timed out {})",
        stats.failures, stats.rejected, stats.reverted, stats.timed_out
    );
    println!("retries:           {}", stats.retries);
    println!("max tps:           {:.2}", sampler.max_tps);
    println!("max block delay:   {:.3}s", sampler.max_block_delay_secs);
    println!("total elapsed:     {:.3}s", sampler.total_elapsed_secs);
    println!("max latency:       {:.3}s", stats.max_latency_secs);
    match driver.average_latency_secs {
        Some(avg) => println!("average latency:   {avg:.3}s"),
        None => println!("average latency:   n/a"),
    }
    match &sampler.results_file {
        Some(path) => println!("results:           {}", path.display()),
        None => println!("results:           not written"),
    }
}
