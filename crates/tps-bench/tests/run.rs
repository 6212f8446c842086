//! End-to-end runs against an in-memory chain.

mod common;

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use alloy_primitives::U256;
use base_tps_bench::{
    BenchError, Benchmark, LegacyTxFactory, NodeError, ResultsFile, SenderPlan, Workload,
};
use common::{CHAIN_ID, FakeNode, accounts, fast_settings, init_tracing};

fn native_factory(pool: &Arc<base_tps_bench::AccountPool>) -> Arc<LegacyTxFactory> {
    Arc::new(LegacyTxFactory::new(
        CHAIN_ID,
        1_000_000_000,
        21_000,
        Workload::NativeTransfer { value: U256::from(1) },
        pool.clone(),
    ))
}

#[tokio::test]
async fn test_all_transactions_confirmed() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let node = FakeNode::new();
    let miner = node.spawn_miner(Duration::from_millis(50));
    let pool = accounts(2);

    let settings = fast_settings(10, 5, ResultsFile::at(dir.path().join("run.txt")));
    let report = Benchmark::new(node.clone(), node.clone(), native_factory(&pool), pool, settings)
        .run()
        .await
        .unwrap();
    miner.abort();

    let stats = report.driver.stats;
    assert_eq!(stats.confirmed, 10);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.confirmed + stats.failures, 10);
    assert_eq!(report.sampler.confirmed, 10);
    assert_eq!(report.driver.sampler_confirmed, 10);
    assert!(report.driver.average_latency_secs.is_some());

    // Two batches of five separated by one launch pause.
    assert!(report.driver.send_elapsed_secs >= 0.2);

    let nonces: BTreeSet<u64> = node.accepted().into_iter().map(|(_, nonce)| nonce).collect();
    assert_eq!(nonces, (0..10).collect());

    let path = report.sampler.results_file.expect("results written");
    let contents = std::fs::read_to_string(path).unwrap();
    let blocks: Vec<u64> = contents
        .lines()
        .map(|line| line.split('\t').next().unwrap().parse().unwrap())
        .collect();
    assert!(!blocks.is_empty());
    assert!(blocks.windows(2).all(|pair| pair[0] < pair[1]));

    let in_blocks: u64 = contents
        .lines()
        .map(|line| line.split('\t').nth(3).unwrap().parse::<u64>().unwrap())
        .sum();
    assert_eq!(in_blocks, 10);
}

#[tokio::test]
async fn test_round_robin_senders_keep_their_own_nonces() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let node = FakeNode::new();
    let miner = node.spawn_miner(Duration::from_millis(50));
    let pool = accounts(3);

    let mut settings = fast_settings(9, 9, ResultsFile::at(dir.path().join("run.txt")));
    settings.plan = SenderPlan::RoundRobin { senders: 3 };
    let factory = native_factory(&pool);
    let report = Benchmark::new(node.clone(), node.clone(), factory, pool.clone(), settings)
        .run()
        .await
        .unwrap();
    miner.abort();

    assert_eq!(report.driver.stats.confirmed, 9);
    for account in pool.iter() {
        let mut nonces: Vec<u64> = node
            .accepted()
            .into_iter()
            .filter(|(sender, _)| *sender == account.address())
            .map(|(_, nonce)| nonce)
            .collect();
        nonces.sort_unstable();
        assert_eq!(nonces, vec![0, 1, 2]);
    }
}

#[tokio::test]
async fn test_transient_conflict_then_permanent_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let node = FakeNode::new();
    node.script_errors(&["already known", "insufficient funds for gas * price + value"]);
    let miner = node.spawn_miner(Duration::from_millis(50));
    let pool = accounts(1);

    let settings = fast_settings(1, 1, ResultsFile::at(dir.path().join("run.txt")));
    let report = Benchmark::new(node.clone(), node.clone(), native_factory(&pool), pool, settings)
        .run()
        .await
        .unwrap();
    miner.abort();

    assert_eq!(node.submissions(), 2);
    assert_eq!(report.driver.stats.retries, 1);
    assert_eq!(report.driver.stats.failures, 1);
    assert_eq!(report.driver.stats.rejected, 1);
    assert_eq!(report.driver.stats.confirmed, 0);
    assert_eq!(report.driver.average_latency_secs, None);
}

#[tokio::test]
async fn test_missing_receipt_is_a_failure() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let node = FakeNode::new();
    node.hold_pool();
    let miner = node.spawn_miner(Duration::from_millis(50));
    let pool = accounts(1);

    let mut settings = fast_settings(2, 2, ResultsFile::at(dir.path().join("run.txt")));
    settings.driver.receipt_poll_attempts = 5;
    let report = Benchmark::new(node.clone(), node.clone(), native_factory(&pool), pool, settings)
        .run()
        .await
        .unwrap();
    miner.abort();

    assert_eq!(report.driver.stats.timed_out, 2);
    assert_eq!(report.driver.stats.failures, 2);
    assert_eq!(report.sampler.confirmed, 0);
}

#[tokio::test]
async fn test_reverted_transactions_are_failures() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let node = FakeNode::new();
    node.revert_all();
    let miner = node.spawn_miner(Duration::from_millis(50));
    let pool = accounts(1);

    let settings = fast_settings(3, 3, ResultsFile::at(dir.path().join("run.txt")));
    let report = Benchmark::new(node.clone(), node.clone(), native_factory(&pool), pool, settings)
        .run()
        .await
        .unwrap();
    miner.abort();

    assert_eq!(report.driver.stats.reverted, 3);
    assert_eq!(report.driver.stats.confirmed + report.driver.stats.failures, 3);
}

#[tokio::test]
async fn test_subscription_loss_aborts_run() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let node = FakeNode::new();
    node.hold_pool();
    let pool = accounts(1);

    let disconnect = {
        let node = node.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            node.disconnect();
        })
    };

    let settings = fast_settings(5, 5, ResultsFile::at(dir.path().join("run.txt")));
    let started = std::time::Instant::now();
    let err = Benchmark::new(node.clone(), node.clone(), native_factory(&pool), pool, settings)
        .run()
        .await
        .unwrap_err();
    disconnect.await.unwrap();

    assert!(matches!(err, BenchError::Subscription(NodeError::SubscriptionClosed)));
    // Receipt polling alone would take three seconds.
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!dir.path().join("run.txt").exists());
}

#[tokio::test]
async fn test_reannounced_block_is_not_double_counted() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let node = FakeNode::new();
    let pool = accounts(1);

    let miner_node = node.clone();
    let producer = tokio::spawn(async move {
        // Mine until the first transaction lands, then announce that block again.
        loop {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let number = miner_node.produce_block();
            if !miner_node.accepted().is_empty() {
                miner_node.reannounce(number);
                break;
            }
        }
        loop {
            tokio::time::sleep(Duration::from_millis(50)).await;
            miner_node.produce_block();
        }
    });

    let settings = fast_settings(3, 3, ResultsFile::at(dir.path().join("run.txt")));
    let report = Benchmark::new(node.clone(), node.clone(), native_factory(&pool), pool, settings)
        .run()
        .await
        .unwrap();
    producer.abort();

    assert_eq!(report.driver.stats.confirmed, 3);
    assert_eq!(report.sampler.confirmed, 3);
}
