#![allow(dead_code)]

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    sync::{Arc, Once},
    time::Duration,
};

use alloy_consensus::{SignableTransaction, Transaction, TxEnvelope};
use alloy_eips::eip2718::Decodable2718;
use alloy_primitives::{Address, Bytes, TxHash, keccak256};
use alloy_rpc_types_txpool::TxpoolStatus;
use async_trait::async_trait;
use base_tps_bench::{
    AccountPool, DriverConfig, HeaderStream, NodeClient, NodeError, NodeResult, ReceiptStatus,
    ResultsFile, RunSettings, SenderPlan, SubmitError,
};
use futures::{StreamExt, stream};
use parking_lot::Mutex;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

pub const CHAIN_ID: u64 = 1337;

/// Well-known development keys.
pub const KEYS: [&str; 4] = [
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    "7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6",
];

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy();
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

pub fn accounts(count: usize) -> Arc<AccountPool> {
    Arc::new(AccountPool::parse(&KEYS[..count].join("\n"), count).unwrap())
}

/// Timings scaled down so a run takes well under a second of pacing.
pub fn fast_settings(total: u64, send_rate: u64, results: ResultsFile) -> RunSettings {
    RunSettings {
        total,
        send_rate,
        plan: SenderPlan::Shared,
        driver: DriverConfig {
            receipt_poll_interval: Duration::from_millis(10),
            receipt_poll_attempts: 300,
            retry_backoff: Duration::from_millis(20),
            launch_pause: Duration::from_millis(200),
            in_flight_window_secs: 60,
            confirm_timeout: Duration::from_secs(10),
        },
        subscribe_timeout: Duration::from_secs(5),
        start_timeout: Duration::from_secs(5),
        flush_timeout: Duration::from_secs(5),
        results,
    }
}

#[derive(Debug, Clone, Copy)]
struct PooledTx {
    hash: TxHash,
    sender: Address,
    nonce: u64,
}

#[derive(Debug, Default)]
struct ChainState {
    head: u64,
    used_nonces: HashMap<Address, BTreeSet<u64>>,
    pool: Vec<PooledTx>,
    blocks: BTreeMap<u64, Vec<TxHash>>,
    receipts: HashMap<TxHash, ReceiptStatus>,
    scripted: VecDeque<SubmitError>,
    accepted: Vec<PooledTx>,
    submissions: usize,
    revert_all: bool,
    hold_pool: bool,
}

/// In-memory chain: accepts signed legacy transactions, mines them into blocks on
/// demand and announces every block on a header broadcast.
#[derive(Debug)]
pub struct FakeNode {
    state: Mutex<ChainState>,
    headers: Mutex<Option<broadcast::Sender<u64>>>,
}

impl FakeNode {
    pub fn new() -> Arc<Self> {
        let (headers, _) = broadcast::channel(1024);
        Arc::new(Self { state: Mutex::default(), headers: Mutex::new(Some(headers)) })
    }

    /// Queues errors returned by the next submissions, in order.
    pub fn script_errors(&self, messages: &[&str]) {
        self.state.lock().scripted.extend(messages.iter().map(SubmitError::classify));
    }

    /// Makes every mined transaction revert.
    pub fn revert_all(&self) {
        self.state.lock().revert_all = true;
    }

    /// Keeps accepted transactions in the pool forever.
    pub fn hold_pool(&self) {
        self.state.lock().hold_pool = true;
    }

    /// Closes the header subscription.
    pub fn disconnect(&self) {
        self.headers.lock().take();
    }

    /// Mines every pooled transaction into a new block and announces it.
    pub fn produce_block(&self) -> u64 {
        let number = {
            let mut state = self.state.lock();
            state.head += 1;
            let number = state.head;

            let included =
                if state.hold_pool { Vec::new() } else { std::mem::take(&mut state.pool) };
            let status =
                if state.revert_all { ReceiptStatus::Reverted } else { ReceiptStatus::Success };
            for tx in &included {
                state.receipts.insert(tx.hash, status);
            }
            state.blocks.insert(number, included.iter().map(|tx| tx.hash).collect());
            number
        };

        if let Some(headers) = self.headers.lock().as_ref() {
            let _ = headers.send(number);
        }
        number
    }

    /// Re-announces an already mined block.
    pub fn reannounce(&self, number: u64) {
        if let Some(headers) = self.headers.lock().as_ref() {
            let _ = headers.send(number);
        }
    }

    /// Produces a block every `every` until the returned handle is aborted.
    pub fn spawn_miner(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                node.produce_block();
            }
        })
    }

    /// Accepted transactions as `(sender, nonce)`, in acceptance order.
    pub fn accepted(&self) -> Vec<(Address, u64)> {
        self.state.lock().accepted.iter().map(|tx| (tx.sender, tx.nonce)).collect()
    }

    /// Number of `eth_sendRawTransaction` calls, accepted or not.
    pub fn submissions(&self) -> usize {
        self.state.lock().submissions
    }

    fn decode(raw: &Bytes) -> Result<PooledTx, SubmitError> {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| SubmitError::Permanent(format!("rlp: {e}")))?;
        let signed =
            envelope.as_legacy().ok_or_else(|| SubmitError::Permanent("not legacy".into()))?;
        if signed.tx().chain_id != Some(CHAIN_ID) {
            return Err(SubmitError::Permanent("invalid chain id".into()));
        }
        let sender = signed
            .signature()
            .recover_address_from_prehash(&signed.tx().signature_hash())
            .map_err(|e| SubmitError::Permanent(format!("invalid sender: {e}")))?;

        Ok(PooledTx { hash: keccak256(raw), sender, nonce: envelope.nonce() })
    }
}

#[async_trait]
impl NodeClient for FakeNode {
    async fn chain_id(&self) -> NodeResult<u64> {
        Ok(CHAIN_ID)
    }

    async fn gas_price(&self) -> NodeResult<u128> {
        Ok(1_000_000_000)
    }

    async fn pending_nonce(&self, address: Address) -> NodeResult<u64> {
        let state = self.state.lock();
        let used = state.used_nonces.get(&address);
        Ok((0..).find(|nonce| !used.is_some_and(|used| used.contains(nonce))).unwrap_or_default())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, SubmitError> {
        let tx = Self::decode(&raw)?;
        let mut state = self.state.lock();
        state.submissions += 1;

        if let Some(err) = state.scripted.pop_front() {
            return Err(err);
        }

        // Gapped nonces are accepted as if queued; a taken nonce is a replacement attempt.
        if !state.used_nonces.entry(tx.sender).or_default().insert(tx.nonce) {
            return Err(SubmitError::classify("replacement transaction underpriced"));
        }

        state.pool.push(tx);
        state.accepted.push(tx);
        Ok(tx.hash)
    }

    async fn receipt_status(&self, hash: TxHash) -> NodeResult<Option<ReceiptStatus>> {
        Ok(self.state.lock().receipts.get(&hash).copied())
    }

    async fn block_transaction_count(&self, number: u64) -> NodeResult<usize> {
        self.state
            .lock()
            .blocks
            .get(&number)
            .map(Vec::len)
            .ok_or(NodeError::BlockNotFound(number))
    }

    async fn txpool_status(&self) -> NodeResult<TxpoolStatus> {
        Ok(TxpoolStatus { pending: self.state.lock().pool.len() as u64, queued: 0 })
    }

    async fn subscribe_new_heads(&self) -> NodeResult<HeaderStream> {
        let receiver = self
            .headers
            .lock()
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(NodeError::SubscriptionClosed)?;

        let headers = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(number) => return Some((Ok(number), receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(headers.boxed())
    }
}
